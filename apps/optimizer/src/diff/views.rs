//! Presentation shapes built from diff records: counts and the side-by-side layout.

use serde::Serialize;

use crate::diff::engine::{ChangeKind, DiffRecord};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffStats {
    pub additions: usize,
    pub deletions: usize,
    pub unchanged: usize,
}

impl DiffStats {
    pub fn from_records(records: &[DiffRecord]) -> Self {
        records.iter().fold(Self::default(), |mut stats, r| {
            match r.kind {
                ChangeKind::Addition => stats.additions += 1,
                ChangeKind::Deletion => stats.deletions += 1,
                ChangeKind::Unchanged => stats.unchanged += 1,
            }
            stats
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SideCell {
    pub line: usize,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowKind {
    Unchanged,
    Changed,
}

/// One row of the two-column view. `left` is the original, `right` the optimized text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SideBySideRow {
    pub kind: RowKind,
    pub left: Option<SideCell>,
    pub right: Option<SideCell>,
}

/// Lays records out in two columns.
///
/// Unchanged lines fill both columns. Within each run of changes, deleted
/// lines are paired with added lines in order; the shorter side is padded
/// with empty cells.
pub fn side_by_side(records: &[DiffRecord]) -> Vec<SideBySideRow> {
    let mut rows = Vec::with_capacity(records.len());
    let mut deleted: Vec<SideCell> = Vec::new();
    let mut added: Vec<SideCell> = Vec::new();

    for record in records {
        match (record.kind, record.before_line, record.after_line) {
            (ChangeKind::Unchanged, Some(before), Some(after)) => {
                flush_changes(&mut rows, &mut deleted, &mut added);
                rows.push(SideBySideRow {
                    kind: RowKind::Unchanged,
                    left: Some(SideCell {
                        line: before,
                        content: record.content.clone(),
                    }),
                    right: Some(SideCell {
                        line: after,
                        content: record.content.clone(),
                    }),
                });
            }
            (ChangeKind::Deletion, Some(before), _) => deleted.push(SideCell {
                line: before,
                content: record.content.clone(),
            }),
            (ChangeKind::Addition, _, Some(after)) => added.push(SideCell {
                line: after,
                content: record.content.clone(),
            }),
            // Records built by `engine::diff` always carry the matching line numbers.
            _ => {}
        }
    }
    flush_changes(&mut rows, &mut deleted, &mut added);
    rows
}

fn flush_changes(
    rows: &mut Vec<SideBySideRow>,
    deleted: &mut Vec<SideCell>,
    added: &mut Vec<SideCell>,
) {
    let mut left = deleted.drain(..);
    let mut right = added.drain(..);
    loop {
        match (left.next(), right.next()) {
            (None, None) => break,
            (l, r) => rows.push(SideBySideRow {
                kind: RowKind::Changed,
                left: l,
                right: r,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::engine::diff;

    #[test]
    fn test_stats_count_each_kind() {
        let records = diff("a\nb\nc", "a\nB\nc\nd");
        let stats = DiffStats::from_records(&records);
        assert_eq!(
            stats,
            DiffStats {
                additions: 2,
                deletions: 1,
                unchanged: 2,
            }
        );
    }

    #[test]
    fn test_replacement_pairs_on_one_row() {
        let rows = side_by_side(&diff("a\nold\nc", "a\nnew\nc"));
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].kind, RowKind::Changed);
        assert_eq!(rows[1].left.as_ref().map(|c| c.content.as_str()), Some("old"));
        assert_eq!(rows[1].right.as_ref().map(|c| c.content.as_str()), Some("new"));
    }

    #[test]
    fn test_uneven_runs_pad_shorter_side() {
        let rows = side_by_side(&diff("x\none\ny", "x\nuno\ndos\ntres\ny"));
        let changed: Vec<_> = rows.iter().filter(|r| r.kind == RowKind::Changed).collect();
        assert_eq!(changed.len(), 3);
        assert!(changed[0].left.is_some());
        assert!(changed[1].left.is_none());
        assert!(changed[2].left.is_none());
        assert_eq!(changed[2].right.as_ref().map(|c| c.line), Some(4));
    }

    #[test]
    fn test_every_record_lands_in_exactly_one_cell() {
        let before = "Summary\nLed a team\nShipped v1\n\nSkills";
        let after = "Summary\nLed a team of 6\n\nSkills\nRust";
        let records = diff(before, after);
        let rows = side_by_side(&records);
        let lefts: Vec<usize> = rows.iter().filter_map(|r| r.left.as_ref().map(|c| c.line)).collect();
        let rights: Vec<usize> = rows
            .iter()
            .filter_map(|r| r.right.as_ref().map(|c| c.line))
            .collect();
        assert_eq!(lefts, (1..=5).collect::<Vec<_>>());
        assert_eq!(rights, (1..=5).collect::<Vec<_>>());
    }

    #[test]
    fn test_empty_records_yield_no_rows() {
        assert!(side_by_side(&[]).is_empty());
    }
}
