//! Line-level diff between an original and an optimized resume text.
//!
//! Lines are split on `\n` only, so a single trailing terminator never
//! produces a phantom empty line while interior blank lines are kept. Lines
//! are compared for exact equality, a `\r` before the terminator included;
//! callers that need markup stripped run `cleanup::clean_markup` first.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use similar::{capture_diff_slices_deadline, Algorithm, ChangeTag};

/// Upper bound on time spent searching for a minimal diff. Past it the
/// result is still a valid edit script, just not the shortest one.
const DIFF_DEADLINE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Addition,
    Deletion,
    Unchanged,
}

/// One line of diff output. Line numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffRecord {
    pub kind: ChangeKind,
    pub content: String,
    /// Line in the original text; `None` for additions.
    pub before_line: Option<usize>,
    /// Line in the optimized text; `None` for deletions.
    pub after_line: Option<usize>,
}

/// Splits text into lines without their `\n` terminators. Only the final
/// terminator is dropped; an empty text has no lines.
pub fn split_lines(text: &str) -> Vec<&str> {
    if text.is_empty() {
        return Vec::new();
    }
    text.strip_suffix('\n').unwrap_or(text).split('\n').collect()
}

/// Computes the line diff of `before` against `after`.
///
/// Uses Myers' algorithm over whole lines, which keeps the longest common
/// run of lines. Replacements are emitted as the deleted lines followed by the
/// added lines, so output order is stable for a given input pair.
///
/// CPU-bound; async callers run it through `spawn_blocking`.
pub fn diff(before: &str, after: &str) -> Vec<DiffRecord> {
    let old = split_lines(before);
    let new = split_lines(after);
    let deadline = Instant::now() + DIFF_DEADLINE;
    let ops = capture_diff_slices_deadline(Algorithm::Myers, &old, &new, Some(deadline));

    let mut records = Vec::with_capacity(old.len().max(new.len()));
    for op in &ops {
        for change in op.iter_changes(&old, &new) {
            let kind = match change.tag() {
                ChangeTag::Equal => ChangeKind::Unchanged,
                ChangeTag::Delete => ChangeKind::Deletion,
                ChangeTag::Insert => ChangeKind::Addition,
            };
            records.push(DiffRecord {
                kind,
                content: change.value().to_string(),
                before_line: change.old_index().map(|i| i + 1),
                after_line: change.new_index().map(|i| i + 1),
            });
        }
    }
    records
}

/// True when at least one record is an addition or a deletion.
pub fn has_changes(records: &[DiffRecord]) -> bool {
    records.iter().any(|r| r.kind != ChangeKind::Unchanged)
}
