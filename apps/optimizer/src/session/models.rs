//! Canonical session snapshot types.
//!
//! The backend's payload shape drifted over time (field aliases, bare step
//! states, missing `steps`). `SessionSnapshot` deserializes through
//! `WireSession`, so all normalization happens once when a response is parsed.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

pub type SessionId = i64;

/// State of the whole session or of a single step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    #[default]
    Pending,
    Running,
    Done,
    Error,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Error)
    }
}

/// Pipeline stages, declared in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    ParseBase,
    ParseAlt,
    Analyze,
    Suggest,
    Rewrite,
    Diff,
    Latex,
    Pdf,
}

impl StepName {
    pub fn as_str(self) -> &'static str {
        match self {
            StepName::ParseBase => "parse_base",
            StepName::ParseAlt => "parse_alt",
            StepName::Analyze => "analyze",
            StepName::Suggest => "suggest",
            StepName::Rewrite => "rewrite",
            StepName::Diff => "diff",
            StepName::Latex => "latex",
            StepName::Pdf => "pdf",
        }
    }

    /// Label shown while the step is running.
    pub fn activity(self) -> &'static str {
        match self {
            StepName::ParseBase => "Parsing your resume",
            StepName::ParseAlt => "Parsing the comparison resume",
            StepName::Analyze => "Analyzing the job description",
            StepName::Suggest => "Generating suggestions",
            StepName::Rewrite => "Rewriting your resume",
            StepName::Diff => "Computing changes",
            StepName::Latex => "Generating LaTeX",
            StepName::Pdf => "Compiling PDF",
        }
    }

    /// Noun form used in "Preparing ..." and failure labels.
    pub fn title(self) -> &'static str {
        match self {
            StepName::ParseBase => "resume parsing",
            StepName::ParseAlt => "comparison parsing",
            StepName::Analyze => "job analysis",
            StepName::Suggest => "suggestions",
            StepName::Rewrite => "rewrite",
            StepName::Diff => "diff",
            StepName::Latex => "LaTeX",
            StepName::Pdf => "PDF",
        }
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "parse_base" => Ok(StepName::ParseBase),
            "parse_alt" => Ok(StepName::ParseAlt),
            "analyze" => Ok(StepName::Analyze),
            "suggest" => Ok(StepName::Suggest),
            "rewrite" => Ok(StepName::Rewrite),
            "diff" => Ok(StepName::Diff),
            "latex" => Ok(StepName::Latex),
            "pdf" => Ok(StepName::Pdf),
            other => Err(format!("unknown step '{other}'")),
        }
    }
}

/// Job types and the steps each one runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Optimize,
    Compare,
}

impl JobKind {
    pub fn steps(self) -> &'static [StepName] {
        match self {
            JobKind::Optimize => &[
                StepName::ParseBase,
                StepName::Analyze,
                StepName::Suggest,
                StepName::Rewrite,
                StepName::Diff,
                StepName::Latex,
                StepName::Pdf,
            ],
            JobKind::Compare => &[
                StepName::ParseBase,
                StepName::ParseAlt,
                StepName::Analyze,
                StepName::Suggest,
                StepName::Rewrite,
                StepName::Diff,
                StepName::Latex,
                StepName::Pdf,
            ],
        }
    }

    /// Comparison sessions are the only ones that report `parse_alt`.
    pub fn infer(snapshot: &SessionSnapshot) -> Self {
        if snapshot.steps.contains_key(&StepName::ParseAlt) {
            JobKind::Compare
        } else {
            JobKind::Optimize
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobStep {
    pub state: JobState,
    pub started_at: Option<DateTime<Utc>>,
}

/// One read of a backend session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireSession")]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub status: JobState,
    pub steps: BTreeMap<StepName, JobStep>,
    pub pdf_ready: Option<bool>,
    pub improved_text: Option<String>,
    pub original_resume_text: Option<String>,
    pub analysis: Option<Value>,
    pub suggestions: Option<Value>,
    pub error: Option<String>,
}

#[cfg(test)]
impl SessionSnapshot {
    pub fn new(id: SessionId, status: JobState) -> Self {
        Self {
            id,
            status,
            steps: BTreeMap::new(),
            pdf_ready: None,
            improved_text: None,
            original_resume_text: None,
            analysis: None,
            suggestions: None,
            error: None,
        }
    }

    pub fn with_step(mut self, name: StepName, state: JobState) -> Self {
        self.steps.insert(
            name,
            JobStep {
                state,
                started_at: None,
            },
        );
        self
    }
}

impl SessionSnapshot {
    /// State of a step; steps the backend did not report are pending.
    pub fn step_state(&self, name: StepName) -> JobState {
        self.steps.get(&name).map(|s| s.state).unwrap_or_default()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[derive(Deserialize)]
struct WireSession {
    id: SessionId,
    #[serde(default)]
    status: JobState,
    #[serde(default)]
    steps: Option<BTreeMap<String, WireStep>>,
    #[serde(default)]
    pdf_ready: Option<bool>,
    #[serde(
        default,
        alias = "optimized_text",
        alias = "improvedText",
        alias = "optimizedText"
    )]
    improved_text: Option<String>,
    #[serde(
        default,
        alias = "original_text",
        alias = "resume_text",
        alias = "originalResumeText"
    )]
    original_resume_text: Option<String>,
    #[serde(default, alias = "analysis_results", alias = "job_analysis")]
    analysis: Option<Value>,
    #[serde(default)]
    suggestions: Option<Value>,
    #[serde(default, alias = "error_message")]
    error: Option<String>,
}

/// Steps arrive either as `{"state": "DONE", "started_at": ...}` or as a bare state.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireStep {
    Bare(JobState),
    Full {
        #[serde(default, alias = "status")]
        state: JobState,
        #[serde(default)]
        started_at: Option<String>,
    },
}

impl From<WireSession> for SessionSnapshot {
    fn from(wire: WireSession) -> Self {
        let mut steps = BTreeMap::new();
        for (name, step) in wire.steps.unwrap_or_default() {
            let Ok(name) = name.parse::<StepName>() else {
                debug!("Ignoring unknown step '{name}' in session {}", wire.id);
                continue;
            };
            let step = match step {
                WireStep::Bare(state) => JobStep {
                    state,
                    started_at: None,
                },
                WireStep::Full { state, started_at } => JobStep {
                    state,
                    started_at: started_at.as_deref().and_then(parse_timestamp),
                },
            };
            steps.insert(name, step);
        }

        SessionSnapshot {
            id: wire.id,
            status: wire.status,
            steps,
            pdf_ready: wire.pdf_ready,
            improved_text: wire.improved_text.filter(|t| !t.is_empty()),
            original_resume_text: wire.original_resume_text.filter(|t| !t.is_empty()),
            analysis: wire.analysis,
            suggestions: wire.suggestions,
            error: wire.error,
        }
    }
}

/// Accepts RFC 3339 or a naive ISO timestamp, which the backend sends in UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .ok()
}
