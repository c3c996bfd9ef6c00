//! Progress bar percentage and step label derived from a snapshot's steps.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::session::models::{JobKind, JobState, JobStep, SessionSnapshot, StepName};

/// Percent shown once any step has started, so the bar never sits at zero
/// right after the backend accepted the job.
pub const MIN_STARTED_PERCENT: u8 = 15;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub percent: u8,
    pub label: String,
    /// The running step, or the next pending one.
    pub current_step: Option<StepName>,
}

/// Derives progress for `expected` steps in pipeline order.
///
/// A DONE step counts as one unit and a RUNNING step as half a unit, so the
/// bar moves midway through long steps. Steps missing from `steps` are pending.
pub fn derive_progress(steps: &BTreeMap<StepName, JobStep>, expected: &[StepName]) -> Progress {
    let state_of = |name: StepName| steps.get(&name).map(|s| s.state).unwrap_or_default();

    if expected.is_empty() {
        return Progress {
            percent: 0,
            label: "Waiting".to_string(),
            current_step: None,
        };
    }

    // Half-units keep the arithmetic integral.
    let mut half_units = 0usize;
    let mut started = false;
    for name in expected {
        match state_of(*name) {
            JobState::Done => {
                half_units += 2;
                started = true;
            }
            JobState::Running => {
                half_units += 1;
                started = true;
            }
            JobState::Error => started = true,
            JobState::Pending => {}
        }
    }

    let mut percent = (half_units * 100 / (expected.len() * 2)).min(100) as u8;
    if started {
        percent = percent.max(MIN_STARTED_PERCENT);
    }

    let failed = expected.iter().find(|n| state_of(**n) == JobState::Error);
    let running = expected.iter().find(|n| state_of(**n) == JobState::Running);
    let next = expected.iter().find(|n| state_of(**n) != JobState::Done);

    let (label, current_step) = match (failed, running, next) {
        (Some(step), _, _) => (format!("Failed during {}", step.title()), Some(*step)),
        (None, Some(step), _) => (step.activity().to_string(), Some(*step)),
        (None, None, Some(step)) => (format!("Preparing {}", step.title()), Some(*step)),
        (None, None, None) => ("Complete".to_string(), None),
    };

    Progress {
        percent,
        label,
        current_step,
    }
}

impl SessionSnapshot {
    /// Progress for the whole snapshot. A finished session is 100% even when
    /// optional steps never ran; a running session is at least at the floor.
    pub fn progress(&self, kind: JobKind) -> Progress {
        if self.status == JobState::Done {
            return Progress {
                percent: 100,
                label: "Complete".to_string(),
                current_step: None,
            };
        }
        let mut progress = derive_progress(&self.steps, kind.steps());
        if self.status == JobState::Running {
            progress.percent = progress.percent.max(MIN_STARTED_PERCENT);
        }
        progress
    }
}
