// Line diff between original and optimized resume text, plus the views the
// review page renders. The engine is pure; markup cleanup is opt-in per call.

pub mod cleanup;
pub mod engine;
pub mod handlers;
pub mod views;

pub use engine::{diff, has_changes, DiffRecord};
pub use views::{side_by_side, DiffStats, SideBySideRow};
