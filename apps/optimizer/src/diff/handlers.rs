//! Axum route handlers for ad-hoc diffs of two texts.

use axum::Json;
use serde::{Deserialize, Serialize};

use crate::diff::cleanup::clean_markup;
use crate::diff::{diff, side_by_side, DiffRecord, DiffStats, SideBySideRow};
use crate::errors::AppError;

#[derive(Debug, Deserialize)]
pub struct DiffRequest {
    pub original: String,
    pub optimized: String,
    /// Strip leftover LaTeX from both sides before diffing.
    #[serde(default)]
    pub clean: bool,
}

#[derive(Debug, Serialize)]
pub struct DiffResponse {
    pub records: Vec<DiffRecord>,
    pub stats: DiffStats,
}

#[derive(Debug, Serialize)]
pub struct SideBySideResponse {
    pub rows: Vec<SideBySideRow>,
    pub stats: DiffStats,
}

/// Largest input accepted per side, in bytes. Resumes are far below this.
const MAX_TEXT_BYTES: usize = 512 * 1024;

fn validate(request: &DiffRequest) -> Result<(), AppError> {
    if request.original.len() > MAX_TEXT_BYTES || request.optimized.len() > MAX_TEXT_BYTES {
        return Err(AppError::Validation(format!(
            "texts must be at most {MAX_TEXT_BYTES} bytes"
        )));
    }
    Ok(())
}

/// Cleans (optionally) and diffs two texts off the async executor.
pub async fn diff_texts(
    original: String,
    optimized: String,
    clean: bool,
) -> Result<Vec<DiffRecord>, AppError> {
    tokio::task::spawn_blocking(move || {
        if clean {
            diff(&clean_markup(&original), &clean_markup(&optimized))
        } else {
            diff(&original, &optimized)
        }
    })
    .await
    .map_err(|e| AppError::Internal(anyhow::anyhow!("spawn_blocking failed in diff: {e}")))
}

/// POST /api/v1/diff
pub async fn handle_diff(Json(request): Json<DiffRequest>) -> Result<Json<DiffResponse>, AppError> {
    validate(&request)?;
    let records = diff_texts(request.original, request.optimized, request.clean).await?;
    let stats = DiffStats::from_records(&records);
    Ok(Json(DiffResponse { records, stats }))
}

/// POST /api/v1/diff/side-by-side
pub async fn handle_side_by_side(
    Json(request): Json<DiffRequest>,
) -> Result<Json<SideBySideResponse>, AppError> {
    validate(&request)?;
    let records = diff_texts(request.original, request.optimized, request.clean).await?;
    Ok(Json(SideBySideResponse {
        rows: side_by_side(&records),
        stats: DiffStats::from_records(&records),
    }))
}
