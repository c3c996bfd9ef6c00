//! Axum route handlers for backend sessions: creation, snapshots, the polling
//! event stream, the review diff, and exports.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    Json,
};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::backend_client::{CreateSessionRequest, CreateSessionResponse};
use crate::diff::handlers::diff_texts;
use crate::diff::{has_changes, side_by_side, DiffRecord, DiffStats, SideBySideRow};
use crate::errors::AppError;
use crate::session::models::{JobKind, JobState, SessionId, SessionSnapshot, StepName};
use crate::session::poller::{
    ChannelObserver, PollErrorKind, PollEvent, PollOptions, SessionPoller,
};
use crate::session::progress::Progress;
use crate::state::AppState;

/// Sub-second polling only adds backend load.
const MIN_POLL_INTERVAL_MS: u64 = 1000;

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub kind: Option<JobKind>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session: SessionSnapshot,
    pub progress: Progress,
    /// True when the backend reports the job as failed, as opposed to a
    /// connectivity problem.
    pub job_failed: bool,
}

impl SessionResponse {
    fn new(session: SessionSnapshot, kind: Option<JobKind>) -> Self {
        let kind = kind.unwrap_or_else(|| JobKind::infer(&session));
        let progress = session.progress(kind);
        let job_failed = session.status == JobState::Error;
        Self {
            session,
            progress,
            job_failed,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Stop once this step is DONE instead of waiting for the whole job.
    pub until_step: Option<StepName>,
    pub kind: Option<JobKind>,
    pub interval_ms: Option<u64>,
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffView {
    #[default]
    Unified,
    SideBySide,
}

#[derive(Debug, Deserialize)]
pub struct SessionDiffQuery {
    #[serde(default)]
    pub view: DiffView,
    pub clean: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct SessionDiffResponse {
    pub session_id: SessionId,
    pub has_changes: bool,
    pub stats: DiffStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<DiffRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<SideBySideRow>>,
}

/// POST /api/v1/sessions
///
/// Starts an optimization job on the backend. Comparison jobs pass
/// `compare_resume_text`.
pub async fn handle_create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>, AppError> {
    if request.resume_text.trim().is_empty() {
        return Err(AppError::Validation("resume_text cannot be empty".to_string()));
    }
    if request.job_description.trim().is_empty() {
        return Err(AppError::Validation(
            "job_description cannot be empty".to_string(),
        ));
    }

    let session_id = state.backend.create_session(&request).await?;
    info!("Created session {session_id}");
    Ok(Json(CreateSessionResponse { session_id }))
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<SessionResponse>, AppError> {
    let snapshot = state.sessions.fetch_session(id).await?;
    Ok(Json(SessionResponse::new(snapshot, query.kind)))
}

/// GET /api/v1/sessions/:id/events
///
/// Server-sent events driven by a `SessionPoller`: one `update` per fetched
/// snapshot, then a single `complete` or `error`. The poller lives inside the
/// stream, so a client disconnect tears it down.
pub async fn handle_session_events(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
    Query(query): Query<EventsQuery>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let interval_ms = query
        .interval_ms
        .unwrap_or(state.config.poll_interval_ms)
        .max(MIN_POLL_INTERVAL_MS);
    let max_attempts = query.max_attempts.unwrap_or(state.config.poll_max_attempts);
    let mut options = PollOptions::new(Duration::from_millis(interval_ms), max_attempts);
    if let Some(step) = query.until_step {
        options = options.until_step_done(step);
    }

    let (observer, rx) = ChannelObserver::new();
    let mut poller = SessionPoller::new(state.sessions.clone(), Arc::new(observer), options);
    poller.set_session(Some(id));

    let kind = query.kind;
    let events = stream::unfold(Some((rx, poller)), move |run| async move {
        let (mut rx, poller) = run?;
        let event = rx.recv().await?;
        let next = if event.is_terminal() {
            debug!(
                "Event stream for session {id} finished after {} attempts",
                poller.attempts_made()
            );
            None
        } else {
            Some((rx, poller))
        };
        Some((to_sse(event, kind), next))
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

#[derive(Serialize)]
struct StreamError<'a> {
    kind: PollErrorKind,
    message: &'a str,
}

fn to_sse(event: PollEvent, kind: Option<JobKind>) -> Result<Event, axum::Error> {
    match event {
        PollEvent::Update(snapshot) => Event::default()
            .event("update")
            .json_data(SessionResponse::new(snapshot, kind)),
        PollEvent::Complete(snapshot) => Event::default()
            .event("complete")
            .json_data(SessionResponse::new(snapshot, kind)),
        PollEvent::Failed { kind, message } => Event::default()
            .event("error")
            .json_data(StreamError {
                kind,
                message: &message,
            }),
    }
}

/// GET /api/v1/sessions/:id/diff
///
/// Diffs the session's original text against the optimized text. The
/// optimized text comes from the snapshot when embedded, otherwise from the
/// backend's optimized-text resource.
pub async fn handle_session_diff(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
    Query(query): Query<SessionDiffQuery>,
) -> Result<Json<SessionDiffResponse>, AppError> {
    let snapshot = state.sessions.fetch_session(id).await?;

    let original = snapshot.original_resume_text.ok_or_else(|| {
        AppError::Conflict(format!("Original text for session {id} is not available"))
    })?;
    let optimized = match snapshot.improved_text {
        Some(text) => text,
        None => {
            debug!("Session {id} does not embed optimized text, fetching it");
            state.sessions.fetch_optimized_text(id).await?
        }
    };

    let records = diff_texts(original, optimized, query.clean.unwrap_or(true)).await?;
    let stats = DiffStats::from_records(&records);
    let changed = has_changes(&records);
    let (records, rows) = match query.view {
        DiffView::Unified => (Some(records), None),
        DiffView::SideBySide => (None, Some(side_by_side(&records))),
    };

    Ok(Json(SessionDiffResponse {
        session_id: id,
        has_changes: changed,
        stats,
        records,
        rows,
    }))
}

/// GET /api/v1/sessions/:id/latex
pub async fn handle_session_latex(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
) -> Result<impl IntoResponse, AppError> {
    let latex = state.backend.fetch_latex(id).await?;
    Ok(([(header::CONTENT_TYPE, "application/x-tex; charset=utf-8")], latex))
}

/// GET /api/v1/sessions/:id/pdf
pub async fn handle_session_pdf(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
) -> Result<impl IntoResponse, AppError> {
    let pdf = state.backend.fetch_pdf(id).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"resume-{id}.pdf\""),
            ),
        ],
        pdf,
    ))
}
