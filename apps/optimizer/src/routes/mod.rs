pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::diff::handlers as diff_handlers;
use crate::session::handlers as session_handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Diff API
        .route("/api/v1/diff", post(diff_handlers::handle_diff))
        .route(
            "/api/v1/diff/side-by-side",
            post(diff_handlers::handle_side_by_side),
        )
        // Session API
        .route(
            "/api/v1/sessions",
            post(session_handlers::handle_create_session),
        )
        .route(
            "/api/v1/sessions/:id",
            get(session_handlers::handle_get_session),
        )
        .route(
            "/api/v1/sessions/:id/events",
            get(session_handlers::handle_session_events),
        )
        .route(
            "/api/v1/sessions/:id/diff",
            get(session_handlers::handle_session_diff),
        )
        .route(
            "/api/v1/sessions/:id/latex",
            get(session_handlers::handle_session_latex),
        )
        .route(
            "/api/v1/sessions/:id/pdf",
            get(session_handlers::handle_session_pdf),
        )
        .with_state(state)
}
