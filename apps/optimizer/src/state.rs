use std::sync::Arc;

use crate::backend_client::{BackendClient, SessionSource};
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Session creation and export downloads.
    pub backend: BackendClient,
    /// Session reads. In production this is the same `BackendClient`.
    pub sessions: Arc<dyn SessionSource>,
    pub config: Config,
}

impl AppState {
    pub fn new(backend: BackendClient, config: Config) -> Self {
        Self {
            sessions: Arc::new(backend.clone()),
            backend,
            config,
        }
    }
}
