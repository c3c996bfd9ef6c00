//! Backend client: the single point of entry for calls to the resume
//! optimization backend (parsing, AI analysis, LaTeX/PDF compilation).
//!
//! Payload normalization happens here, at the network boundary: everything
//! past this module sees the canonical `SessionSnapshot`.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::session::models::{SessionId, SessionSnapshot};

const MAX_CREATE_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Session {0} not found")]
    NotFound(SessionId),

    #[error("Session {0} has no optimized text")]
    MissingText(SessionId),
}

/// Read access to backend sessions. The poller and the page handlers depend
/// on this seam rather than on `BackendClient`, so tests can script snapshots.
#[async_trait]
pub trait SessionSource: Send + Sync {
    async fn fetch_session(&self, id: SessionId) -> Result<SessionSnapshot, BackendError>;

    /// Fetches the optimized text for sessions that do not embed it.
    async fn fetch_optimized_text(&self, id: SessionId) -> Result<String, BackendError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub resume_text: String,
    pub job_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare_resume_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    #[serde(alias = "id", alias = "sessionId")]
    pub session_id: SessionId,
}

#[derive(Debug, Deserialize)]
struct OptimizedTextResponse {
    #[serde(
        default,
        alias = "optimized_text",
        alias = "improvedText",
        alias = "optimizedText",
        alias = "text"
    )]
    improved_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BackendErrorBody {
    #[serde(alias = "detail", alias = "error")]
    message: String,
}

#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    retry_backoff: Duration,
}

impl BackendClient {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            retry_backoff: Duration::from_secs(1),
        })
    }

    /// Overrides the base delay of the create-session backoff (1s, 2s, ...).
    #[cfg(test)]
    pub fn with_retry_backoff(mut self, base: Duration) -> Self {
        self.retry_backoff = base;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Starts an optimization (or comparison) job and returns its session id.
    /// Retries on 429 and 5xx with exponential backoff; this is a one-shot
    /// user action, unlike polling, which never retries.
    pub async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<SessionId, BackendError> {
        let mut last_error: Option<BackendError> = None;

        for attempt in 0..MAX_CREATE_ATTEMPTS {
            if attempt > 0 {
                let delay = self.retry_backoff * (1 << (attempt - 1));
                warn!(
                    "Create session attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .authorized(self.client.post(self.url("sessions")))
                .json(request)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(BackendError::Http(e));
                    continue;
                }
            };

            let status = response.status();
            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("Backend returned {} on session create: {}", status, body);
                last_error = Some(BackendError::Api {
                    status: status.as_u16(),
                    message: error_message(body),
                });
                continue;
            }

            let body = ensure_success(response).await?.text().await?;
            let created: CreateSessionResponse = serde_json::from_str(&body)?;
            debug!("Backend created session {}", created.session_id);
            return Ok(created.session_id);
        }

        Err(last_error.unwrap_or(BackendError::Api {
            status: 503,
            message: "session creation failed".to_string(),
        }))
    }

    pub async fn fetch_latex(&self, id: SessionId) -> Result<String, BackendError> {
        let response = self.get_session_resource(id, "latex").await?;
        Ok(response.text().await?)
    }

    pub async fn fetch_pdf(&self, id: SessionId) -> Result<Bytes, BackendError> {
        let response = self.get_session_resource(id, "pdf").await?;
        Ok(response.bytes().await?)
    }

    async fn get_session_resource(
        &self,
        id: SessionId,
        resource: &str,
    ) -> Result<Response, BackendError> {
        let path = if resource.is_empty() {
            format!("sessions/{id}")
        } else {
            format!("sessions/{id}/{resource}")
        };
        let response = self
            .authorized(self.client.get(self.url(&path)))
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(BackendError::NotFound(id));
        }
        ensure_success(response).await
    }
}

#[async_trait]
impl SessionSource for BackendClient {
    async fn fetch_session(&self, id: SessionId) -> Result<SessionSnapshot, BackendError> {
        let body = self.get_session_resource(id, "").await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn fetch_optimized_text(&self, id: SessionId) -> Result<String, BackendError> {
        let body = self
            .get_session_resource(id, "optimized-text")
            .await?
            .text()
            .await?;
        let parsed: OptimizedTextResponse = serde_json::from_str(&body)?;
        parsed
            .improved_text
            .filter(|t| !t.trim().is_empty())
            .ok_or(BackendError::MissingText(id))
    }
}

async fn ensure_success(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Api {
        status: status.as_u16(),
        message: error_message(body),
    })
}

/// Pulls the message out of `{"detail": ...}`-style bodies, else returns the raw body.
fn error_message(body: String) -> String {
    serde_json::from_str::<BackendErrorBody>(&body)
        .map(|e| e.message)
        .unwrap_or(body)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use axum::{
        extract::{Path, State},
        http::StatusCode,
        routing::{get, post},
        Json, Router,
    };
    use serde_json::{json, Value};

    use super::*;
    use crate::session::models::{JobState, StepName};

    /// Serves `router` on an ephemeral port and returns a client pointed at it.
    async fn serve(router: Router) -> BackendClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        BackendClient::new(format!("http://{addr}/"), None, Duration::from_secs(5))
            .unwrap()
            .with_retry_backoff(Duration::from_millis(10))
    }

    #[test]
    fn test_error_message_prefers_detail() {
        assert_eq!(error_message(r#"{"detail": "bad id"}"#.to_string()), "bad id");
        assert_eq!(error_message("gateway timeout".to_string()), "gateway timeout");
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let client = BackendClient::new("http://backend/api/", None, Duration::from_secs(1)).unwrap();
        assert_eq!(client.url("/sessions/3"), "http://backend/api/sessions/3");
    }

    #[tokio::test]
    async fn test_fetch_session_normalizes_payload() {
        let router = Router::new().route(
            "/sessions/:id",
            get(|Path(id): Path<i64>| async move {
                Json(json!({
                    "id": id,
                    "status": "RUNNING",
                    "steps": {"parse_base": "DONE", "suggest": {"state": "RUNNING"}},
                    "optimizedText": "Improved"
                }))
            }),
        );
        let client = serve(router).await;

        let snapshot = client.fetch_session(11).await.unwrap();
        assert_eq!(snapshot.id, 11);
        assert_eq!(snapshot.step_state(StepName::Suggest), JobState::Running);
        assert_eq!(snapshot.improved_text.as_deref(), Some("Improved"));
    }

    #[tokio::test]
    async fn test_fetch_session_maps_404() {
        let client = serve(Router::new()).await;
        let err = client.fetch_session(5).await.unwrap_err();
        assert!(matches!(err, BackendError::NotFound(5)), "{err}");
    }

    #[tokio::test]
    async fn test_fetch_session_malformed_json_is_parse_error() {
        let router = Router::new().route("/sessions/:id", get(|| async { "not json" }));
        let client = serve(router).await;
        let err = client.fetch_session(5).await.unwrap_err();
        assert!(matches!(err, BackendError::Parse(_)), "{err}");
    }

    #[tokio::test]
    async fn test_optimized_text_missing_is_reported() {
        let router = Router::new().route(
            "/sessions/:id/optimized-text",
            get(|| async { Json(json!({"improved_text": null})) }),
        );
        let client = serve(router).await;
        let err = client.fetch_optimized_text(8).await.unwrap_err();
        assert!(matches!(err, BackendError::MissingText(8)), "{err}");
    }

    #[tokio::test]
    async fn test_create_session_retries_server_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let router = Router::new()
            .route(
                "/sessions",
                post(
                    |State(calls): State<Arc<AtomicU32>>, Json(body): Json<Value>| async move {
                        assert_eq!(body["job_description"], "Rust engineer");
                        if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                            return Err((StatusCode::SERVICE_UNAVAILABLE, "warming up"));
                        }
                        Ok(Json(json!({"id": 77})))
                    },
                ),
            )
            .with_state(calls.clone());
        let client = serve(router).await;

        let id = client
            .create_session(&CreateSessionRequest {
                resume_text: "Jane Doe".into(),
                job_description: "Rust engineer".into(),
                compare_resume_text: None,
            })
            .await
            .unwrap();
        assert_eq!(id, 77);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_create_session_does_not_retry_client_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let router = Router::new()
            .route(
                "/sessions",
                post(|State(calls): State<Arc<AtomicU32>>| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({"detail": "empty resume"})))
                }),
            )
            .with_state(calls.clone());
        let client = serve(router).await;

        let err = client
            .create_session(&CreateSessionRequest {
                resume_text: String::new(),
                job_description: "x".into(),
                compare_resume_text: None,
            })
            .await
            .unwrap_err();
        match err {
            BackendError::Api { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "empty resume");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
