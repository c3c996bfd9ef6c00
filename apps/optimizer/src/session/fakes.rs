//! Scripted `SessionSource` used by poller and route tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::backend_client::{BackendError, SessionSource};
use crate::session::models::{SessionId, SessionSnapshot};

enum Mode {
    /// Returns queued results in order.
    Script(Mutex<VecDeque<Result<SessionSnapshot, BackendError>>>),
    /// Returns the same snapshot forever.
    Repeat(SessionSnapshot),
    /// Never resolves.
    Block,
    /// Resolves once `release` is called.
    Gate(SessionSnapshot, Notify),
}

pub struct ScriptedSessions {
    mode: Mode,
    requested: Mutex<Vec<SessionId>>,
    optimized_text: Option<String>,
}

impl ScriptedSessions {
    fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            requested: Mutex::new(Vec::new()),
            optimized_text: None,
        }
    }

    pub fn new(script: Vec<Result<SessionSnapshot, BackendError>>) -> Self {
        Self::with_mode(Mode::Script(Mutex::new(script.into())))
    }

    pub fn repeating(snapshot: SessionSnapshot) -> Self {
        Self::with_mode(Mode::Repeat(snapshot))
    }

    pub fn blocking() -> Self {
        Self::with_mode(Mode::Block)
    }

    pub fn gated(snapshot: SessionSnapshot) -> Self {
        Self::with_mode(Mode::Gate(snapshot, Notify::new()))
    }

    pub fn with_optimized_text(mut self, text: &str) -> Self {
        self.optimized_text = Some(text.to_string());
        self
    }

    pub fn release(&self) {
        if let Mode::Gate(_, notify) = &self.mode {
            notify.notify_one();
        }
    }

    pub fn calls(&self) -> usize {
        self.requested.lock().unwrap().len()
    }

    pub fn requested_ids(&self) -> Vec<SessionId> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionSource for ScriptedSessions {
    async fn fetch_session(&self, id: SessionId) -> Result<SessionSnapshot, BackendError> {
        self.requested.lock().unwrap().push(id);

        if let Mode::Script(queue) = &self.mode {
            let next = queue.lock().unwrap().pop_front();
            return next.unwrap_or(Err(BackendError::Api {
                status: 599,
                message: "script exhausted".to_string(),
            }));
        }

        match &self.mode {
            Mode::Repeat(snapshot) => Ok(snapshot.clone()),
            Mode::Block => std::future::pending().await,
            Mode::Gate(snapshot, notify) => {
                notify.notified().await;
                Ok(snapshot.clone())
            }
            Mode::Script(_) => unreachable!(),
        }
    }

    async fn fetch_optimized_text(&self, id: SessionId) -> Result<String, BackendError> {
        self.optimized_text
            .clone()
            .ok_or(BackendError::MissingText(id))
    }
}
