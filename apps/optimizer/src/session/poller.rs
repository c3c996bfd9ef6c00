//! Session poller: fetches a backend session on a fixed cadence until a stop
//! condition is met, reporting every snapshot to a `PollObserver`.
//!
//! Each run is one Tokio task executing `fetch → notify → decide → sleep`, so a
//! fetch is never issued before the previous one completed. Notifications go
//! through a `DeliveryGate`; `stop()` closes the gate before aborting the task,
//! which means no callback can fire once `stop()` has returned, even if a fetch
//! was in flight.
//!
//! Fetch errors are not retried here. Retrying is the caller's decision, made
//! on `on_error`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backend_client::{BackendError, SessionSource};
use crate::session::models::{JobState, SessionId, SessionSnapshot, StepName};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 60;

pub type ContinuePredicate = Arc<dyn Fn(&SessionSnapshot) -> bool + Send + Sync>;

#[derive(Debug, Error)]
pub enum PollError {
    #[error("failed to fetch session: {0}")]
    Fetch(#[from] BackendError),

    #[error("session still running after {attempts} attempts")]
    TimedOut { attempts: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollErrorKind {
    Fetch,
    Timeout,
}

impl PollError {
    pub fn kind(&self) -> PollErrorKind {
        match self {
            PollError::Fetch(_) => PollErrorKind::Fetch,
            PollError::TimedOut { .. } => PollErrorKind::Timeout,
        }
    }
}

/// Receives poll results. Calls for one run are serialized and never overlap.
/// Implementations must not block and must not call back into the poller.
pub trait PollObserver: Send + Sync {
    /// Every successful fetch, before the continue/stop decision.
    fn on_update(&self, snapshot: &SessionSnapshot);

    /// Once, when `should_continue` first returns false.
    fn on_complete(&self, snapshot: &SessionSnapshot);

    /// Once, on a failed fetch or when attempts run out.
    fn on_error(&self, error: &PollError);
}

#[derive(Clone)]
pub struct PollOptions {
    pub interval: Duration,
    pub max_attempts: u32,
    pub should_continue: ContinuePredicate,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            should_continue: Arc::new(|snapshot: &SessionSnapshot| !snapshot.is_terminal()),
        }
    }
}

impl PollOptions {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            ..Self::default()
        }
    }

    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&SessionSnapshot) -> bool + Send + Sync + 'static,
    {
        self.should_continue = Arc::new(predicate);
        self
    }

    /// Stops as soon as `step` is DONE, even while later steps keep running
    /// server-side. A failed session stops too.
    pub fn until_step_done(self, step: StepName) -> Self {
        self.with_predicate(move |snapshot| {
            snapshot.step_state(step) != JobState::Done && !snapshot.is_terminal()
        })
    }
}

/// Serializes observer calls against teardown.
struct DeliveryGate {
    open: Mutex<bool>,
}

impl DeliveryGate {
    fn new() -> Self {
        Self {
            open: Mutex::new(true),
        }
    }

    /// Runs `notify` if the gate is still open. Returns whether it ran.
    fn deliver(&self, notify: impl FnOnce()) -> bool {
        let open = self.open.lock().unwrap_or_else(PoisonError::into_inner);
        if *open {
            notify();
        }
        *open
    }

    /// Runs a terminal `notify` if open, then closes the gate.
    fn finish(&self, notify: impl FnOnce()) {
        let mut open = self.open.lock().unwrap_or_else(PoisonError::into_inner);
        if *open {
            notify();
            *open = false;
        }
    }

    fn close(&self) {
        *self.open.lock().unwrap_or_else(PoisonError::into_inner) = false;
    }
}

struct ActiveRun {
    session_id: SessionId,
    gate: Arc<DeliveryGate>,
    attempts: Arc<AtomicU32>,
    task: JoinHandle<()>,
}

/// Polls one session at a time. Dropping the poller stops it.
pub struct SessionPoller {
    source: Arc<dyn SessionSource>,
    observer: Arc<dyn PollObserver>,
    options: PollOptions,
    run: Option<ActiveRun>,
}

impl SessionPoller {
    pub fn new(
        source: Arc<dyn SessionSource>,
        observer: Arc<dyn PollObserver>,
        options: PollOptions,
    ) -> Self {
        Self {
            source,
            observer,
            options,
            run: None,
        }
    }

    /// `Some(id)` starts (or keeps) polling `id`; `None` stops polling.
    pub fn set_session(&mut self, session_id: Option<SessionId>) {
        match session_id {
            Some(id) => self.start(id),
            None => self.stop(),
        }
    }

    /// Starts polling `session_id`. A no-op while already polling the same id;
    /// a different id tears down the current run first. Must be called from
    /// within a Tokio runtime.
    pub fn start(&mut self, session_id: SessionId) {
        if let Some(run) = &self.run {
            if run.session_id == session_id && !run.task.is_finished() {
                debug!("Already polling session {session_id}");
                return;
            }
        }
        self.stop();

        let gate = Arc::new(DeliveryGate::new());
        let attempts = Arc::new(AtomicU32::new(0));
        let task = tokio::spawn(poll_loop(
            self.source.clone(),
            self.observer.clone(),
            self.options.clone(),
            session_id,
            gate.clone(),
            attempts.clone(),
        ));
        info!("Started polling session {session_id}");

        self.run = Some(ActiveRun {
            session_id,
            gate,
            attempts,
            task,
        });
    }

    /// Stops the current run. No observer call happens after this returns.
    pub fn stop(&mut self) {
        if let Some(run) = self.run.take() {
            run.gate.close();
            run.task.abort();
            debug!(
                "Stopped polling session {} after {} attempts",
                run.session_id,
                run.attempts.load(Ordering::SeqCst)
            );
        }
    }

    // The SSE stream tracks liveness through its channel instead.
    #[allow(dead_code)]
    pub fn is_active(&self) -> bool {
        self.run.as_ref().is_some_and(|run| !run.task.is_finished())
    }

    #[cfg(test)]
    pub fn session_id(&self) -> Option<SessionId> {
        self.run.as_ref().map(|run| run.session_id)
    }

    pub fn attempts_made(&self) -> u32 {
        self.run
            .as_ref()
            .map_or(0, |run| run.attempts.load(Ordering::SeqCst))
    }
}

impl Drop for SessionPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn poll_loop(
    source: Arc<dyn SessionSource>,
    observer: Arc<dyn PollObserver>,
    options: PollOptions,
    session_id: SessionId,
    gate: Arc<DeliveryGate>,
    attempts: Arc<AtomicU32>,
) {
    let max_attempts = options.max_attempts.max(1);

    loop {
        let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Polling session {session_id} (attempt {attempt}/{max_attempts})");

        let snapshot = match source.fetch_session(session_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Polling session {session_id} failed: {e}");
                let error = PollError::Fetch(e);
                gate.finish(|| observer.on_error(&error));
                return;
            }
        };

        if !gate.deliver(|| observer.on_update(&snapshot)) {
            return;
        }

        if !(options.should_continue)(&snapshot) {
            info!(
                "Session {session_id} reached {:?} after {attempt} attempts",
                snapshot.status
            );
            gate.finish(|| observer.on_complete(&snapshot));
            return;
        }

        if attempt >= max_attempts {
            warn!("Giving up on session {session_id} after {attempt} attempts");
            let error = PollError::TimedOut { attempts: attempt };
            gate.finish(|| observer.on_error(&error));
            return;
        }

        tokio::time::sleep(options.interval).await;
    }
}

/// Owned form of an observer callback, for consumers that prefer a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    Update(SessionSnapshot),
    Complete(SessionSnapshot),
    Failed { kind: PollErrorKind, message: String },
}

impl PollEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollEvent::Update(_))
    }
}

/// Forwards observer calls into an unbounded channel.
pub struct ChannelObserver {
    tx: UnboundedSender<PollEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, UnboundedReceiver<PollEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: PollEvent) {
        // A dropped receiver means nobody is listening any more.
        let _ = self.tx.send(event);
    }
}

impl PollObserver for ChannelObserver {
    fn on_update(&self, snapshot: &SessionSnapshot) {
        self.send(PollEvent::Update(snapshot.clone()));
    }

    fn on_complete(&self, snapshot: &SessionSnapshot) {
        self.send(PollEvent::Complete(snapshot.clone()));
    }

    fn on_error(&self, error: &PollError) {
        self.send(PollEvent::Failed {
            kind: error.kind(),
            message: error.to_string(),
        });
    }
}
