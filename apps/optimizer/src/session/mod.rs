// Session tracking: snapshot model, progress derivation, polling, and the
// session-scoped routes (events stream, diff, exports).

pub mod handlers;
pub mod models;
pub mod poller;
pub mod progress;

#[cfg(test)]
pub mod fakes;
