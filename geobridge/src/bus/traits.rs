//! Event bus trait and readiness state.

use std::fmt;

use crate::event::{EventName, EventPayload};

/// One-shot work to run when the bus becomes ready.
pub type Continuation = Box<dyn FnOnce() + Send + 'static>;

/// Process-wide readiness of the runtime's message bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessState {
    NotStarted,
    Starting,
    Ready,
}

impl ReadinessState {
    pub fn is_ready(&self) -> bool {
        matches!(self, ReadinessState::Ready)
    }
}

impl fmt::Display for ReadinessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReadinessState::NotStarted => "not_started",
            ReadinessState::Starting => "starting",
            ReadinessState::Ready => "ready",
        };
        f.write_str(s)
    }
}

/// Cross-boundary channel into the embedding runtime.
///
/// # Contract
///
/// - [`on_ready`](Self::on_ready) runs each continuation exactly once. If
///   the bus is already ready the continuation runs promptly.
/// - [`start_if_needed`](Self::start_if_needed) is idempotent; it only acts
///   when the runtime has not begun starting.
/// - [`emit`](Self::emit) is only called once the bus is ready.
pub trait EventBus: Send + Sync {
    fn current_state(&self) -> ReadinessState;

    fn on_ready(&self, continuation: Continuation);

    fn start_if_needed(&self);

    fn emit(&self, event_name: EventName, payload: Option<EventPayload>);
}
