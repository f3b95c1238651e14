//! In-process event bus.
//!
//! `LocalEventBus` implements the full readiness state machine with a FIFO
//! continuation queue and hands emitted events to an unbounded channel. It
//! backs the simulator and the test suite, and is a reference for hosts
//! wiring their own runtime.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::traits::{Continuation, EventBus, ReadinessState};
use crate::event::{EmittedEvent, EventName, EventPayload};

struct BusInner {
    state: ReadinessState,
    pending: VecDeque<Continuation>,
    start_requests: u64,
    /// Set while `mark_ready` is running queued continuations.
    draining: bool,
}

/// Channel-backed [`EventBus`] with explicit readiness control.
///
/// The bus reports `Ready` only after every continuation queued before
/// readiness has run, so deliveries that arrive while the queue is draining
/// line up behind it.
///
/// # Example
///
/// ```
/// use geobridge::bus::{EventBus, LocalEventBus, ReadinessState};
/// use geobridge::event::EventName;
///
/// let (bus, mut events) = LocalEventBus::new();
/// assert_eq!(bus.current_state(), ReadinessState::NotStarted);
///
/// bus.on_ready(Box::new(|| {}));
/// bus.start_if_needed();
/// bus.mark_ready();
///
/// bus.emit(EventName::DeviceBootCompleted, None);
/// assert_eq!(events.try_recv().unwrap().name, EventName::DeviceBootCompleted);
/// ```
pub struct LocalEventBus {
    inner: Mutex<BusInner>,
    events_tx: mpsc::UnboundedSender<EmittedEvent>,
    startup_delay: Option<Duration>,
    self_ref: Weak<LocalEventBus>,
}

impl LocalEventBus {
    /// Create a bus that becomes ready only when [`mark_ready`](Self::mark_ready)
    /// is called.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<EmittedEvent>) {
        Self::build(None)
    }

    /// Create a bus that finishes starting `delay` after startup is requested.
    ///
    /// The timer runs on the current Tokio runtime.
    pub fn with_startup_delay(
        delay: Duration,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<EmittedEvent>) {
        Self::build(Some(delay))
    }

    fn build(
        startup_delay: Option<Duration>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<EmittedEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let bus = Arc::new_cyclic(|self_ref| Self {
            inner: Mutex::new(BusInner {
                state: ReadinessState::NotStarted,
                pending: VecDeque::new(),
                start_requests: 0,
                draining: false,
            }),
            events_tx,
            startup_delay,
            self_ref: self_ref.clone(),
        });
        (bus, events_rx)
    }

    /// Signal that the runtime finished initializing.
    ///
    /// Runs queued continuations in registration order, then flips the state
    /// to `Ready`. Calling it again, or from inside a continuation, is a no-op.
    pub fn mark_ready(&self) {
        {
            let mut inner = self.inner.lock();
            if inner.state.is_ready() || inner.draining {
                return;
            }
            inner.draining = true;
        }

        let mut ran = 0usize;
        loop {
            let next = {
                let mut inner = self.inner.lock();
                match inner.pending.pop_front() {
                    Some(continuation) => continuation,
                    None => {
                        inner.state = ReadinessState::Ready;
                        inner.draining = false;
                        break;
                    }
                }
            };
            next();
            ran += 1;
        }

        info!(continuations = ran, "Event bus ready");
    }

    /// Number of times startup was actually triggered.
    pub fn start_requests(&self) -> u64 {
        self.inner.lock().start_requests
    }

    /// Continuations waiting for readiness.
    pub fn pending_continuations(&self) -> usize {
        self.inner.lock().pending.len()
    }
}

impl EventBus for LocalEventBus {
    fn current_state(&self) -> ReadinessState {
        self.inner.lock().state
    }

    fn on_ready(&self, continuation: Continuation) {
        let mut inner = self.inner.lock();
        if inner.state.is_ready() {
            drop(inner);
            continuation();
        } else {
            inner.pending.push_back(continuation);
        }
    }

    fn start_if_needed(&self) {
        {
            let mut inner = self.inner.lock();
            if inner.state != ReadinessState::NotStarted {
                return;
            }
            inner.state = ReadinessState::Starting;
            inner.start_requests += 1;
        }

        info!("Starting event bus runtime");

        let Some(delay) = self.startup_delay else {
            return;
        };
        let Some(bus) = self.self_ref.upgrade() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    bus.mark_ready();
                });
            }
            Err(_) => {
                warn!("No Tokio runtime for startup timer, waiting for mark_ready()");
            }
        }
    }

    fn emit(&self, event_name: EventName, payload: Option<EventPayload>) {
        debug!(event = %event_name, payload = ?payload, "Emitting event");
        if self
            .events_tx
            .send(EmittedEvent::new(event_name, payload))
            .is_err()
        {
            debug!(event = %event_name, "Event receiver dropped, event discarded");
        }
    }
}
