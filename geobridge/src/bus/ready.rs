//! Deliver-when-ready gating shared by transition and boot handling.

use std::sync::Arc;

use tracing::debug;

use super::traits::{EventBus, ReadinessState};

/// How [`deliver_when_ready`] scheduled its work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryTiming {
    /// The bus was ready and the work already ran.
    Immediate,
    /// The work is parked until the bus becomes ready.
    Deferred,
}

/// Run `thunk` against the bus now if it is ready, otherwise once it is.
///
/// When the bus is not ready the thunk is registered as a one-shot
/// continuation first, and only then is runtime startup requested (when
/// `start_runtime` is set), so a synchronous startup cannot fire before the
/// continuation is queued.
pub fn deliver_when_ready<F>(bus: &Arc<dyn EventBus>, start_runtime: bool, thunk: F) -> DeliveryTiming
where
    F: FnOnce(&dyn EventBus) + Send + 'static,
{
    match bus.current_state() {
        ReadinessState::Ready => {
            thunk(bus.as_ref());
            DeliveryTiming::Immediate
        }
        state => {
            debug!(state = %state, "Event bus not ready, deferring delivery");
            let target = Arc::clone(bus);
            bus.on_ready(Box::new(move || thunk(target.as_ref())));
            if start_runtime {
                bus.start_if_needed();
            }
            DeliveryTiming::Deferred
        }
    }
}
