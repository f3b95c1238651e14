//! Event dispatcher.
//!
//! Receives transition deliveries and system signals from the OS, classifies
//! them, and forwards them to the runtime's event bus once it is ready.
//!
//! # Flow
//!
//! ```text
//! OS thread ──on_delivery()──► error? ──yes──► record + log, stop
//!                                │ no
//!                                ▼
//!                      interaction context
//!                                │
//!                      deliver_when_ready(bus)
//!                       │ ready          │ not ready
//!                       ▼                ▼
//!                    classify      on_ready continuation
//!                       │          + start_if_needed()
//!                       ▼
//!         one event per triggering region, in delivery order
//! ```

mod dispatcher;
mod error;
mod stats;

pub use dispatcher::{classify_delivery, EventDispatcher};
pub use error::DeliveryError;
pub use stats::{DispatchStats, DispatchStatsSnapshot};
