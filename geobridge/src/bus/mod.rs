//! The embedding runtime's event bus.
//!
//! The bus may still be cold-starting when a delivery arrives. Emission is
//! gated on [`ReadinessState::Ready`] through [`deliver_when_ready`], which
//! parks the work in a one-shot continuation and kicks off runtime startup
//! when needed.
//!
//! # Readiness
//!
//! ```text
//! NotStarted ──start_if_needed()──► Starting ──runtime initialized──► Ready
//! ```
//!
//! The state never moves backward within a process.

mod local;
mod ready;
mod traits;

pub use local::LocalEventBus;
pub use ready::{deliver_when_ready, DeliveryTiming};
pub use traits::{Continuation, EventBus, ReadinessState};
