//! Event vocabulary shared by the dispatcher and the event bus.
//!
//! Inbound: [`TransitionDelivery`] and [`SystemSignal`] arrive from the OS.
//! Outbound: [`EventName`] plus an optional [`EventPayload`] go to the bus.

mod delivery;
mod name;

pub use delivery::{SystemSignal, TransitionDelivery};
pub use name::{constants, EmittedEvent, EventName, EventPayload, IDENTIFIER_KEY};
