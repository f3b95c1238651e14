//! Location provider and host abstractions.
//!
//! The bridge talks to the platform through two narrow traits:
//!
//! - [`LocationProvider`]: the geofencing service (sessions, registration,
//!   availability)
//! - [`HostContext`]: the embedding application (callback target, prompts,
//!   location settings)
//!
//! [`SimulatedProvider`] and [`SimulatedHost`] implement both in-process for
//! the CLI and the test suites.

mod host;
mod simulated;
mod types;

pub use host::{HostContext, LocationMode};
pub use simulated::{ConnectBehavior, SimulatedHost, SimulatedProvider, DEFAULT_TARGET_NAME};
pub use types::{
    BoxFuture, ConnectError, GeofencingRequest, InitialTrigger, LocationProvider,
    ProviderSession, ProviderStatus, TargetHandle,
};
