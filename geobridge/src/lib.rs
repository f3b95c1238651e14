//! Geobridge - OS geofence transitions for an embedding runtime
//!
//! The bridge registers circular regions with a platform location provider
//! and forwards the transitions the OS reports into the host runtime's event
//! bus. Deliveries can arrive before that runtime has started, so every
//! emission waits for bus readiness and cold deliveries trigger startup.
//!
//! # Modules
//!
//! - [`app`]: the owned service object and its configuration
//! - [`registration`]: provider session and region registration
//! - [`dispatch`]: classification and readiness-gated delivery
//! - [`bus`]: the event bus contract and an in-process implementation
//! - [`provider`]: provider and host traits, plus simulated implementations
//! - [`interaction`]: the serial context provider calls originate from
//! - [`event`], [`region`]: the data model
//! - [`logging`]: subscriber setup

pub mod app;
pub mod bus;
pub mod dispatch;
pub mod event;
pub mod interaction;
pub mod logging;
pub mod provider;
pub mod region;
pub mod registration;

pub use app::{Collaborators, GeofenceApp, GeofenceConfig};
pub use event::{EmittedEvent, EventName};
pub use registration::{RegistrationError, RegistrationManager};
