//! Region registration against the location provider.
//!
//! The [`RegistrationManager`] owns the single provider session and the
//! callback target the OS routes deliveries to. Both are created lazily and
//! shared by every clone of the manager.
//!
//! ```text
//! add_regions(..) ──► callback target (cached) ──► session (single in-flight connect)
//!                                                       │
//!                      interaction context ◄────────────┘
//!                             │
//!                             ▼
//!                     provider.add_regions(..) ──► Ack / PROVIDER_ERROR
//! ```

mod error;
mod manager;

pub use error::RegistrationError;
pub use manager::{
    Ack, Available, Connected, RegistrationConfig, RegistrationManager,
    DEFAULT_RESOLUTION_REQUEST_CODE,
};
