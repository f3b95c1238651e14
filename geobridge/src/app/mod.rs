//! Application bootstrap and lifecycle management.
//!
//! `GeofenceApp` is the explicitly owned service object for the bridge. It is
//! constructed once at process start and hands out the registration manager
//! and event dispatcher, which share every collaborator through `Arc`.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          GeofenceApp                             │
//! │                                                                  │
//! │  1. InteractionContext ───── serial task all provider calls use  │
//! │                                                                  │
//! │  2. RegistrationManager ──── LocationProvider + HostContext      │
//! │     └── provider session, callback target (created lazily)       │
//! │                                                                  │
//! │  3. EventDispatcher ──────── EventBus (readiness gated)          │
//! │                                                                  │
//! │  DispatchStats shared by 2 and 3                                 │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

mod bootstrap;
mod config;
mod error;

pub use bootstrap::{Collaborators, GeofenceApp};
pub use config::{
    DispatchConfig, GeofenceConfig, LoggingConfig, CONFIG_DIR_NAME, CONFIG_FILE_NAME,
};
pub use error::{AppError, ConfigError};
