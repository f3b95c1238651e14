//! Application error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::logging::LoggingError;

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Missing key '{key}' in [{section}]")]
    MissingKey { section: String, key: String },

    #[error("Invalid value for {section}.{key}: {reason}")]
    InvalidValue {
        section: String,
        key: String,
        reason: String,
    },
}

/// Errors that can occur during application lifecycle.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Logging setup failed: {0}")]
    Logging(#[from] LoggingError),

    /// `start()` was called outside a Tokio runtime.
    #[error("No Tokio runtime is running; use start_sync() instead")]
    RuntimeUnavailable,

    #[error("Failed to create Tokio runtime: {0}")]
    RuntimeCreation(String),
}
