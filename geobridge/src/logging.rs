//! Logging setup.
//!
//! Installs a global `tracing` subscriber: a console layer always, plus a
//! daily-rolling file layer when a log directory is configured. `RUST_LOG`
//! overrides the configured level.

use std::fs;
use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::app::LoggingConfig;

/// File name prefix for rolled log files.
pub const LOG_FILE_PREFIX: &str = "geobridge.log";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{directive}': {reason}")]
    InvalidFilter { directive: String, reason: String },

    #[error("Failed to create log directory {}: {source}", path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("A global subscriber is already installed")]
    AlreadyInitialized,
}

/// Build the filter: `RUST_LOG` if set, otherwise the configured level.
pub fn build_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level).map_err(|e| LoggingError::InvalidFilter {
        directive: level.to_string(),
        reason: e.to_string(),
    })
}

/// Install the global subscriber.
///
/// Returns the file appender's guard when file logging is enabled; keep it
/// alive for the life of the process or buffered lines are lost.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>, LoggingError> {
    let filter = build_filter(&config.level)?;
    let console = fmt::layer().with_target(false).with_writer(io::stderr);

    match &config.directory {
        Some(dir) => {
            fs::create_dir_all(dir).map_err(|source| LoggingError::Directory {
                path: dir.clone(),
                source,
            })?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = fmt::layer().with_ansi(false).with_writer(writer);

            tracing_subscriber::registry()
                .with(console.and_then(file).with_filter(filter))
                .try_init()
                .map_err(|_| LoggingError::AlreadyInitialized)?;

            tracing::info!(directory = %dir.display(), "File logging enabled");
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(console.with_filter(filter))
                .try_init()
                .map_err(|_| LoggingError::AlreadyInitialized)?;
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_filter_is_reported() {
        // Only meaningful when RUST_LOG does not override the level.
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let err = build_filter("geobridge=notalevel").unwrap_err();
        assert!(matches!(err, LoggingError::InvalidFilter { .. }));
    }

    #[test]
    fn test_valid_filter() {
        assert!(build_filter("geobridge=debug,info").is_ok());
    }

    #[test]
    fn test_unwritable_directory_is_reported() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let config = LoggingConfig {
            level: "info".to_string(),
            // A path below a regular file cannot be created.
            directory: Some(file.path().join("logs")),
        };
        let err = init_logging(&config).unwrap_err();
        assert!(matches!(err, LoggingError::Directory { .. }));
    }
}
