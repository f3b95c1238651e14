//! CLI error type.

use std::fmt;
use std::io;

use geobridge::app::{AppError, ConfigError};
use geobridge::logging::LoggingError;
use geobridge::RegistrationError;

/// Errors surfaced by CLI commands.
#[derive(Debug)]
pub enum CliError {
    Config(String),
    Io(io::Error),
    Trace { line: usize, message: String },
    App(AppError),
    Registration(RegistrationError),
    Output(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Io(e) => write!(f, "I/O error: {}", e),
            CliError::Trace { line, message } => {
                write!(f, "Invalid trace entry on line {}: {}", line, message)
            }
            CliError::App(e) => write!(f, "{}", e),
            CliError::Registration(e) => write!(f, "Registration failed [{}]: {}", e.code(), e),
            CliError::Output(msg) => write!(f, "Failed to write output: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Io(e) => Some(e),
            CliError::App(e) => Some(e),
            CliError::Registration(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Io(e)
    }
}

impl From<AppError> for CliError {
    fn from(e: AppError) -> Self {
        CliError::App(e)
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::App(AppError::Logging(e))
    }
}

impl From<RegistrationError> for CliError {
    fn from(e: RegistrationError) -> Self {
        CliError::Registration(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Output(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_error_shows_code() {
        let err = CliError::from(RegistrationError::NoHostContext);
        assert_eq!(
            err.to_string(),
            "Registration failed [NO_HOST_CONTEXT]: no active host context"
        );
    }

    #[test]
    fn test_trace_error_display() {
        let err = CliError::Trace {
            line: 4,
            message: "missing field `kind`".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid trace entry on line 4: missing field `kind`"
        );
    }
}
