//! Registration error types.

use thiserror::Error;

use crate::interaction::ContextClosed;
use crate::provider::{ConnectError, ProviderStatus};
use crate::region::RegionError;

/// Errors surfaced to callers of the registration manager.
///
/// Every variant maps to a stable [`code`](Self::code) the application layer
/// can match on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistrationError {
    /// No host context was available when one was required.
    #[error("no active host context")]
    NoHostContext,

    /// The provider session failed or was suspended.
    #[error("{0}")]
    Connect(#[from] ConnectError),

    /// The provider rejected a request.
    #[error("location provider rejected the request (status {status})")]
    Provider { status: ProviderStatus },

    /// A region failed validation before reaching the provider.
    #[error("invalid region: {0}")]
    InvalidRegion(#[from] RegionError),

    /// The interaction context has shut down.
    #[error("{0}")]
    ContextClosed(#[from] ContextClosed),
}

impl RegistrationError {
    /// Stable error kind string.
    pub fn code(&self) -> &'static str {
        match self {
            RegistrationError::NoHostContext => "NO_HOST_CONTEXT",
            RegistrationError::Connect(_) => "GOOGLE_API_CONNECT_ERROR",
            RegistrationError::Provider { .. } => "PROVIDER_ERROR",
            RegistrationError::InvalidRegion(_) => "INVALID_REGION",
            RegistrationError::ContextClosed(_) => "INTERACTION_CONTEXT_CLOSED",
        }
    }

    /// The provider status carried by `PROVIDER_ERROR`.
    pub fn provider_status(&self) -> Option<ProviderStatus> {
        match self {
            RegistrationError::Provider { status } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(RegistrationError::NoHostContext.code(), "NO_HOST_CONTEXT");
        assert_eq!(
            RegistrationError::from(ConnectError::Suspended { cause: 1 }).code(),
            "GOOGLE_API_CONNECT_ERROR"
        );
        assert_eq!(
            RegistrationError::Provider {
                status: ProviderStatus::GEOFENCE_NOT_AVAILABLE
            }
            .code(),
            "PROVIDER_ERROR"
        );
        assert_eq!(
            RegistrationError::from(RegionError::NoRegions).code(),
            "INVALID_REGION"
        );
        assert_eq!(
            RegistrationError::from(ContextClosed).code(),
            "INTERACTION_CONTEXT_CLOSED"
        );
    }

    #[test]
    fn test_provider_status_accessor() {
        let err = RegistrationError::Provider {
            status: ProviderStatus::new(1001),
        };
        assert_eq!(err.provider_status(), Some(ProviderStatus::new(1001)));
        assert_eq!(RegistrationError::NoHostContext.provider_status(), None);
    }

    #[test]
    fn test_error_display() {
        let err = RegistrationError::Provider {
            status: ProviderStatus::SERVICE_DISABLED,
        };
        assert_eq!(
            err.to_string(),
            "location provider rejected the request (status 3)"
        );
        assert_eq!(
            RegistrationError::from(RegionError::EmptyIdentifier).to_string(),
            "invalid region: region identifier must not be empty"
        );
    }
}
