//! Delivery-time errors.
//!
//! These never reach a caller: nobody is waiting on a delivery. They are
//! logged and counted, then the delivery is dropped.

use thiserror::Error;

use crate::region::TransitionKind;

/// Why a delivery produced no events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The provider flagged the delivery with an error code.
    #[error("provider reported error code {0}")]
    ProviderError(i32),

    /// The transition is neither ENTER nor EXIT.
    #[error("unsupported geofence transition {0}")]
    UnsupportedTransition(TransitionKind),
}

impl DeliveryError {
    /// Stable error kind for logs.
    pub fn code(&self) -> &'static str {
        match self {
            DeliveryError::ProviderError(_) => "PROVIDER_ERROR",
            DeliveryError::UnsupportedTransition(_) => "UNSUPPORTED_TRANSITION",
        }
    }
}
