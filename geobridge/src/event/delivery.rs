//! Inbound notifications from the OS.

use crate::provider::LocationMode;
use crate::region::TransitionKind;

/// A single provider-originated geofence notification.
///
/// One delivery may cover several regions. The dispatcher consumes it exactly
/// once and fans it out into one event per triggering region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionDelivery {
    pub kind: TransitionKind,
    /// Region identifiers in the order the provider reported them.
    pub triggering_region_ids: Vec<String>,
    /// Set when the provider failed to produce a transition.
    pub error_code: Option<i32>,
}

impl TransitionDelivery {
    /// A successful transition for the given regions.
    pub fn new<I, S>(kind: TransitionKind, region_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind,
            triggering_region_ids: region_ids.into_iter().map(Into::into).collect(),
            error_code: None,
        }
    }

    pub fn enter<I, S>(region_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(TransitionKind::Enter, region_ids)
    }

    pub fn exit<I, S>(region_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(TransitionKind::Exit, region_ids)
    }

    /// A delivery the provider flagged with an error code.
    pub fn error(code: i32) -> Self {
        Self {
            kind: TransitionKind::Other(0),
            triggering_region_ids: Vec::new(),
            error_code: Some(code),
        }
    }

    pub fn has_error(&self) -> bool {
        self.error_code.is_some()
    }
}

/// OS broadcasts that re-arm geofencing after the device or its location
/// settings change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemSignal {
    /// The device finished booting.
    BootCompleted,
    /// The location mode setting changed.
    LocationModeChanged { mode: LocationMode },
    /// The set of enabled location providers changed.
    ProvidersChanged {
        gps_enabled: bool,
        network_enabled: bool,
    },
}

impl SystemSignal {
    /// Whether this signal should surface as `DEVICE_BOOT_COMPLETED`.
    ///
    /// Location changes only count when they leave location available.
    pub fn qualifies(&self) -> bool {
        match self {
            SystemSignal::BootCompleted => true,
            SystemSignal::LocationModeChanged { mode } => mode.is_enabled(),
            SystemSignal::ProvidersChanged {
                gps_enabled,
                network_enabled,
            } => *gps_enabled || *network_enabled,
        }
    }
}
