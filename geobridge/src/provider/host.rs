//! Host application context.
//!
//! The host is whatever embeds the bridge: it can build the re-deliverable
//! callback target, knows whether a foreground screen is up, and can show
//! platform prompts.

use std::fmt;
use std::str::FromStr;

use super::types::{ProviderStatus, TargetHandle};

/// Device location mode setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationMode {
    Off,
    SensorsOnly,
    BatterySaving,
    HighAccuracy,
}

impl LocationMode {
    /// Decode the platform setting value.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(LocationMode::Off),
            1 => Some(LocationMode::SensorsOnly),
            2 => Some(LocationMode::BatterySaving),
            3 => Some(LocationMode::HighAccuracy),
            _ => None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, LocationMode::Off)
    }
}

impl fmt::Display for LocationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LocationMode::Off => "off",
            LocationMode::SensorsOnly => "sensors_only",
            LocationMode::BatterySaving => "battery_saving",
            LocationMode::HighAccuracy => "high_accuracy",
        };
        f.write_str(s)
    }
}

impl FromStr for LocationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "off" => Ok(LocationMode::Off),
            "sensors_only" => Ok(LocationMode::SensorsOnly),
            "battery_saving" => Ok(LocationMode::BatterySaving),
            "high_accuracy" => Ok(LocationMode::HighAccuracy),
            other => Err(format!("unknown location mode '{}'", other)),
        }
    }
}

/// Services the embedding application provides to the bridge.
pub trait HostContext: Send + Sync {
    /// Build the callback target the OS delivers transitions to.
    ///
    /// Returns `None` when no application context is available yet.
    fn create_callback_target(&self) -> Option<TargetHandle>;

    /// Whether a foreground screen is available for prompts.
    fn has_foreground(&self) -> bool;

    /// Show the platform's remediation prompt for `status`.
    fn show_resolution_prompt(&self, status: ProviderStatus, request_code: i32);

    /// Current location mode, or `None` if the setting cannot be read.
    fn location_mode(&self) -> Option<LocationMode>;

    /// Open the OS location settings screen.
    fn open_location_settings(&self);
}
