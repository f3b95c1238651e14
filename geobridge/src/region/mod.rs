//! Circular geofence regions and the transitions they watch.
//!
//! A [`Region`] is the validated, immutable form of a caller's
//! [`RegionConfig`]. Once built it is handed to the location provider as part
//! of a registration request and never changes.
//!
//! # Example
//!
//! ```
//! use geobridge::region::{Region, RegionConfig, TransitionKind};
//!
//! let config = RegionConfig {
//!     identifier: "home".to_string(),
//!     latitude: 1.0,
//!     longitude: 2.0,
//!     radius: 100.0,
//! };
//! let region = Region::from_config(&config).unwrap();
//!
//! assert_eq!(region.identifier(), "home");
//! assert!(region.expires_never());
//! assert!(region.watched_transitions().contains(TransitionKind::Exit));
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw platform code for an ENTER transition.
pub const TRANSITION_ENTER_CODE: i32 = 1;

/// Raw platform code for an EXIT transition.
pub const TRANSITION_EXIT_CODE: i32 = 2;

/// Raw platform code for a DWELL transition.
pub const TRANSITION_DWELL_CODE: i32 = 4;

/// Errors raised while validating region configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegionError {
    /// The identifier was empty or whitespace.
    #[error("region identifier must not be empty")]
    EmptyIdentifier,

    /// Latitude outside [-90, 90].
    #[error("latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),

    /// Longitude outside [-180, 180].
    #[error("longitude {0} is outside [-180, 180]")]
    LongitudeOutOfRange(f64),

    /// Radius not a positive, finite number of meters.
    #[error("radius {0} must be a positive number of meters")]
    InvalidRadius(f32),

    /// A batch registration named no regions.
    #[error("at least one region is required")]
    NoRegions,

    /// A batch registration named the same identifier twice.
    #[error("region identifier {0:?} appears more than once")]
    DuplicateIdentifier(String),
}

/// A geofence transition as reported by the provider.
///
/// Only [`Enter`](Self::Enter) and [`Exit`](Self::Exit) are forwarded to the
/// event bus. Anything else arrives as [`Dwell`](Self::Dwell) or
/// [`Other`](Self::Other) and is treated as unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionKind {
    Enter,
    Exit,
    Dwell,
    Other(i32),
}

impl TransitionKind {
    /// Decode a raw platform transition code.
    pub fn from_code(code: i32) -> Self {
        match code {
            TRANSITION_ENTER_CODE => TransitionKind::Enter,
            TRANSITION_EXIT_CODE => TransitionKind::Exit,
            TRANSITION_DWELL_CODE => TransitionKind::Dwell,
            other => TransitionKind::Other(other),
        }
    }

    /// The raw platform code for this transition.
    pub fn code(&self) -> i32 {
        match self {
            TransitionKind::Enter => TRANSITION_ENTER_CODE,
            TransitionKind::Exit => TRANSITION_EXIT_CODE,
            TransitionKind::Dwell => TRANSITION_DWELL_CODE,
            TransitionKind::Other(code) => *code,
        }
    }

    /// Whether this transition is forwarded to the event bus.
    pub fn is_supported(&self) -> bool {
        matches!(self, TransitionKind::Enter | TransitionKind::Exit)
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionKind::Enter => write!(f, "Enter"),
            TransitionKind::Exit => write!(f, "Exit"),
            TransitionKind::Dwell => write!(f, "Dwell"),
            TransitionKind::Other(code) => write!(f, "Unknown({})", code),
        }
    }
}

/// Set of transitions a region is watched for, as a platform bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransitionSet(i32);

impl TransitionSet {
    /// Watch ENTER only.
    pub const ENTER: TransitionSet = TransitionSet(TRANSITION_ENTER_CODE);
    /// Watch EXIT only.
    pub const EXIT: TransitionSet = TransitionSet(TRANSITION_EXIT_CODE);
    /// Watch both ENTER and EXIT.
    pub const ENTER_EXIT: TransitionSet =
        TransitionSet(TRANSITION_ENTER_CODE | TRANSITION_EXIT_CODE);

    /// Whether `kind` is part of this set.
    pub fn contains(&self, kind: TransitionKind) -> bool {
        let code = kind.code();
        code != 0 && self.0 & code == code
    }

    /// The platform bitmask.
    pub fn bits(&self) -> i32 {
        self.0
    }
}

/// Caller-supplied region configuration.
///
/// This is the `{identifier, latitude, longitude, radius}` shape accepted by
/// the application layer. Validate it with [`Region::from_config`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionConfig {
    pub identifier: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Radius in meters.
    pub radius: f64,
}

/// A validated circular geofence.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    identifier: String,
    latitude: f64,
    longitude: f64,
    radius_meters: f32,
    expires_never: bool,
    watched_transitions: TransitionSet,
}

impl Region {
    /// Build a non-expiring region watching ENTER and EXIT.
    ///
    /// # Errors
    ///
    /// Returns a [`RegionError`] if the identifier is blank, a coordinate is
    /// out of range, or the radius is not a positive finite value.
    pub fn new(
        identifier: impl Into<String>,
        latitude: f64,
        longitude: f64,
        radius_meters: f32,
    ) -> Result<Self, RegionError> {
        let identifier = identifier.into();

        if identifier.trim().is_empty() {
            return Err(RegionError::EmptyIdentifier);
        }
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(RegionError::LatitudeOutOfRange(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(RegionError::LongitudeOutOfRange(longitude));
        }
        if !radius_meters.is_finite() || radius_meters <= 0.0 {
            return Err(RegionError::InvalidRadius(radius_meters));
        }

        Ok(Self {
            identifier,
            latitude,
            longitude,
            radius_meters,
            expires_never: true,
            watched_transitions: TransitionSet::ENTER_EXIT,
        })
    }

    /// Validate a caller configuration.
    pub fn from_config(config: &RegionConfig) -> Result<Self, RegionError> {
        // Platform radii are single precision.
        Self::new(
            config.identifier.clone(),
            config.latitude,
            config.longitude,
            config.radius as f32,
        )
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn radius_meters(&self) -> f32 {
        self.radius_meters
    }

    pub fn expires_never(&self) -> bool {
        self.expires_never
    }

    pub fn watched_transitions(&self) -> TransitionSet {
        self.watched_transitions
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:.6}, {:.6}) r={}m",
            self.identifier, self.latitude, self.longitude, self.radius_meters
        )
    }
}
