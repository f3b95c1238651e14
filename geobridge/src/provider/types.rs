//! Location provider abstraction.
//!
//! The provider is the platform geofencing service. Its API is callback
//! driven; here every asynchronous call returns a [`BoxFuture`] that resolves
//! once the platform reports the outcome.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

use crate::region::{Region, TRANSITION_DWELL_CODE, TRANSITION_ENTER_CODE, TRANSITION_EXIT_CODE};

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Numeric status reported by the provider.
///
/// Values follow the platform's common status codes so they can be handed
/// back to the application layer untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProviderStatus(i32);

impl ProviderStatus {
    pub const SUCCESS: ProviderStatus = ProviderStatus(0);
    pub const SERVICE_MISSING: ProviderStatus = ProviderStatus(1);
    pub const SERVICE_VERSION_UPDATE_REQUIRED: ProviderStatus = ProviderStatus(2);
    pub const SERVICE_DISABLED: ProviderStatus = ProviderStatus(3);
    pub const GEOFENCE_NOT_AVAILABLE: ProviderStatus = ProviderStatus(1000);
    pub const GEOFENCE_TOO_MANY_GEOFENCES: ProviderStatus = ProviderStatus(1001);
    pub const GEOFENCE_TOO_MANY_PENDING_INTENTS: ProviderStatus = ProviderStatus(1002);

    pub const fn new(code: i32) -> Self {
        Self(code)
    }

    pub fn code(&self) -> i32 {
        self.0
    }

    pub fn is_success(&self) -> bool {
        self.0 == Self::SUCCESS.0
    }
}

impl fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a provider session could not be established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConnectError {
    /// The platform refused the connection.
    #[error("location provider connection failed (code {code})")]
    Failed { code: i32 },

    /// The connection was suspended before it completed.
    #[error("location provider connection suspended (cause {cause})")]
    Suspended { cause: i32 },
}

/// Handle to a connected provider session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProviderSession {
    id: u64,
}

impl ProviderSession {
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// The stable, re-deliverable callback identity the OS routes deliveries to.
///
/// The OS keeps this across process restarts, so registration and removal
/// must always use the same handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetHandle(Arc<str>);

impl TargetHandle {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transition reported right after registration when the device is already
/// inside a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitialTrigger {
    #[default]
    Enter,
    Exit,
    Dwell,
}

impl InitialTrigger {
    /// Platform bitmask for the request.
    pub fn code(&self) -> i32 {
        match self {
            InitialTrigger::Enter => TRANSITION_ENTER_CODE,
            InitialTrigger::Exit => TRANSITION_EXIT_CODE,
            InitialTrigger::Dwell => TRANSITION_DWELL_CODE,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InitialTrigger::Enter => "enter",
            InitialTrigger::Exit => "exit",
            InitialTrigger::Dwell => "dwell",
        }
    }
}

impl FromStr for InitialTrigger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "enter" => Ok(InitialTrigger::Enter),
            "exit" => Ok(InitialTrigger::Exit),
            "dwell" => Ok(InitialTrigger::Dwell),
            other => Err(format!("unknown initial trigger '{}'", other)),
        }
    }
}

/// A registration request covering one or more regions.
///
/// The provider treats the request as a unit: either every region is
/// registered or none is.
#[derive(Debug, Clone, PartialEq)]
pub struct GeofencingRequest {
    initial_trigger: InitialTrigger,
    regions: Vec<Region>,
}

impl GeofencingRequest {
    pub fn new(initial_trigger: InitialTrigger, regions: Vec<Region>) -> Self {
        Self {
            initial_trigger,
            regions,
        }
    }

    pub fn initial_trigger(&self) -> InitialTrigger {
        self.initial_trigger
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn identifiers(&self) -> Vec<&str> {
        self.regions.iter().map(Region::identifier).collect()
    }
}

/// Platform geofencing service.
///
/// Calls are initiated from the interaction context; the returned futures
/// are `'static` so they can be awaited elsewhere.
pub trait LocationProvider: Send + Sync {
    /// Establish a session with the provider.
    fn connect(&self) -> BoxFuture<'static, Result<ProviderSession, ConnectError>>;

    /// Register every region in `request` against `target`.
    fn add_regions(
        &self,
        session: &ProviderSession,
        request: GeofencingRequest,
        target: &TargetHandle,
    ) -> BoxFuture<'static, Result<(), ProviderStatus>>;

    /// Remove regions by identifier.
    fn remove_regions_by_id(
        &self,
        session: &ProviderSession,
        identifiers: Vec<String>,
    ) -> BoxFuture<'static, Result<(), ProviderStatus>>;

    /// Remove every region registered against `target`.
    fn remove_regions_by_target(
        &self,
        session: &ProviderSession,
        target: &TargetHandle,
    ) -> BoxFuture<'static, Result<(), ProviderStatus>>;

    /// Whether the geofencing capability is present and enabled.
    fn check_availability(&self) -> ProviderStatus;

    /// Whether the user can fix `status` through a platform prompt.
    fn is_user_resolvable(&self, status: ProviderStatus) -> bool;
}
