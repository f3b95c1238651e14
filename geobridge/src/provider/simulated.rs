//! In-process provider and host.
//!
//! These stand in for the platform SDK when running the bridge on a desktop:
//! the CLI drives them from a trace file and the test suites use them to
//! script provider outcomes.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use futures::future;
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::host::{HostContext, LocationMode};
use super::types::{
    BoxFuture, ConnectError, GeofencingRequest, InitialTrigger, LocationProvider,
    ProviderSession, ProviderStatus, TargetHandle,
};
use crate::dispatch::EventDispatcher;
use crate::event::TransitionDelivery;
use crate::region::{Region, TransitionKind};

/// Name of the callback target built by [`SimulatedHost`].
pub const DEFAULT_TARGET_NAME: &str = "geobridge.transitions";

/// Outcome of [`SimulatedProvider::connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectBehavior {
    #[default]
    Succeed,
    Fail {
        code: i32,
    },
    Suspend {
        cause: i32,
    },
}

#[derive(Debug)]
struct ProviderState {
    connect: ConnectBehavior,
    connect_delay: Option<Duration>,
    reject_add: Option<ProviderStatus>,
    reject_remove: Option<ProviderStatus>,
    availability: ProviderStatus,
    resolvable: bool,
    /// Registered regions in registration order.
    registered: Vec<(TargetHandle, Region)>,
    last_initial_trigger: Option<InitialTrigger>,
    add_requests: u64,
}

/// Scriptable [`LocationProvider`].
///
/// Keeps the registered regions in memory and routes triggered transitions
/// to an attached [`EventDispatcher`], the way the OS would invoke the
/// callback target.
pub struct SimulatedProvider {
    state: Mutex<ProviderState>,
    sessions: AtomicU64,
    dispatcher: Mutex<Option<EventDispatcher>>,
}

impl Default for SimulatedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedProvider {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ProviderState {
                connect: ConnectBehavior::Succeed,
                connect_delay: None,
                reject_add: None,
                reject_remove: None,
                availability: ProviderStatus::SUCCESS,
                resolvable: false,
                registered: Vec::new(),
                last_initial_trigger: None,
                add_requests: 0,
            }),
            sessions: AtomicU64::new(0),
            dispatcher: Mutex::new(None),
        }
    }

    pub fn set_connect_behavior(&self, behavior: ConnectBehavior) {
        self.state.lock().connect = behavior;
    }

    /// Delay every connection attempt by `delay`.
    pub fn set_connect_delay(&self, delay: Option<Duration>) {
        self.state.lock().connect_delay = delay;
    }

    /// Reject subsequent add requests with `status`, or accept them with `None`.
    pub fn reject_add(&self, status: Option<ProviderStatus>) {
        self.state.lock().reject_add = status;
    }

    /// Reject subsequent removals with `status`, or accept them with `None`.
    pub fn reject_remove(&self, status: Option<ProviderStatus>) {
        self.state.lock().reject_remove = status;
    }

    pub fn set_availability(&self, status: ProviderStatus, resolvable: bool) {
        let mut state = self.state.lock();
        state.availability = status;
        state.resolvable = resolvable;
    }

    /// Number of connection attempts the provider has seen.
    pub fn sessions_created(&self) -> u64 {
        self.sessions.load(Ordering::SeqCst)
    }

    pub fn add_requests(&self) -> u64 {
        self.state.lock().add_requests
    }

    pub fn last_initial_trigger(&self) -> Option<InitialTrigger> {
        self.state.lock().last_initial_trigger
    }

    /// Identifiers of the registered regions, in registration order.
    pub fn registered_ids(&self) -> Vec<String> {
        self.state
            .lock()
            .registered
            .iter()
            .map(|(_, region)| region.identifier().to_string())
            .collect()
    }

    /// Distinct callback targets regions are registered against.
    pub fn registered_targets(&self) -> Vec<TargetHandle> {
        self.state
            .lock()
            .registered
            .iter()
            .map(|(target, _)| target.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Route future deliveries to `dispatcher`.
    pub fn attach(&self, dispatcher: EventDispatcher) {
        *self.dispatcher.lock() = Some(dispatcher);
    }

    /// Report a transition for the registered regions among `identifiers`.
    ///
    /// Unknown identifiers are skipped. Returns false if nothing was
    /// delivered.
    pub fn trigger<S: AsRef<str>>(&self, kind: TransitionKind, identifiers: &[S]) -> bool {
        let matched: Vec<String> = {
            let state = self.state.lock();
            identifiers
                .iter()
                .map(AsRef::as_ref)
                .filter(|id| state.registered.iter().any(|(_, r)| r.identifier() == *id))
                .map(str::to_string)
                .collect()
        };

        if matched.is_empty() {
            debug!(transition = %kind, "No registered region matched trigger");
            return false;
        }
        self.deliver(TransitionDelivery::new(kind, matched))
    }

    /// Hand a raw delivery to the attached dispatcher.
    pub fn deliver(&self, delivery: TransitionDelivery) -> bool {
        let dispatcher = self.dispatcher.lock().clone();
        match dispatcher {
            Some(dispatcher) => {
                dispatcher.on_delivery(delivery);
                true
            }
            None => {
                warn!("No dispatcher attached, dropping simulated delivery");
                false
            }
        }
    }
}

impl LocationProvider for SimulatedProvider {
    fn connect(&self) -> BoxFuture<'static, Result<ProviderSession, ConnectError>> {
        let id = self.sessions.fetch_add(1, Ordering::SeqCst) + 1;
        let (behavior, delay) = {
            let state = self.state.lock();
            (state.connect, state.connect_delay)
        };
        debug!(session = id, behavior = ?behavior, "Simulated provider connect");

        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            match behavior {
                ConnectBehavior::Succeed => Ok(ProviderSession::new(id)),
                ConnectBehavior::Fail { code } => Err(ConnectError::Failed { code }),
                ConnectBehavior::Suspend { cause } => Err(ConnectError::Suspended { cause }),
            }
        })
    }

    fn add_regions(
        &self,
        _session: &ProviderSession,
        request: GeofencingRequest,
        target: &TargetHandle,
    ) -> BoxFuture<'static, Result<(), ProviderStatus>> {
        let mut state = self.state.lock();
        state.add_requests += 1;

        let outcome = match state.reject_add {
            Some(status) => Err(status),
            None => {
                state.last_initial_trigger = Some(request.initial_trigger());
                for region in request.regions() {
                    // Same identifier replaces the earlier registration.
                    state
                        .registered
                        .retain(|(_, r)| r.identifier() != region.identifier());
                    state.registered.push((target.clone(), region.clone()));
                }
                Ok(())
            }
        };
        Box::pin(future::ready(outcome))
    }

    fn remove_regions_by_id(
        &self,
        _session: &ProviderSession,
        identifiers: Vec<String>,
    ) -> BoxFuture<'static, Result<(), ProviderStatus>> {
        let mut state = self.state.lock();
        let outcome = match state.reject_remove {
            Some(status) => Err(status),
            None => {
                state
                    .registered
                    .retain(|(_, r)| !identifiers.iter().any(|id| id == r.identifier()));
                Ok(())
            }
        };
        Box::pin(future::ready(outcome))
    }

    fn remove_regions_by_target(
        &self,
        _session: &ProviderSession,
        target: &TargetHandle,
    ) -> BoxFuture<'static, Result<(), ProviderStatus>> {
        let mut state = self.state.lock();
        let outcome = match state.reject_remove {
            Some(status) => Err(status),
            None => {
                state.registered.retain(|(t, _)| t != target);
                Ok(())
            }
        };
        Box::pin(future::ready(outcome))
    }

    fn check_availability(&self) -> ProviderStatus {
        self.state.lock().availability
    }

    fn is_user_resolvable(&self, status: ProviderStatus) -> bool {
        self.state.lock().resolvable && !status.is_success()
    }
}

#[derive(Debug)]
struct HostState {
    foreground: bool,
    application: bool,
    location_mode: Option<LocationMode>,
    prompts: Vec<(ProviderStatus, i32)>,
    target_name: String,
}

/// Scriptable [`HostContext`] that records every prompt it is asked to show.
#[derive(Debug)]
pub struct SimulatedHost {
    state: Mutex<HostState>,
    targets_created: AtomicU32,
    settings_opened: AtomicU32,
}

impl Default for SimulatedHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedHost {
    /// A host with a foreground screen and location in high-accuracy mode.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HostState {
                foreground: true,
                application: true,
                location_mode: Some(LocationMode::HighAccuracy),
                prompts: Vec::new(),
                target_name: DEFAULT_TARGET_NAME.to_string(),
            }),
            targets_created: AtomicU32::new(0),
            settings_opened: AtomicU32::new(0),
        }
    }

    pub fn with_target_name(self, name: impl Into<String>) -> Self {
        self.state.lock().target_name = name.into();
        self
    }

    pub fn set_foreground(&self, foreground: bool) {
        self.state.lock().foreground = foreground;
    }

    /// Without an application context no callback target can be built.
    pub fn set_application_available(&self, available: bool) {
        self.state.lock().application = available;
    }

    pub fn set_location_mode(&self, mode: Option<LocationMode>) {
        self.state.lock().location_mode = mode;
    }

    /// Prompts shown so far as `(status, request code)`.
    pub fn prompts(&self) -> Vec<(ProviderStatus, i32)> {
        self.state.lock().prompts.clone()
    }

    pub fn targets_created(&self) -> u32 {
        self.targets_created.load(Ordering::SeqCst)
    }

    pub fn settings_opened(&self) -> u32 {
        self.settings_opened.load(Ordering::SeqCst)
    }
}

impl HostContext for SimulatedHost {
    fn create_callback_target(&self) -> Option<TargetHandle> {
        let state = self.state.lock();
        if !state.application {
            return None;
        }
        self.targets_created.fetch_add(1, Ordering::SeqCst);
        Some(TargetHandle::new(&state.target_name))
    }

    fn has_foreground(&self) -> bool {
        self.state.lock().foreground
    }

    fn show_resolution_prompt(&self, status: ProviderStatus, request_code: i32) {
        self.state.lock().prompts.push((status, request_code));
    }

    fn location_mode(&self) -> Option<LocationMode> {
        self.state.lock().location_mode
    }

    fn open_location_settings(&self) {
        self.settings_opened.fetch_add(1, Ordering::SeqCst);
    }
}
