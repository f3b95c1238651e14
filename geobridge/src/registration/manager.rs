//! Registration manager implementation.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::{FutureExt, Shared};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::error::RegistrationError;
use crate::dispatch::DispatchStats;
use crate::interaction::InteractionContext;
use crate::provider::{
    BoxFuture, GeofencingRequest, HostContext, InitialTrigger, LocationProvider, ProviderSession,
    TargetHandle,
};
use crate::region::{Region, RegionConfig, RegionError};

/// Request code attached to the availability remediation prompt.
pub const DEFAULT_RESOLUTION_REQUEST_CODE: i32 = 2404;

/// Registration settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationConfig {
    /// Transition reported immediately if the device is already inside a
    /// newly registered region.
    pub initial_trigger: InitialTrigger,

    /// Request code for the availability remediation prompt.
    pub resolution_request_code: i32,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            initial_trigger: InitialTrigger::Enter,
            resolution_request_code: DEFAULT_RESOLUTION_REQUEST_CODE,
        }
    }
}

impl RegistrationConfig {
    pub fn with_initial_trigger(mut self, trigger: InitialTrigger) -> Self {
        self.initial_trigger = trigger;
        self
    }

    pub fn with_resolution_request_code(mut self, code: i32) -> Self {
        self.resolution_request_code = code;
        self
    }
}

/// A provider session is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connected;

/// The provider accepted a registration request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack;

/// The geofencing capability is present and enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Available;

type PendingConnect = Shared<BoxFuture<'static, Result<ProviderSession, RegistrationError>>>;

enum ConnectionState {
    Disconnected,
    /// An attempt is in flight; later callers join it instead of starting
    /// their own.
    Connecting {
        attempt: u64,
        pending: PendingConnect,
    },
    Connected(ProviderSession),
}

struct ConnectionSlot {
    state: ConnectionState,
    attempts: u64,
}

struct ManagerShared {
    provider: Arc<dyn LocationProvider>,
    host: Arc<dyn HostContext>,
    interaction: Arc<InteractionContext>,
    stats: Arc<DispatchStats>,
    config: RegistrationConfig,
    connection: Mutex<ConnectionSlot>,
    target: Mutex<Option<TargetHandle>>,
}

/// Translates region requests into provider calls.
///
/// Cheap to clone; clones share the provider session and callback target.
///
/// # Connection lifecycle
///
/// ```text
/// Disconnected ──connect()──► Connecting ──ok──► Connected (kept for the process lifetime)
///       ▲                         │
///       └──────────failed─────────┘
/// ```
///
/// Every provider call is initiated on the interaction context.
#[derive(Clone)]
pub struct RegistrationManager {
    shared: Arc<ManagerShared>,
}

impl RegistrationManager {
    pub fn new(
        provider: Arc<dyn LocationProvider>,
        host: Arc<dyn HostContext>,
        interaction: Arc<InteractionContext>,
        stats: Arc<DispatchStats>,
        config: RegistrationConfig,
    ) -> Self {
        Self {
            shared: Arc::new(ManagerShared {
                provider,
                host,
                interaction,
                stats,
                config,
                connection: Mutex::new(ConnectionSlot {
                    state: ConnectionState::Disconnected,
                    attempts: 0,
                }),
                target: Mutex::new(None),
            }),
        }
    }

    /// Establish the provider session, or reuse the live one.
    ///
    /// Concurrent calls share a single in-flight attempt.
    ///
    /// # Errors
    ///
    /// `GOOGLE_API_CONNECT_ERROR` if the provider refuses or suspends the
    /// connection. The manager is then disconnected and a later call retries.
    pub async fn connect(&self) -> Result<Connected, RegistrationError> {
        self.session().await.map(|_| Connected)
    }

    pub fn is_connected(&self) -> bool {
        matches!(
            self.shared.connection.lock().state,
            ConnectionState::Connected(_)
        )
    }

    /// Register a single region.
    pub async fn add_region(&self, region: Region) -> Result<Ack, RegistrationError> {
        self.add_regions(vec![region]).await
    }

    /// Validate and register a region from caller configuration.
    pub async fn add_region_config(&self, config: &RegionConfig) -> Result<Ack, RegistrationError> {
        let region = Region::from_config(config)?;
        self.add_region(region).await
    }

    /// Validate and register a batch of regions from caller configuration.
    pub async fn add_region_configs(
        &self,
        configs: &[RegionConfig],
    ) -> Result<Ack, RegistrationError> {
        let regions = configs
            .iter()
            .map(Region::from_config)
            .collect::<Result<Vec<_>, _>>()?;
        self.add_regions(regions).await
    }

    /// Register every region in one provider request.
    ///
    /// Connects lazily. The request carries the configured initial trigger
    /// and the shared callback target.
    ///
    /// # Errors
    ///
    /// - `INVALID_REGION` for an empty batch or a repeated identifier
    /// - `NO_HOST_CONTEXT` if the callback target cannot be built
    /// - `GOOGLE_API_CONNECT_ERROR` if the lazy connection fails
    /// - `PROVIDER_ERROR` if the provider rejects the request
    pub async fn add_regions(&self, regions: Vec<Region>) -> Result<Ack, RegistrationError> {
        if regions.is_empty() {
            return Err(RegionError::NoRegions.into());
        }
        let mut seen = HashSet::with_capacity(regions.len());
        if let Some(duplicate) = regions.iter().find(|r| !seen.insert(r.identifier())) {
            return Err(RegionError::DuplicateIdentifier(duplicate.identifier().to_string()).into());
        }

        let target = self.callback_target()?;
        let session = self.session().await?;

        let request = GeofencingRequest::new(self.shared.config.initial_trigger, regions);
        let identifiers: Vec<String> = request
            .identifiers()
            .into_iter()
            .map(str::to_string)
            .collect();
        info!(regions = ?identifiers, "Adding geofences");

        let provider = Arc::clone(&self.shared.provider);
        let pending = self
            .shared
            .interaction
            .call(move || provider.add_regions(&session, request, &target))
            .await?;

        match pending.await {
            Ok(()) => {
                info!(count = identifiers.len(), "Geofences added");
                Ok(Ack)
            }
            Err(status) => {
                warn!(status = %status, regions = ?identifiers, "Adding geofences failed");
                Err(RegistrationError::Provider { status })
            }
        }
    }

    /// Remove a region by identifier.
    ///
    /// Fire-and-forget: failures are logged and counted in
    /// [`DispatchStats`], never returned.
    pub fn remove_region(&self, identifier: impl Into<String>) {
        let identifier = identifier.into();
        info!(identifier = %identifier, "Removing geofence");

        let this = self.clone();
        self.shared.interaction.spawn(async move {
            if let Err(e) = this.remove_by_ids(vec![identifier.clone()]).await {
                warn!(identifier = %identifier, error = %e, code = e.code(), "Removing geofence failed");
                this.shared.stats.removal_failed();
            }
        });
    }

    /// Remove every region registered against this manager's callback target.
    ///
    /// Fire-and-forget, like [`remove_region`](Self::remove_region).
    pub fn remove_all_regions(&self) {
        info!("Removing all geofences");

        let this = self.clone();
        self.shared.interaction.spawn(async move {
            if let Err(e) = this.remove_by_target().await {
                warn!(error = %e, code = e.code(), "Removing all geofences failed");
                this.shared.stats.removal_failed();
            }
        });
    }

    /// Check that the geofencing capability is present and enabled.
    ///
    /// When it is not, the call rejects with the provider status. If
    /// `auto_resolve_prompt` is set, the status is user-resolvable, and a
    /// foreground screen exists, the remediation prompt is shown as well.
    pub async fn availability(
        &self,
        auto_resolve_prompt: bool,
    ) -> Result<Available, RegistrationError> {
        let provider = Arc::clone(&self.shared.provider);
        let host = Arc::clone(&self.shared.host);
        let request_code = self.shared.config.resolution_request_code;

        self.shared
            .interaction
            .call(move || {
                let status = provider.check_availability();
                if status.is_success() {
                    return Ok(Available);
                }

                warn!(status = %status, "Location provider not available");
                if auto_resolve_prompt && provider.is_user_resolvable(status) && host.has_foreground()
                {
                    info!(status = %status, request_code, "Showing availability resolution prompt");
                    host.show_resolution_prompt(status, request_code);
                }
                Err(RegistrationError::Provider { status })
            })
            .await?
    }

    /// Whether device location is switched on.
    ///
    /// An unreadable setting counts as off.
    pub async fn location_capability_enabled(&self) -> Result<bool, RegistrationError> {
        let host = Arc::clone(&self.shared.host);
        let mode = self
            .shared
            .interaction
            .call(move || host.location_mode())
            .await?;
        debug!(mode = ?mode, "Location mode");
        Ok(mode.map_or(false, |m| m.is_enabled()))
    }

    /// Show the OS location settings screen.
    pub fn open_location_settings(&self) -> Result<(), RegistrationError> {
        if !self.shared.host.has_foreground() {
            return Err(RegistrationError::NoHostContext);
        }
        self.shared.host.open_location_settings();
        Ok(())
    }

    /// The callback target, built on first use and reused afterwards.
    fn callback_target(&self) -> Result<TargetHandle, RegistrationError> {
        let mut target = self.shared.target.lock();
        if let Some(existing) = target.as_ref() {
            return Ok(existing.clone());
        }

        let created = self
            .shared
            .host
            .create_callback_target()
            .ok_or(RegistrationError::NoHostContext)?;
        debug!(target = %created, "Created geofence callback target");
        *target = Some(created.clone());
        Ok(created)
    }

    async fn session(&self) -> Result<ProviderSession, RegistrationError> {
        let (attempt, pending) = {
            let mut guard = self.shared.connection.lock();
            let slot = &mut *guard;
            match &slot.state {
                ConnectionState::Connected(session) => return Ok(session.clone()),
                ConnectionState::Connecting { attempt, pending } => (*attempt, pending.clone()),
                ConnectionState::Disconnected => {
                    slot.attempts += 1;
                    let attempt = slot.attempts;
                    let pending = self.open_session().shared();
                    slot.state = ConnectionState::Connecting {
                        attempt,
                        pending: pending.clone(),
                    };
                    (attempt, pending)
                }
            }
        };

        let result = pending.await;

        let mut slot = self.shared.connection.lock();
        let current = matches!(
            &slot.state,
            ConnectionState::Connecting { attempt: a, .. } if *a == attempt
        );
        if current {
            slot.state = match &result {
                Ok(session) => ConnectionState::Connected(session.clone()),
                Err(_) => ConnectionState::Disconnected,
            };
        }
        result
    }

    fn open_session(&self) -> BoxFuture<'static, Result<ProviderSession, RegistrationError>> {
        let provider = Arc::clone(&self.shared.provider);
        let interaction = Arc::clone(&self.shared.interaction);

        Box::pin(async move {
            info!("Connecting to location provider");
            let pending = interaction.call(move || provider.connect()).await?;
            match pending.await {
                Ok(session) => {
                    info!(session = session.id(), "Location provider connection completed");
                    Ok(session)
                }
                Err(e) => {
                    warn!(error = %e, "Location provider connection failed");
                    Err(RegistrationError::Connect(e))
                }
            }
        })
    }

    async fn remove_by_ids(&self, identifiers: Vec<String>) -> Result<(), RegistrationError> {
        let session = self.session().await?;
        let provider = Arc::clone(&self.shared.provider);
        let pending = self
            .shared
            .interaction
            .call(move || provider.remove_regions_by_id(&session, identifiers))
            .await?;
        pending
            .await
            .map_err(|status| RegistrationError::Provider { status })
    }

    async fn remove_by_target(&self) -> Result<(), RegistrationError> {
        let target = self.callback_target()?;
        let session = self.session().await?;
        let provider = Arc::clone(&self.shared.provider);
        let pending = self
            .shared
            .interaction
            .call(move || provider.remove_regions_by_target(&session, &target))
            .await?;
        pending
            .await
            .map_err(|status| RegistrationError::Provider { status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{
        ConnectBehavior, ConnectError, LocationMode, ProviderStatus, SimulatedHost,
        SimulatedProvider,
    };
    use std::time::Duration;
    use tokio::runtime::Handle;

    struct Harness {
        manager: RegistrationManager,
        provider: Arc<SimulatedProvider>,
        host: Arc<SimulatedHost>,
        stats: Arc<DispatchStats>,
    }

    fn harness() -> Harness {
        let provider = Arc::new(SimulatedProvider::new());
        let host = Arc::new(SimulatedHost::new());
        let stats = Arc::new(DispatchStats::new());
        let interaction = Arc::new(InteractionContext::start(&Handle::current()));
        let manager = RegistrationManager::new(
            provider.clone(),
            host.clone(),
            interaction,
            Arc::clone(&stats),
            RegistrationConfig::default(),
        );
        Harness {
            manager,
            provider,
            host,
            stats,
        }
    }

    fn region(id: &str) -> Region {
        Region::new(id, 1.0, 2.0, 100.0).unwrap()
    }

    async fn eventually(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not met in time");
    }

    #[tokio::test]
    async fn test_connect_twice_opens_one_session() {
        let h = harness();

        assert_eq!(h.manager.connect().await, Ok(Connected));
        assert_eq!(h.manager.connect().await, Ok(Connected));

        assert!(h.manager.is_connected());
        assert_eq!(h.provider.sessions_created(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_connect_shares_in_flight_attempt() {
        let h = harness();
        h.provider.set_connect_delay(Some(Duration::from_millis(20)));

        let (a, b, c) = tokio::join!(
            h.manager.connect(),
            h.manager.connect(),
            h.manager.connect()
        );

        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(h.provider.sessions_created(), 1);
    }

    #[tokio::test]
    async fn test_failed_connect_rejects_and_allows_retry() {
        let h = harness();
        h.provider
            .set_connect_behavior(ConnectBehavior::Fail { code: 8 });

        let err = h.manager.connect().await.unwrap_err();
        assert_eq!(err, RegistrationError::Connect(ConnectError::Failed { code: 8 }));
        assert_eq!(err.code(), "GOOGLE_API_CONNECT_ERROR");
        assert!(!h.manager.is_connected());

        h.provider.set_connect_behavior(ConnectBehavior::Succeed);
        assert!(h.manager.connect().await.is_ok());
        assert_eq!(h.provider.sessions_created(), 2);
    }

    #[tokio::test]
    async fn test_suspended_connect_rejects() {
        let h = harness();
        h.provider
            .set_connect_behavior(ConnectBehavior::Suspend { cause: 1 });

        let err = h.manager.connect().await.unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::Connect(ConnectError::Suspended { cause: 1 })
        ));
    }

    #[tokio::test]
    async fn test_add_region_connects_lazily() {
        let h = harness();

        assert_eq!(h.manager.add_region(region("home")).await, Ok(Ack));

        assert_eq!(h.provider.sessions_created(), 1);
        assert_eq!(h.provider.registered_ids(), vec!["home"]);
        assert_eq!(h.provider.last_initial_trigger(), Some(InitialTrigger::Enter));
    }

    #[tokio::test]
    async fn test_add_regions_is_one_request() {
        let h = harness();

        h.manager
            .add_regions(vec![region("home"), region("work")])
            .await
            .unwrap();

        assert_eq!(h.provider.add_requests(), 1);
        assert_eq!(h.provider.registered_ids(), vec!["home", "work"]);
    }

    #[tokio::test]
    async fn test_add_empty_batch_is_rejected_without_provider_call() {
        let h = harness();

        let err = h.manager.add_regions(Vec::new()).await.unwrap_err();

        assert_eq!(err.code(), "INVALID_REGION");
        assert_eq!(h.provider.sessions_created(), 0);
        assert_eq!(h.provider.add_requests(), 0);
    }

    #[tokio::test]
    async fn test_add_batch_with_repeated_identifier_is_rejected() {
        let h = harness();

        let err = h
            .manager
            .add_regions(vec![region("home"), region("work"), region("home")])
            .await
            .unwrap_err();

        assert_eq!(
            err,
            RegistrationError::InvalidRegion(RegionError::DuplicateIdentifier("home".to_string()))
        );
        assert_eq!(err.code(), "INVALID_REGION");
        assert_eq!(h.provider.add_requests(), 0);
        assert!(h.provider.registered_ids().is_empty());
    }

    #[tokio::test]
    async fn test_add_region_config_validates() {
        let h = harness();
        let bad = RegionConfig {
            identifier: "home".to_string(),
            latitude: 120.0,
            longitude: 2.0,
            radius: 100.0,
        };

        let err = h.manager.add_region_config(&bad).await.unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::InvalidRegion(RegionError::LatitudeOutOfRange(_))
        ));
        assert_eq!(h.provider.add_requests(), 0);
    }

    #[tokio::test]
    async fn test_provider_rejection_surfaces_status() {
        let h = harness();
        h.provider
            .reject_add(Some(ProviderStatus::GEOFENCE_TOO_MANY_GEOFENCES));

        let err = h.manager.add_region(region("home")).await.unwrap_err();

        assert_eq!(
            err.provider_status(),
            Some(ProviderStatus::GEOFENCE_TOO_MANY_GEOFENCES)
        );
        assert!(h.provider.registered_ids().is_empty());
    }

    #[tokio::test]
    async fn test_add_without_host_context_fails() {
        let h = harness();
        h.host.set_application_available(false);

        let err = h.manager.add_region(region("home")).await.unwrap_err();

        assert_eq!(err, RegistrationError::NoHostContext);
        assert_eq!(h.provider.add_requests(), 0);
    }

    #[tokio::test]
    async fn test_callback_target_is_built_once() {
        let h = harness();

        h.manager.add_region(region("home")).await.unwrap();
        h.manager.add_region(region("work")).await.unwrap();

        assert_eq!(h.host.targets_created(), 1);
        assert_eq!(h.provider.registered_targets().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_region_by_identifier() {
        let h = harness();
        h.manager
            .add_regions(vec![region("home"), region("work")])
            .await
            .unwrap();

        h.manager.remove_region("home");

        eventually(|| h.provider.registered_ids() == vec!["work"]).await;
        assert_eq!(h.stats.snapshot().removal_failures, 0);
    }

    #[tokio::test]
    async fn test_remove_all_regions_uses_shared_target() {
        let h = harness();
        h.manager
            .add_regions(vec![region("home"), region("work")])
            .await
            .unwrap();

        h.manager.remove_all_regions();

        eventually(|| h.provider.registered_ids().is_empty()).await;
        assert_eq!(h.host.targets_created(), 1);
    }

    #[tokio::test]
    async fn test_removal_failure_is_counted_not_returned() {
        let h = harness();
        h.manager.add_region(region("home")).await.unwrap();
        h.provider.reject_remove(Some(ProviderStatus::GEOFENCE_NOT_AVAILABLE));

        h.manager.remove_region("home");

        eventually(|| h.stats.snapshot().removal_failures == 1).await;
        assert_eq!(h.provider.registered_ids(), vec!["home"]);
    }

    #[tokio::test]
    async fn test_availability_success() {
        let h = harness();
        assert_eq!(h.manager.availability(true).await, Ok(Available));
        assert!(h.host.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_availability_without_auto_resolve_shows_no_prompt() {
        let h = harness();
        h.provider
            .set_availability(ProviderStatus::SERVICE_DISABLED, true);

        let err = h.manager.availability(false).await.unwrap_err();

        assert_eq!(err.provider_status(), Some(ProviderStatus::SERVICE_DISABLED));
        assert!(h.host.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_availability_with_auto_resolve_prompts_and_rejects() {
        let h = harness();
        h.provider
            .set_availability(ProviderStatus::SERVICE_DISABLED, true);

        let err = h.manager.availability(true).await.unwrap_err();

        assert_eq!(err.provider_status(), Some(ProviderStatus::SERVICE_DISABLED));
        assert_eq!(
            h.host.prompts(),
            vec![(ProviderStatus::SERVICE_DISABLED, DEFAULT_RESOLUTION_REQUEST_CODE)]
        );
    }

    #[tokio::test]
    async fn test_availability_prompt_needs_foreground() {
        let h = harness();
        h.provider
            .set_availability(ProviderStatus::SERVICE_MISSING, true);
        h.host.set_foreground(false);

        assert!(h.manager.availability(true).await.is_err());
        assert!(h.host.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_availability_prompt_needs_resolvable_status() {
        let h = harness();
        h.provider
            .set_availability(ProviderStatus::SERVICE_MISSING, false);

        assert!(h.manager.availability(true).await.is_err());
        assert!(h.host.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_location_capability_enabled() {
        let h = harness();
        assert_eq!(h.manager.location_capability_enabled().await, Ok(true));

        h.host.set_location_mode(Some(LocationMode::Off));
        assert_eq!(h.manager.location_capability_enabled().await, Ok(false));

        h.host.set_location_mode(None);
        assert_eq!(h.manager.location_capability_enabled().await, Ok(false));
    }

    #[tokio::test]
    async fn test_open_location_settings() {
        let h = harness();
        assert!(h.manager.open_location_settings().is_ok());
        assert_eq!(h.host.settings_opened(), 1);

        h.host.set_foreground(false);
        assert_eq!(
            h.manager.open_location_settings(),
            Err(RegistrationError::NoHostContext)
        );
        assert_eq!(h.host.settings_opened(), 1);
    }

    #[tokio::test]
    async fn test_configured_initial_trigger_is_used() {
        let provider = Arc::new(SimulatedProvider::new());
        let manager = RegistrationManager::new(
            provider.clone(),
            Arc::new(SimulatedHost::new()),
            Arc::new(InteractionContext::start(&Handle::current())),
            Arc::new(DispatchStats::new()),
            RegistrationConfig::default().with_initial_trigger(InitialTrigger::Dwell),
        );

        manager.add_region(region("home")).await.unwrap();

        assert_eq!(provider.last_initial_trigger(), Some(InitialTrigger::Dwell));
    }
}
