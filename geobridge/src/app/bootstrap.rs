//! Application bootstrap implementation.
//!
//! `GeofenceApp` is the one owned service object for the process. It starts
//! the interaction context first, then builds the registration manager and
//! event dispatcher on top of it so both share the same collaborators.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::{Handle, Runtime};
use tracing::info;

use super::config::GeofenceConfig;
use super::error::AppError;
use crate::bus::EventBus;
use crate::dispatch::{DispatchStats, DispatchStatsSnapshot, EventDispatcher};
use crate::event::constants;
use crate::interaction::{ContextClosed, InteractionContext};
use crate::provider::{HostContext, LocationProvider};
use crate::registration::RegistrationManager;

/// How long `shutdown_sync` waits for background removals to finish.
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// External collaborators the app is wired to.
#[derive(Clone)]
pub struct Collaborators {
    pub provider: Arc<dyn LocationProvider>,
    pub host: Arc<dyn HostContext>,
    pub bus: Arc<dyn EventBus>,
}

/// Geofence bridge with its service lifecycle.
///
/// # Example
///
/// ```ignore
/// use geobridge::app::{Collaborators, GeofenceApp, GeofenceConfig};
///
/// let app = GeofenceApp::start(GeofenceConfig::default(), collaborators).await?;
///
/// app.registration().add_region(region).await?;
/// // The OS callback target forwards deliveries here:
/// app.dispatcher().on_delivery(delivery);
///
/// app.shutdown().await;
/// ```
pub struct GeofenceApp {
    config: GeofenceConfig,
    interaction: Arc<InteractionContext>,
    registration: RegistrationManager,
    dispatcher: EventDispatcher,
    stats: Arc<DispatchStats>,
    handle: Handle,

    /// Owned runtime when created via `start_sync()`.
    runtime: Option<Runtime>,
}

impl GeofenceApp {
    /// Start the app on the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// [`AppError::RuntimeUnavailable`] when polled outside a Tokio runtime.
    pub async fn start(config: GeofenceConfig, collaborators: Collaborators) -> Result<Self, AppError> {
        let handle = Handle::try_current().map_err(|_| AppError::RuntimeUnavailable)?;
        Ok(Self::start_internal(config, collaborators, handle))
    }

    /// Start the app on a dedicated runtime it owns.
    ///
    /// For callers without a runtime, such as CLI commands. Must not be
    /// called from inside an async context.
    pub fn start_sync(config: GeofenceConfig, collaborators: Collaborators) -> Result<Self, AppError> {
        let runtime = Runtime::new().map_err(|e| AppError::RuntimeCreation(e.to_string()))?;
        let mut app = Self::start_internal(config, collaborators, runtime.handle().clone());
        app.runtime = Some(runtime);
        Ok(app)
    }

    fn start_internal(config: GeofenceConfig, collaborators: Collaborators, handle: Handle) -> Self {
        info!(
            initial_trigger = config.registration.initial_trigger.as_str(),
            auto_start_runtime = config.dispatch.auto_start_runtime,
            "Starting GeofenceApp"
        );

        // 1. Interaction context first: every provider call goes through it.
        let interaction = Arc::new(InteractionContext::start(&handle));
        let stats = Arc::new(DispatchStats::new());

        // 2. Registration manager (owns the provider session and target).
        let registration = RegistrationManager::new(
            collaborators.provider,
            collaborators.host,
            Arc::clone(&interaction),
            Arc::clone(&stats),
            config.registration.clone(),
        );

        // 3. Dispatcher (gates deliveries on bus readiness).
        let dispatcher = EventDispatcher::new(
            collaborators.bus,
            Arc::clone(&interaction),
            Arc::clone(&stats),
            config.dispatch.auto_start_runtime,
        );

        info!("GeofenceApp started");

        Self {
            config,
            interaction,
            registration,
            dispatcher,
            stats,
            handle,
            runtime: None,
        }
    }

    pub fn registration(&self) -> &RegistrationManager {
        &self.registration
    }

    /// The dispatcher the OS callback target forwards deliveries to.
    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    pub fn config(&self) -> &GeofenceConfig {
        &self.config
    }

    pub fn stats(&self) -> DispatchStatsSnapshot {
        self.stats.snapshot()
    }

    /// Exported event-name table.
    pub fn constants(&self) -> BTreeMap<&'static str, &'static str> {
        constants()
    }

    /// Handle to the runtime the app's tasks run on.
    pub fn runtime_handle(&self) -> Handle {
        self.handle.clone()
    }

    /// Wait until everything queued on the interaction context has run.
    pub async fn flush(&self) -> Result<(), ContextClosed> {
        self.interaction.flush().await
    }

    /// Stop the interaction context.
    ///
    /// Deliveries already accepted are gated before this returns. Deliveries
    /// arriving afterwards are still gated, on the caller's thread.
    pub async fn shutdown(self) {
        info!(stats = %self.stats.snapshot(), "Shutting down GeofenceApp");
        self.interaction.shutdown().await;
        info!("GeofenceApp shutdown complete");
    }

    /// Shut down an app created with `start_sync()`, including its runtime.
    pub fn shutdown_sync(mut self) {
        match self.runtime.take() {
            Some(runtime) => {
                let interaction = Arc::clone(&self.interaction);
                runtime.block_on(async move { interaction.shutdown().await });
                info!(stats = %self.stats.snapshot(), "GeofenceApp shutdown complete");
                drop(self);
                runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
            }
            None => {
                // No owned runtime: stop the task without waiting. Queued jobs still run.
                self.interaction.cancel();
            }
        }
    }
}
