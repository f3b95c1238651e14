//! `geobridge simulate`: replay a delivery trace.
//!
//! Regions from the configuration file are registered with the simulated
//! provider, then every trace step is applied in order. Emitted events are
//! written to stdout as JSON lines; a summary goes to stderr.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use geobridge::app::{Collaborators, GeofenceApp, GeofenceConfig};
use geobridge::bus::{EventBus, LocalEventBus};
use geobridge::dispatch::DispatchStatsSnapshot;
use geobridge::event::{EmittedEvent, SystemSignal, TransitionDelivery};
use geobridge::logging::init_logging;
use geobridge::provider::{LocationMode, SimulatedHost, SimulatedProvider};
use geobridge::region::RegionConfig;
use geobridge::RegistrationError;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

use crate::error::CliError;
use crate::trace::{parse_trace, TraceEntry};

/// Upper bound on waiting for a fire-and-forget removal to land.
const REMOVAL_SETTLE_TIMEOUT: Duration = Duration::from_millis(500);

/// Extra time allowed past `--ready-after-ms` before giving up on startup.
const STARTUP_GRACE: Duration = Duration::from_millis(500);

const POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Configuration file with [region.<id>] sections (defaults to the user config)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// JSON-lines delivery trace to replay
    #[arg(long)]
    pub trace: PathBuf,

    /// Finish bus startup this many milliseconds after it is requested.
    /// Without it the bus only becomes ready on a `ready` trace step.
    #[arg(long)]
    pub ready_after_ms: Option<u64>,
}

/// Outcome of a replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationReport {
    pub emitted: usize,
    /// Deliveries still waiting for the bus when the replay ended.
    pub undelivered: usize,
    pub stats: DispatchStatsSnapshot,
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} events emitted, {} deliveries waiting for the bus ({})",
            self.emitted, self.undelivered, self.stats
        )
    }
}

/// Run the simulate command.
pub fn run(args: SimulateArgs, verbose: bool) -> Result<(), CliError> {
    let (config, regions) = load_settings(args.config.as_deref())?;

    let mut logging = config.logging.clone();
    if verbose {
        logging.level = "debug".to_string();
    }
    let _guard = init_logging(&logging)?;

    let file = File::open(&args.trace)?;
    let trace = parse_trace(BufReader::new(file))?;
    info!(
        trace = %args.trace.display(),
        steps = trace.len(),
        regions = regions.len(),
        "Replaying trace"
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let report = simulate(
        config,
        &regions,
        trace,
        args.ready_after_ms.map(Duration::from_millis),
        &mut out,
    )?;

    eprintln!("{}", report);
    Ok(())
}

fn load_settings(path: Option<&Path>) -> Result<(GeofenceConfig, Vec<RegionConfig>), CliError> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match GeofenceConfig::default_path() {
            Some(path) if path.exists() => path,
            _ => return Ok((GeofenceConfig::default(), Vec::new())),
        },
    };

    let config = GeofenceConfig::load(&path)?;
    let regions = GeofenceConfig::load_regions(&path)?;
    Ok((config, regions))
}

/// Replay `trace` against a fresh bridge wired to simulated collaborators.
pub fn simulate<W: Write>(
    config: GeofenceConfig,
    regions: &[RegionConfig],
    trace: Vec<TraceEntry>,
    ready_after: Option<Duration>,
    out: &mut W,
) -> Result<SimulationReport, CliError> {
    let provider = Arc::new(SimulatedProvider::new());
    let (bus, mut events) = match ready_after {
        Some(delay) => LocalEventBus::with_startup_delay(delay),
        None => LocalEventBus::new(),
    };

    let app = GeofenceApp::start_sync(
        config,
        Collaborators {
            provider: provider.clone(),
            host: Arc::new(SimulatedHost::new()),
            bus: bus.clone(),
        },
    )?;
    provider.attach(app.dispatcher().clone());

    let replayer = Replayer {
        app: &app,
        provider: &provider,
        bus: &bus,
    };
    let handle = app.runtime_handle();
    let result = handle.block_on(replayer.run(regions, trace, ready_after, &mut events, out));

    let stats = app.stats();
    app.shutdown_sync();

    Ok(SimulationReport {
        emitted: result?,
        undelivered: bus.pending_continuations(),
        stats,
    })
}

struct Replayer<'a> {
    app: &'a GeofenceApp,
    provider: &'a SimulatedProvider,
    bus: &'a LocalEventBus,
}

impl Replayer<'_> {
    async fn run<W: Write>(
        &self,
        regions: &[RegionConfig],
        trace: Vec<TraceEntry>,
        ready_after: Option<Duration>,
        events: &mut UnboundedReceiver<EmittedEvent>,
        out: &mut W,
    ) -> Result<usize, CliError> {
        if !regions.is_empty() {
            self.app.registration().add_region_configs(regions).await?;
            info!(count = regions.len(), "Regions registered");
        }

        let mut emitted = 0;
        for entry in trace {
            self.apply(entry).await?;
            self.app.flush().await.map_err(RegistrationError::from)?;
            emitted += write_events(events, out)?;
        }

        // Give a timed startup the chance to release parked deliveries.
        if let Some(delay) = ready_after {
            if self.bus.pending_continuations() > 0 {
                let ready = tokio::time::timeout(delay + STARTUP_GRACE, self.wait_until_ready()).await;
                if ready.is_err() {
                    warn!("Event bus did not become ready before the replay ended");
                }
            }
        }
        emitted += write_events(events, out)?;

        Ok(emitted)
    }

    async fn apply(&self, entry: TraceEntry) -> Result<(), CliError> {
        let dispatcher = self.app.dispatcher();

        match entry {
            TraceEntry::Transition {
                kind,
                regions,
                error_code: Some(code),
            } => {
                let mut delivery = TransitionDelivery::new(kind.into(), regions);
                delivery.error_code = Some(code);
                self.provider.deliver(delivery);
            }
            TraceEntry::Transition {
                kind,
                regions,
                error_code: None,
            } => {
                if !self.provider.trigger(kind.into(), &regions) {
                    warn!(regions = ?regions, "Transition matched no registered region");
                }
            }
            TraceEntry::Boot => dispatcher.on_system_signal(SystemSignal::BootCompleted),
            TraceEntry::LocationModeChanged { mode } => {
                let mode = mode.parse::<LocationMode>().map_err(CliError::Config)?;
                dispatcher.on_system_signal(SystemSignal::LocationModeChanged { mode });
            }
            TraceEntry::ProvidersChanged { gps, network } => {
                dispatcher.on_system_signal(SystemSignal::ProvidersChanged {
                    gps_enabled: gps,
                    network_enabled: network,
                });
            }
            TraceEntry::Remove { region } => {
                self.app.registration().remove_region(region.clone());
                self.settle(|| !self.provider.registered_ids().contains(&region))
                    .await;
            }
            TraceEntry::RemoveAll => {
                self.app.registration().remove_all_regions();
                self.settle(|| self.provider.registered_ids().is_empty()).await;
            }
            TraceEntry::Wait { ms } => tokio::time::sleep(Duration::from_millis(ms)).await,
            TraceEntry::Ready => {
                self.bus.start_if_needed();
                self.bus.mark_ready();
            }
        }

        Ok(())
    }

    async fn settle(&self, done: impl Fn() -> bool) {
        let waited = tokio::time::timeout(REMOVAL_SETTLE_TIMEOUT, async {
            while !done() {
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        })
        .await;
        if waited.is_err() {
            warn!("Removal did not complete, continuing replay");
        }
    }

    async fn wait_until_ready(&self) {
        while !self.bus.current_state().is_ready() {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

fn write_events<W: Write>(
    events: &mut UnboundedReceiver<EmittedEvent>,
    out: &mut W,
) -> Result<usize, CliError> {
    let mut count = 0;
    while let Ok(event) = events.try_recv() {
        serde_json::to_writer(&mut *out, &event)?;
        writeln!(out)?;
        count += 1;
    }
    Ok(count)
}
