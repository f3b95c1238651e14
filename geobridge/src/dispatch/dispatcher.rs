//! Readiness-gated delivery of geofence events.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::error::DeliveryError;
use super::stats::DispatchStats;
use crate::bus::{deliver_when_ready, DeliveryTiming, EventBus};
use crate::event::{EmittedEvent, EventName, EventPayload, SystemSignal, TransitionDelivery};
use crate::interaction::{InteractionContext, Job};
use crate::region::TransitionKind;

/// Turn a delivery into the events it should emit.
///
/// Errors win over everything else; only ENTER and EXIT produce events. The
/// result holds one event per triggering region, in delivery order.
pub fn classify_delivery(delivery: TransitionDelivery) -> Result<Vec<EmittedEvent>, DeliveryError> {
    if let Some(code) = delivery.error_code {
        return Err(DeliveryError::ProviderError(code));
    }

    let name = match delivery.kind {
        TransitionKind::Enter => EventName::EnterGeofence,
        TransitionKind::Exit => EventName::ExitGeofence,
        other => return Err(DeliveryError::UnsupportedTransition(other)),
    };

    Ok(delivery
        .triggering_region_ids
        .into_iter()
        .map(|id| EmittedEvent::new(name, Some(EventPayload::identifier(id))))
        .collect())
}

/// Receives OS deliveries and forwards them to the event bus.
///
/// Cheap to clone; every clone shares the bus, interaction context, and
/// counters. Entry points never block: gating runs on the interaction
/// context and, if the bus is cold, parks in an on-ready continuation.
#[derive(Clone)]
pub struct EventDispatcher {
    bus: Arc<dyn EventBus>,
    interaction: Arc<InteractionContext>,
    stats: Arc<DispatchStats>,
    start_runtime: bool,
}

impl EventDispatcher {
    /// Create a dispatcher.
    ///
    /// With `start_runtime` set, a delivery that finds the bus cold also
    /// requests runtime startup.
    pub fn new(
        bus: Arc<dyn EventBus>,
        interaction: Arc<InteractionContext>,
        stats: Arc<DispatchStats>,
        start_runtime: bool,
    ) -> Self {
        Self {
            bus,
            interaction,
            stats,
            start_runtime,
        }
    }

    /// Accept a geofence transition delivery.
    ///
    /// Errored deliveries are recorded and dropped here, without waking the
    /// runtime. Everything else is emitted once the bus is ready.
    pub fn on_delivery(&self, delivery: TransitionDelivery) {
        self.stats.delivery_received();

        if let Some(code) = delivery.error_code {
            record_failure(&self.stats, DeliveryError::ProviderError(code));
            return;
        }

        let stats = Arc::clone(&self.stats);
        self.when_ready(move |bus| emit_transition(bus, &stats, delivery));
    }

    /// Accept a boot or location-settings broadcast.
    ///
    /// Qualifying signals emit a single `DEVICE_BOOT_COMPLETED` with no
    /// payload once the bus is ready.
    pub fn on_system_signal(&self, signal: SystemSignal) {
        if !signal.qualifies() {
            debug!(signal = ?signal, "Ignoring system signal, location unavailable");
            self.stats.signal_ignored();
            return;
        }

        info!(signal = ?signal, "System signal received");
        let stats = Arc::clone(&self.stats);
        self.when_ready(move |bus| {
            bus.emit(EventName::DeviceBootCompleted, None);
            stats.boot_event_emitted();
        });
    }

    pub fn stats(&self) -> &Arc<DispatchStats> {
        &self.stats
    }

    fn when_ready<F>(&self, thunk: F)
    where
        F: FnOnce(&dyn EventBus) + Send + 'static,
    {
        let bus = Arc::clone(&self.bus);
        let stats = Arc::clone(&self.stats);
        let start_runtime = self.start_runtime;

        let job: Job = Box::new(move || {
            if deliver_when_ready(&bus, start_runtime, thunk) == DeliveryTiming::Deferred {
                stats.delivery_deferred();
            }
        });

        // Never drop a delivery because the interaction context is gone.
        if let Err(job) = self.interaction.post(job) {
            warn!("Interaction context closed, gating delivery on the calling thread");
            job();
        }
    }
}

fn emit_transition(bus: &dyn EventBus, stats: &DispatchStats, delivery: TransitionDelivery) {
    let kind = delivery.kind;
    match classify_delivery(delivery) {
        Ok(events) => {
            info!(
                transition = %kind,
                regions = ?events.iter().filter_map(EmittedEvent::identifier).collect::<Vec<_>>(),
                "Geofence transition"
            );
            for event in events {
                bus.emit(event.name, event.payload);
                stats.message_emitted();
            }
        }
        Err(err) => record_failure(stats, err),
    }
}

fn record_failure(stats: &DispatchStats, err: DeliveryError) {
    match err {
        DeliveryError::ProviderError(code) => {
            error!(code, kind = err.code(), "Geofence delivery reported an error");
            stats.provider_error(code);
        }
        DeliveryError::UnsupportedTransition(transition) => {
            error!(transition = %transition, kind = err.code(), "Geofence transition has invalid type");
            stats.unsupported_transition();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{LocalEventBus, ReadinessState};
    use crate::provider::LocationMode;
    use tokio::runtime::Handle;
    use tokio::sync::mpsc;

    struct Harness {
        dispatcher: EventDispatcher,
        bus: Arc<LocalEventBus>,
        events: mpsc::UnboundedReceiver<EmittedEvent>,
        interaction: Arc<InteractionContext>,
    }

    impl Harness {
        fn new(start_runtime: bool) -> Self {
            let (bus, events) = LocalEventBus::new();
            let interaction = Arc::new(InteractionContext::start(&Handle::current()));
            let dispatcher = EventDispatcher::new(
                bus.clone(),
                Arc::clone(&interaction),
                Arc::new(DispatchStats::new()),
                start_runtime,
            );
            Self {
                dispatcher,
                bus,
                events,
                interaction,
            }
        }

        fn ready(start_runtime: bool) -> Self {
            let harness = Self::new(start_runtime);
            harness.bus.mark_ready();
            harness
        }

        async fn settle(&self) {
            self.interaction.flush().await.unwrap();
        }

        fn drain(&mut self) -> Vec<EmittedEvent> {
            let mut out = Vec::new();
            while let Ok(event) = self.events.try_recv() {
                out.push(event);
            }
            out
        }
    }

    fn identifiers(events: &[EmittedEvent]) -> Vec<&str> {
        events.iter().filter_map(EmittedEvent::identifier).collect()
    }

    #[test]
    fn test_classify_enter() {
        let events = classify_delivery(TransitionDelivery::enter(["home"])).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, EventName::EnterGeofence);
        assert_eq!(events[0].identifier(), Some("home"));
    }

    #[test]
    fn test_classify_error_wins_over_kind() {
        let mut delivery = TransitionDelivery::enter(["home"]);
        delivery.error_code = Some(1000);
        assert_eq!(
            classify_delivery(delivery),
            Err(DeliveryError::ProviderError(1000))
        );
    }

    #[test]
    fn test_classify_rejects_dwell() {
        let delivery = TransitionDelivery::new(TransitionKind::Dwell, ["home"]);
        assert_eq!(
            classify_delivery(delivery),
            Err(DeliveryError::UnsupportedTransition(TransitionKind::Dwell))
        );
    }

    #[tokio::test]
    async fn test_enter_while_ready_emits_once() {
        let mut h = Harness::ready(true);

        h.dispatcher.on_delivery(TransitionDelivery::enter(["home"]));
        h.settle().await;

        let events = h.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, EventName::EnterGeofence);
        assert_eq!(events[0].identifier(), Some("home"));
        assert_eq!(h.dispatcher.stats().snapshot().deliveries_deferred, 0);
    }

    #[tokio::test]
    async fn test_exit_for_two_regions_keeps_order() {
        let mut h = Harness::ready(true);

        h.dispatcher.on_delivery(TransitionDelivery::exit(["home", "work"]));
        h.settle().await;

        let events = h.drain();
        assert!(events.iter().all(|e| e.name == EventName::ExitGeofence));
        assert_eq!(identifiers(&events), vec!["home", "work"]);
    }

    #[tokio::test]
    async fn test_errored_delivery_recorded_once_and_not_emitted() {
        let mut h = Harness::new(true);

        h.dispatcher.on_delivery(TransitionDelivery::error(1000));
        h.settle().await;
        h.bus.mark_ready();

        assert!(h.drain().is_empty());
        let stats = h.dispatcher.stats().snapshot();
        assert_eq!(stats.provider_errors, 1);
        assert_eq!(stats.last_error_code, Some(1000));
        // Errors never wake the runtime.
        assert_eq!(h.bus.start_requests(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_transition_emits_nothing() {
        let mut h = Harness::ready(true);

        h.dispatcher
            .on_delivery(TransitionDelivery::new(TransitionKind::Other(16), ["home"]));
        h.settle().await;

        assert!(h.drain().is_empty());
        assert_eq!(h.dispatcher.stats().snapshot().unsupported_transitions, 1);
    }

    #[tokio::test]
    async fn test_cold_bus_defers_until_ready() {
        let mut h = Harness::new(true);

        h.dispatcher.on_delivery(TransitionDelivery::enter(["home"]));
        h.settle().await;

        assert!(h.drain().is_empty(), "must not emit before ready");
        assert_eq!(h.bus.current_state(), ReadinessState::Starting);
        assert_eq!(h.bus.start_requests(), 1);

        h.bus.mark_ready();

        let events = h.drain();
        assert_eq!(identifiers(&events), vec!["home"]);
        assert_eq!(h.dispatcher.stats().snapshot().deliveries_deferred, 1);
    }

    #[tokio::test]
    async fn test_deliveries_before_ready_keep_arrival_order() {
        let mut h = Harness::new(true);

        h.dispatcher.on_delivery(TransitionDelivery::enter(["a", "b"]));
        h.dispatcher.on_delivery(TransitionDelivery::exit(["c"]));
        h.dispatcher.on_delivery(TransitionDelivery::enter(["d"]));
        h.settle().await;
        h.bus.mark_ready();

        h.dispatcher.on_delivery(TransitionDelivery::exit(["e"]));
        h.settle().await;

        let events = h.drain();
        assert_eq!(identifiers(&events), vec!["a", "b", "c", "d", "e"]);
        assert_eq!(events[2].name, EventName::ExitGeofence);
        assert_eq!(h.bus.start_requests(), 1);
    }

    #[tokio::test]
    async fn test_boot_signal_on_cold_bus_starts_runtime() {
        let mut h = Harness::new(true);

        h.dispatcher.on_system_signal(SystemSignal::BootCompleted);
        h.settle().await;

        assert_eq!(h.bus.start_requests(), 1);
        assert!(h.drain().is_empty());

        h.bus.mark_ready();

        let events = h.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, EventName::DeviceBootCompleted);
        assert!(events[0].payload.is_none());
        assert_eq!(h.dispatcher.stats().snapshot().boot_events_emitted, 1);
    }

    #[tokio::test]
    async fn test_location_off_signal_is_ignored() {
        let mut h = Harness::ready(true);

        h.dispatcher.on_system_signal(SystemSignal::LocationModeChanged {
            mode: LocationMode::Off,
        });
        h.settle().await;

        assert!(h.drain().is_empty());
        assert_eq!(h.dispatcher.stats().snapshot().signals_ignored, 1);
    }

    #[tokio::test]
    async fn test_no_startup_request_when_disabled() {
        let mut h = Harness::new(false);

        h.dispatcher.on_delivery(TransitionDelivery::enter(["home"]));
        h.settle().await;

        assert_eq!(h.bus.start_requests(), 0);
        assert_eq!(h.bus.current_state(), ReadinessState::NotStarted);

        // The host starts its runtime on its own schedule.
        h.bus.mark_ready();
        assert_eq!(identifiers(&h.drain()), vec!["home"]);
    }

    #[tokio::test]
    async fn test_closed_interaction_context_still_delivers() {
        let mut h = Harness::ready(true);
        h.interaction.shutdown().await;

        h.dispatcher.on_delivery(TransitionDelivery::enter(["home"]));

        assert_eq!(identifiers(&h.drain()), vec!["home"]);
    }

    #[tokio::test]
    async fn test_shutdown_delivers_queued_deliveries() {
        let mut h = Harness::ready(true);

        h.dispatcher.on_delivery(TransitionDelivery::enter(["a"]));
        h.dispatcher.on_delivery(TransitionDelivery::exit(["b"]));
        h.dispatcher.on_system_signal(SystemSignal::BootCompleted);
        h.interaction.shutdown().await;

        let events = h.drain();
        let names: Vec<EventName> = events.iter().map(|e| e.name).collect();
        assert_eq!(
            names,
            vec![
                EventName::EnterGeofence,
                EventName::ExitGeofence,
                EventName::DeviceBootCompleted,
            ]
        );
        assert_eq!(identifiers(&events), vec!["a", "b"]);
        let stats = h.dispatcher.stats().snapshot();
        assert_eq!(stats.messages_emitted, 2);
        assert_eq!(stats.boot_events_emitted, 1);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_fan_out_matches_region_ids(
                ids in proptest::collection::vec("[a-z]{1,8}", 0..16),
                exit in any::<bool>(),
            ) {
                let delivery = if exit {
                    TransitionDelivery::exit(ids.clone())
                } else {
                    TransitionDelivery::enter(ids.clone())
                };
                let expected = if exit { EventName::ExitGeofence } else { EventName::EnterGeofence };

                let events = classify_delivery(delivery).unwrap();

                prop_assert_eq!(events.len(), ids.len());
                for (event, id) in events.iter().zip(&ids) {
                    prop_assert_eq!(event.name, expected);
                    prop_assert_eq!(event.identifier(), Some(id.as_str()));
                }
            }

            #[test]
            fn test_error_code_never_emits(
                code in any::<i32>(),
                ids in proptest::collection::vec("[a-z]{1,8}", 0..8),
            ) {
                let mut delivery = TransitionDelivery::enter(ids);
                delivery.error_code = Some(code);
                prop_assert_eq!(classify_delivery(delivery), Err(DeliveryError::ProviderError(code)));
            }

            #[test]
            fn test_unsupported_kinds_never_emit(
                code in any::<i32>().prop_filter("not enter/exit", |c| *c != 1 && *c != 2),
            ) {
                let delivery = TransitionDelivery::new(TransitionKind::from_code(code), ["home"]);
                prop_assert!(classify_delivery(delivery).is_err());
            }
        }
    }
}
