//! Dispatch counters.
//!
//! Lock-free atomic counters updated on the delivery path, read through a
//! point-in-time [`DispatchStatsSnapshot`].

use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Sentinel stored while no provider error has been seen.
const NO_ERROR: i64 = i64::MIN;

/// Counters for everything the dispatcher and registration manager drop,
/// defer, or emit.
#[derive(Debug)]
pub struct DispatchStats {
    deliveries_received: AtomicU64,
    deliveries_deferred: AtomicU64,
    messages_emitted: AtomicU64,
    provider_errors: AtomicU64,
    last_error_code: AtomicI64,
    unsupported_transitions: AtomicU64,
    boot_events_emitted: AtomicU64,
    signals_ignored: AtomicU64,
    removal_failures: AtomicU64,
}

impl Default for DispatchStats {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchStats {
    pub fn new() -> Self {
        Self {
            deliveries_received: AtomicU64::new(0),
            deliveries_deferred: AtomicU64::new(0),
            messages_emitted: AtomicU64::new(0),
            provider_errors: AtomicU64::new(0),
            last_error_code: AtomicI64::new(NO_ERROR),
            unsupported_transitions: AtomicU64::new(0),
            boot_events_emitted: AtomicU64::new(0),
            signals_ignored: AtomicU64::new(0),
            removal_failures: AtomicU64::new(0),
        }
    }

    pub fn delivery_received(&self) {
        self.deliveries_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn delivery_deferred(&self) {
        self.deliveries_deferred.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_emitted(&self) {
        self.messages_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn provider_error(&self, code: i32) {
        self.last_error_code.store(code as i64, Ordering::Relaxed);
        self.provider_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn unsupported_transition(&self) {
        self.unsupported_transitions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn boot_event_emitted(&self) {
        self.boot_events_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn signal_ignored(&self) {
        self.signals_ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn removal_failed(&self) {
        self.removal_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of the counters.
    pub fn snapshot(&self) -> DispatchStatsSnapshot {
        let last = self.last_error_code.load(Ordering::Relaxed);
        DispatchStatsSnapshot {
            deliveries_received: self.deliveries_received.load(Ordering::Relaxed),
            deliveries_deferred: self.deliveries_deferred.load(Ordering::Relaxed),
            messages_emitted: self.messages_emitted.load(Ordering::Relaxed),
            provider_errors: self.provider_errors.load(Ordering::Relaxed),
            last_error_code: (last != NO_ERROR).then_some(last as i32),
            unsupported_transitions: self.unsupported_transitions.load(Ordering::Relaxed),
            boot_events_emitted: self.boot_events_emitted.load(Ordering::Relaxed),
            signals_ignored: self.signals_ignored.load(Ordering::Relaxed),
            removal_failures: self.removal_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`DispatchStats`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchStatsSnapshot {
    pub deliveries_received: u64,
    pub deliveries_deferred: u64,
    pub messages_emitted: u64,
    pub provider_errors: u64,
    pub last_error_code: Option<i32>,
    pub unsupported_transitions: u64,
    pub boot_events_emitted: u64,
    pub signals_ignored: u64,
    pub removal_failures: u64,
}

impl fmt::Display for DispatchStatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "deliveries: {} ({} deferred), emitted: {}, boot: {}, errors: {}, unsupported: {}, removal failures: {}",
            self.deliveries_received,
            self.deliveries_deferred,
            self.messages_emitted,
            self.boot_events_emitted,
            self.provider_errors,
            self.unsupported_transitions,
            self.removal_failures
        )
    }
}
