//! Counters for bus activity.
//!
//! Lock-free and updated on the hot path with relaxed ordering; read them
//! through [`BusMetrics::snapshot`].

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for one bus.
#[derive(Debug, Default)]
pub struct BusMetrics {
    /// Events passed to `publish`
    pub events_published: AtomicU64,
    /// Published events that found no subscriber
    pub events_unrouted: AtomicU64,
    /// Handler invocations that completed
    pub deliveries: AtomicU64,
    /// Handler invocations that panicked or returned an error
    pub failures: AtomicU64,
    /// Invocations skipped because the owner was dropped
    pub owner_dropped_skips: AtomicU64,
    /// Subscriptions added
    pub registrations: AtomicU64,
    /// Subscriptions removed, including pruned ones
    pub unregistrations: AtomicU64,
}

impl BusMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_publish(&self, subscribers: usize) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
        if subscribers == 0 {
            self.events_unrouted.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_delivery(&self) {
        self.deliveries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_owner_dropped(&self) {
        self.owner_dropped_skips.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_registrations(&self, count: usize) {
        self.registrations.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_unregistrations(&self, count: usize) {
        self.unregistrations.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Current values.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_published: self.events_published.load(Ordering::Relaxed),
            events_unrouted: self.events_unrouted.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            owner_dropped_skips: self.owner_dropped_skips.load(Ordering::Relaxed),
            registrations: self.registrations.load(Ordering::Relaxed),
            unregistrations: self.unregistrations.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        for counter in [
            &self.events_published,
            &self.events_unrouted,
            &self.deliveries,
            &self.failures,
            &self.owner_dropped_skips,
            &self.registrations,
            &self.unregistrations,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Point-in-time copy of [`BusMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub events_published: u64,
    pub events_unrouted: u64,
    pub deliveries: u64,
    pub failures: u64,
    pub owner_dropped_skips: u64,
    pub registrations: u64,
    pub unregistrations: u64,
}

impl MetricsSnapshot {
    /// Subscriptions currently live according to the counters.
    #[must_use]
    pub fn live_subscriptions(&self) -> u64 {
        self.registrations.saturating_sub(self.unregistrations)
    }

    /// Fraction of invocations that failed, or 0 when nothing ran.
    #[must_use]
    pub fn failure_rate(&self) -> f64 {
        let attempts = self.deliveries + self.failures;
        if attempts > 0 {
            self.failures as f64 / attempts as f64
        } else {
            0.0
        }
    }
}
