//! Statistics tracking for refresh coordination

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time coordinator statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorStats {
    /// Requests taken off the bus or dispatched directly
    pub requests_received: u64,
    /// Consumer evaluations skipped because the interest set did not match
    pub filtered: u64,
    /// Consumer evaluations dropped because a reload was in flight
    pub dropped_in_flight: u64,
    pub reloads_started: u64,
    pub reloads_succeeded: u64,
    pub reloads_failed: u64,
}

/// Thread-safe statistics collector
#[derive(Debug, Default)]
pub(crate) struct StatsCollector {
    requests_received: AtomicU64,
    filtered: AtomicU64,
    dropped_in_flight: AtomicU64,
    reloads_started: AtomicU64,
    reloads_succeeded: AtomicU64,
    reloads_failed: AtomicU64,
}

impl StatsCollector {
    pub fn record_request(&self) {
        self.requests_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_filtered(&self) {
        self.filtered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped_in_flight.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_started(&self) {
        self.reloads_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_outcome(&self, succeeded: bool) {
        let counter = if succeeded {
            &self.reloads_succeeded
        } else {
            &self.reloads_failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CoordinatorStats {
        CoordinatorStats {
            requests_received: self.requests_received.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            dropped_in_flight: self.dropped_in_flight.load(Ordering::Relaxed),
            reloads_started: self.reloads_started.load(Ordering::Relaxed),
            reloads_succeeded: self.reloads_succeeded.load(Ordering::Relaxed),
            reloads_failed: self.reloads_failed.load(Ordering::Relaxed),
        }
    }
}
