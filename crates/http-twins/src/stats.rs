//! Atomic mirror statistics counters.
//!
//! Lock-free counters for fan-out volume and per-destination results.
//! All atomics use `Relaxed` ordering: these are monotonic display counters
//! with no synchronization requirements.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::mirror::{DestinationKind, DispatchOutcome};

#[derive(Default)]
struct StatsInner {
    fanouts: AtomicU64,
    inactive: AtomicU64,
    snapshot_failures: AtomicU64,
    oversized: AtomicU64,
    dispatched: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    fallbacks: AtomicU64,
}

/// Thread-safe mirror statistics. Cheap to clone (Arc).
#[derive(Clone, Default)]
pub struct MirrorStats {
    inner: Arc<StatsInner>,
}

/// Point-in-time view of the counters, serializable to JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsReport {
    /// Invocations that built a snapshot and scheduled dispatch units.
    pub fanouts: u64,
    /// Invocations skipped because activation resolved to false.
    pub inactive: u64,
    pub snapshot_failures: u64,
    /// Invocations skipped because the body exceeded the mirror size limit.
    pub oversized: u64,
    pub dispatched: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub fallbacks: u64,
}

impl MirrorStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_fanouts(&self) {
        self.inner.fanouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_inactive(&self) {
        self.inner.inactive.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_snapshot_failures(&self) {
        self.inner.snapshot_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_oversized(&self) {
        self.inner.oversized.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_dispatched(&self) {
        self.inner.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_outcome(&self, outcome: &DispatchOutcome) {
        if outcome.succeeded {
            self.inner.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.failed.fetch_add(1, Ordering::Relaxed);
        }
        if outcome.kind == DestinationKind::Fallback {
            self.inner.fallbacks.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn report(&self) -> StatsReport {
        StatsReport {
            fanouts: self.inner.fanouts.load(Ordering::Relaxed),
            inactive: self.inner.inactive.load(Ordering::Relaxed),
            snapshot_failures: self.inner.snapshot_failures.load(Ordering::Relaxed),
            oversized: self.inner.oversized.load(Ordering::Relaxed),
            dispatched: self.inner.dispatched.load(Ordering::Relaxed),
            succeeded: self.inner.succeeded.load(Ordering::Relaxed),
            failed: self.inner.failed.load(Ordering::Relaxed),
            fallbacks: self.inner.fallbacks.load(Ordering::Relaxed),
        }
    }
}
