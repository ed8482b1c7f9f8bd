//! Handoff metrics
//!
//! Counters for run lifecycle events and wait failures. All counters are
//! relaxed atomics; a snapshot is a best-effort view, not a consistent cut.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct HandoffMetrics {
    pub runs_created: AtomicU64,
    pub runs_retired: AtomicU64,
    pub forward_published: AtomicU64,
    pub backward_published: AtomicU64,
    pub outcomes_succeeded: AtomicU64,
    pub outcomes_failed: AtomicU64,
    pub driver_wakes: AtomicU64,
    pub wait_timeouts: AtomicU64,
    pub wait_cancellations: AtomicU64,
}

impl HandoffMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_outcome(&self, success: bool) {
        if success {
            Self::incr(&self.outcomes_succeeded);
        } else {
            Self::incr(&self.outcomes_failed);
        }
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            runs_created: self.runs_created.load(Ordering::Relaxed),
            runs_retired: self.runs_retired.load(Ordering::Relaxed),
            forward_published: self.forward_published.load(Ordering::Relaxed),
            backward_published: self.backward_published.load(Ordering::Relaxed),
            outcomes_succeeded: self.outcomes_succeeded.load(Ordering::Relaxed),
            outcomes_failed: self.outcomes_failed.load(Ordering::Relaxed),
            driver_wakes: self.driver_wakes.load(Ordering::Relaxed),
            wait_timeouts: self.wait_timeouts.load(Ordering::Relaxed),
            wait_cancellations: self.wait_cancellations.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub runs_created: u64,
    pub runs_retired: u64,
    pub forward_published: u64,
    pub backward_published: u64,
    pub outcomes_succeeded: u64,
    pub outcomes_failed: u64,
    pub driver_wakes: u64,
    pub wait_timeouts: u64,
    pub wait_cancellations: u64,
}

impl MetricsSnapshot {
    /// Runs created but not yet retired
    pub fn active_runs(&self) -> u64 {
        self.runs_created.saturating_sub(self.runs_retired)
    }

    /// Calculate success rate (0.0 to 1.0) over published outcomes
    pub fn success_rate(&self) -> f64 {
        let total = self.outcomes_succeeded + self.outcomes_failed;
        if total == 0 {
            return 0.0;
        }
        self.outcomes_succeeded as f64 / total as f64
    }
}
