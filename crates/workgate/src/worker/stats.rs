//! Worker outcome counters

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Monotonic counters of terminal worker outcomes
///
/// Each wrapper bumps exactly one counter, once, when it reaches a terminal
/// state. A single instance may be shared by many wrappers to summarize a
/// whole fleet of workers.
#[derive(Debug, Default)]
pub struct WorkerStats {
    cancel_count: AtomicU64,
    error_count: AtomicU64,
    success_count: AtomicU64,
}

/// Point-in-time copy of [`WorkerStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub cancel_count: u64,
    pub error_count: u64,
    pub success_count: u64,
}

impl StatsSnapshot {
    /// Total terminal outcomes recorded
    pub fn total(&self) -> u64 {
        self.cancel_count + self.error_count + self.success_count
    }
}

impl WorkerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_cancel(&self) {
        self.cancel_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_success(&self) {
        self.success_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cancel_count(&self) -> u64 {
        self.cancel_count.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    pub fn success_count(&self) -> u64 {
        self.success_count.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cancel_count: self.cancel_count(),
            error_count: self.error_count(),
            success_count: self.success_count(),
        }
    }

    /// Render as `WorkerCancelCount=<n>;WorkerErrorCount=<n>;WorkerSuccessCount=<n>`
    ///
    /// Key names and order are stable; log scrapers match on them.
    pub fn stats_as_string(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for WorkerStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();
        write!(
            f,
            "WorkerCancelCount={};WorkerErrorCount={};WorkerSuccessCount={}",
            snapshot.cancel_count, snapshot.error_count, snapshot.success_count
        )
    }
}
