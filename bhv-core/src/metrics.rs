//! Operation counters for the behavior store.
//!
//! Lock-free `AtomicU64` counters bumped on the request path and read when
//! `/stats` is served or the process shuts down.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Atomic counters for store events since startup.
pub struct StoreCounters {
    /// Behaviors uploaded (new or replaced).
    pub uploads: AtomicU64,
    /// Behaviors replaced through `update_behavior`.
    pub updates: AtomicU64,
    /// Retention sweeps run.
    pub sweeps: AtomicU64,
    /// Behaviors deleted by retention sweeps.
    pub behaviors_retired: AtomicU64,
    /// Explicit behavior or profile deletions.
    pub deletions: AtomicU64,
    /// Profiles cloned.
    pub clones: AtomicU64,
    /// Snapshot writes that succeeded.
    pub saves_completed: AtomicU64,
    /// Snapshot writes that failed.
    pub save_failures: AtomicU64,
}

impl StoreCounters {
    /// Create a new set of zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            uploads: AtomicU64::new(0),
            updates: AtomicU64::new(0),
            sweeps: AtomicU64::new(0),
            behaviors_retired: AtomicU64::new(0),
            deletions: AtomicU64::new(0),
            clones: AtomicU64::new(0),
            saves_completed: AtomicU64::new(0),
            save_failures: AtomicU64::new(0),
        }
    }

    /// Add `n` to a counter.
    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Increment a counter by one.
    pub fn bump(counter: &AtomicU64) {
        Self::add(counter, 1);
    }

    /// Snapshot all counters for export.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            uploads: self.uploads.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            sweeps: self.sweeps.load(Ordering::Relaxed),
            behaviors_retired: self.behaviors_retired.load(Ordering::Relaxed),
            deletions: self.deletions.load(Ordering::Relaxed),
            clones: self.clones.load(Ordering::Relaxed),
            saves_completed: self.saves_completed.load(Ordering::Relaxed),
            save_failures: self.save_failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for StoreCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StoreCounters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.snapshot().fmt(f)
    }
}

/// A snapshot of counter values at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    /// Behaviors uploaded.
    pub uploads: u64,
    /// Behaviors replaced by update.
    pub updates: u64,
    /// Retention sweeps run.
    pub sweeps: u64,
    /// Behaviors retired by sweeps.
    pub behaviors_retired: u64,
    /// Explicit deletions.
    pub deletions: u64,
    /// Profiles cloned.
    pub clones: u64,
    /// Successful snapshot writes.
    pub saves_completed: u64,
    /// Failed snapshot writes.
    pub save_failures: u64,
}

impl CounterSnapshot {
    /// Format as Prometheus-compatible text.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        let rows: [(&str, &str, u64); 8] = [
            ("uploads", "Behaviors uploaded", self.uploads),
            ("updates", "Behaviors replaced by update", self.updates),
            ("sweeps", "Retention sweeps run", self.sweeps),
            ("behaviors_retired", "Behaviors retired by sweeps", self.behaviors_retired),
            ("deletions", "Explicit behavior or profile deletions", self.deletions),
            ("clones", "Profiles cloned", self.clones),
            ("saves_completed", "Snapshot writes completed", self.saves_completed),
            ("save_failures", "Snapshot writes failed", self.save_failures),
        ];
        let mut out = String::new();
        for (name, help, value) in rows {
            out.push_str(&format!(
                "# HELP bhv_{name}_total {help}\n# TYPE bhv_{name}_total counter\nbhv_{name}_total {value}\n"
            ));
        }
        out
    }
}
