use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters updated as the wheel runs.
pub(crate) struct StatsCounter {
    scheduled: AtomicU64,
    fired: AtomicU64,
    cancelled: AtomicU64,
    demotions: AtomicU64,
}

impl StatsCounter {
    pub fn new() -> Self {
        StatsCounter {
            scheduled: AtomicU64::new(0),
            fired: AtomicU64::new(0),
            cancelled: AtomicU64::new(0),
            demotions: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_scheduled(&self) {
        self.scheduled.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_fired(&self) {
        self.fired.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_demotion(&self) {
        self.demotions.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time snapshot of the counters.
    pub fn snapshot(&self) -> Metrics {
        Metrics {
            scheduled: self.scheduled.load(Ordering::Relaxed),
            fired: self.fired.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            demotions: self.demotions.load(Ordering::Relaxed),
        }
    }
}

impl Default for StatsCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of wheel statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metrics {
    /// Number of installations, including replacements of an existing key
    /// and schedules that fired immediately.
    pub scheduled: u64,
    /// Number of expirations handed to the dispatcher.
    pub fired: u64,
    /// Number of explicit cancellations that removed a live entry.
    pub cancelled: u64,
    /// Number of times a ticked entry migrated to a finer layer.
    pub demotions: u64,
}
