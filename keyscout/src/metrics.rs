use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// Counts what the coordinator did with the notifications it received
#[derive(Debug, Clone)]
pub struct CoordinatorMetrics {
    // Caller-side events
    notifications: Arc<AtomicU64>,
    immediate_triggers: Arc<AtomicU64>,
    resets: Arc<AtomicU64>,

    // Worker-side events
    dispatched: Arc<AtomicU64>,
    overflow_threads: Arc<AtomicU64>,
    superseded_before_start: Arc<AtomicU64>,
    started: Arc<AtomicU64>,

    // Outcomes
    delivered: Arc<AtomicU64>,
    discarded: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
}

impl CoordinatorMetrics {
    pub fn new() -> Self {
        Self {
            notifications: Arc::new(AtomicU64::new(0)),
            immediate_triggers: Arc::new(AtomicU64::new(0)),
            resets: Arc::new(AtomicU64::new(0)),
            dispatched: Arc::new(AtomicU64::new(0)),
            overflow_threads: Arc::new(AtomicU64::new(0)),
            superseded_before_start: Arc::new(AtomicU64::new(0)),
            started: Arc::new(AtomicU64::new(0)),
            delivered: Arc::new(AtomicU64::new(0)),
            discarded: Arc::new(AtomicU64::new(0)),
            failed: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn record_notification(&self) {
        self.notifications.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_immediate_trigger(&self) {
        self.immediate_triggers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reset(&self) {
        self.resets.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an execution handed to the worker pool
    pub fn record_dispatch(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an execution that got its own thread because every pool worker was busy
    pub fn record_overflow(&self) {
        self.overflow_threads.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a dispatched execution that was superseded before its worker ran
    pub fn record_superseded_before_start(&self) {
        self.superseded_before_start.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_start(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivery(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an execution whose outcome was dropped because it was cancelled
    pub fn record_discard(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> CoordinatorStats {
        CoordinatorStats {
            notifications: self.notifications.load(Ordering::Relaxed),
            immediate_triggers: self.immediate_triggers.load(Ordering::Relaxed),
            resets: self.resets.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            overflow_threads: self.overflow_threads.load(Ordering::Relaxed),
            superseded_before_start: self.superseded_before_start.load(Ordering::Relaxed),
            started: self.started.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Search coordinator stats:\n\
             Notifications/immediate/resets: {}/{}/{}\n\
             Dispatched: {} (overflow threads: {}, superseded before start: {})\n\
             Started: {}\n\
             Delivered/discarded/failed: {}/{}/{}",
            stats.notifications,
            stats.immediate_triggers,
            stats.resets,
            stats.dispatched,
            stats.overflow_threads,
            stats.superseded_before_start,
            stats.started,
            stats.delivered,
            stats.discarded,
            stats.failed
        );
    }
}

impl Default for CoordinatorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of [`CoordinatorMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    pub notifications: u64,
    pub immediate_triggers: u64,
    pub resets: u64,
    pub dispatched: u64,
    pub overflow_threads: u64,
    pub superseded_before_start: u64,
    pub started: u64,
    pub delivered: u64,
    pub discarded: u64,
    pub failed: u64,
}

impl CoordinatorStats {
    /// Notifications that never turned into an execution of their own
    pub fn collapsed_notifications(&self) -> u64 {
        self.notifications.saturating_sub(self.started)
    }
}
