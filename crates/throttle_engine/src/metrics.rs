//! Per-throttler counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for a single throttler instance
#[derive(Debug, Default)]
pub struct ThrottleMetrics {
    /// Fragments merged into the pending record
    fragments_received: AtomicU64,
    /// Records accepted by the sink
    records_emitted: AtomicU64,
    /// Records the sink rejected with an error
    emit_failures: AtomicU64,
    /// Records dropped because the sink was absent
    emissions_dropped: AtomicU64,
    /// Deferred emissions scheduled
    deferred_scheduled: AtomicU64,
    /// Pushes ignored after disposal
    rejected_after_dispose: AtomicU64,
    /// Mode transitions applied
    mode_transitions: AtomicU64,
}

impl ThrottleMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_fragments_received(&self) {
        self.fragments_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_records_emitted(&self) {
        self.records_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_emit_failures(&self) {
        self.emit_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_emissions_dropped(&self) {
        self.emissions_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_deferred_scheduled(&self) {
        self.deferred_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rejected_after_dispose(&self) {
        self.rejected_after_dispose.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_mode_transitions(&self) {
        self.mode_transitions.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self) -> ThrottleMetricsSnapshot {
        ThrottleMetricsSnapshot {
            fragments_received: self.fragments_received.load(Ordering::Relaxed),
            records_emitted: self.records_emitted.load(Ordering::Relaxed),
            emit_failures: self.emit_failures.load(Ordering::Relaxed),
            emissions_dropped: self.emissions_dropped.load(Ordering::Relaxed),
            deferred_scheduled: self.deferred_scheduled.load(Ordering::Relaxed),
            rejected_after_dispose: self.rejected_after_dispose.load(Ordering::Relaxed),
            mode_transitions: self.mode_transitions.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of throttler counters (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThrottleMetricsSnapshot {
    pub fragments_received: u64,
    pub records_emitted: u64,
    pub emit_failures: u64,
    pub emissions_dropped: u64,
    pub deferred_scheduled: u64,
    pub rejected_after_dispose: u64,
    pub mode_transitions: u64,
}
