//! Per-sink counters
//!
//! Every update is mirrored to the global `metrics` facade with a `sink`
//! label so an installed exporter sees the same numbers.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counters for a single sink queue and its worker
#[derive(Debug)]
pub struct SinkMetrics {
    sink: String,
    /// Records waiting in the queue (approximate)
    queue_len: AtomicUsize,
    /// Records written by the worker
    write_count: AtomicU64,
    /// Records the sink failed to write
    failure_count: AtomicU64,
    /// Records rejected because the queue was full or closed
    dropped_count: AtomicU64,
}

impl SinkMetrics {
    pub fn new(sink: impl Into<String>) -> Self {
        Self {
            sink: sink.into(),
            queue_len: AtomicUsize::new(0),
            write_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
            dropped_count: AtomicU64::new(0),
        }
    }

    pub fn sink(&self) -> &str {
        &self.sink
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
        metrics::gauge!("geo_throttle_sink_queue_len", "sink" => self.sink.clone()).set(len as f64);
    }

    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::Relaxed)
    }

    pub fn inc_write_count(&self) {
        self.write_count.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("geo_throttle_sink_writes_total", "sink" => self.sink.clone())
            .increment(1);
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("geo_throttle_sink_failures_total", "sink" => self.sink.clone())
            .increment(1);
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    pub fn inc_dropped_count(&self) {
        self.dropped_count.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("geo_throttle_sink_dropped_total", "sink" => self.sink.clone())
            .increment(1);
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self) -> SinkMetricsSnapshot {
        SinkMetricsSnapshot {
            queue_len: self.queue_len(),
            write_count: self.write_count(),
            failure_count: self.failure_count(),
            dropped_count: self.dropped_count(),
        }
    }
}

/// Snapshot of sink counters (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkMetricsSnapshot {
    pub queue_len: usize,
    pub write_count: u64,
    pub failure_count: u64,
    pub dropped_count: u64,
}

impl SinkMetricsSnapshot {
    /// Records that reached the sink or were lost on the way
    pub fn accounted(&self) -> u64 {
        self.write_count + self.failure_count + self.dropped_count
    }
}
