//! Statistics tap in front of the dispatcher

use std::sync::{Arc, Mutex, PoisonError};

use contracts::{ContractError, Record, RecordSink};
use observability::{EmissionStatsAggregator, EmissionSummary};
use tokio::time::Instant;
use tracing::debug;

/// Records every emission into an aggregator, then forwards it
pub struct StatsTap {
    name: String,
    inner: Arc<dyn RecordSink>,
    stats: Mutex<EmissionStatsAggregator>,
    started: Instant,
}

impl StatsTap {
    pub fn new(inner: Arc<dyn RecordSink>, stats: EmissionStatsAggregator) -> Self {
        Self {
            name: format!("tap:{}", inner.name()),
            inner,
            stats: Mutex::new(stats),
            started: Instant::now(),
        }
    }

    pub fn summary(&self) -> EmissionSummary {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .summary()
    }
}

impl RecordSink for StatsTap {
    fn name(&self) -> &str {
        &self.name
    }

    fn emit(&self, record: Record) -> Result<(), ContractError> {
        let at_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .update(&record, at_ms);
        debug!(fields = record.len(), at_ms, "record emitted");
        self.inner.emit(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Fragment, FIELD_MODE_CHANGE};
    use dispatcher::CallbackSink;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn record(fragment: Fragment) -> Record {
        let mut record = Record::new();
        fragment.merge_into(&mut record);
        record
    }

    #[tokio::test(start_paused = true)]
    async fn test_tap_counts_and_forwards() {
        let forwarded = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&forwarded);
        let inner: Arc<dyn RecordSink> = Arc::new(CallbackSink::new("inner", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));
        let tap = StatsTap::new(inner, EmissionStatsAggregator::new());
        assert_eq!(tap.name(), "tap:inner");

        tap.emit(record(Fragment::new().with("heading", 1.0))).unwrap();
        tokio::time::advance(Duration::from_millis(100)).await;
        tap.emit(record(Fragment::new().with(FIELD_MODE_CHANGE, "static")))
            .unwrap();

        assert_eq!(forwarded.load(Ordering::SeqCst), 2);
        let summary = tap.summary();
        assert_eq!(summary.total_records, 2);
        assert_eq!(summary.transitions_to_static, 1);
        let gap = summary.interval("static").unwrap();
        assert!((gap.mean - 100.0).abs() < 1.0);
    }

    #[tokio::test]
    async fn test_tap_propagates_sink_errors() {
        let inner: Arc<dyn RecordSink> = Arc::new(CallbackSink::new("down", |_| {
            Err(ContractError::sink_unavailable("down"))
        }));
        let tap = StatsTap::new(inner, EmissionStatsAggregator::new());

        let err = tap.emit(record(Fragment::new().with("lat", 1.0))).unwrap_err();
        assert!(err.is_unavailable());
        assert_eq!(tap.summary().total_records, 1);
    }
}
