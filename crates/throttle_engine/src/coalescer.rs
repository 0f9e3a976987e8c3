//! Coalescing throttler.
//!
//! Merges fragments last-write-wins into a pending record and emits it at
//! most once per interval of the current rate mode. All state lives behind
//! a single mutex; the sink is called outside it with a detached copy.

use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use contracts::{FieldValue, Fragment, RateMode, Record, RecordSink, FIELD_THROTTLE_MS};
use tokio::time::Instant;
use tracing::{debug, info, instrument, trace, warn};

use crate::metrics::ThrottleMetrics;
use crate::scheduler::{TimerHandle, TokioScheduler};

/// Observable throttler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottlerState {
    /// No pending data, no scheduled emission
    Idle,
    /// Pending data waiting for a scheduled emission
    Buffering,
    /// Terminal; every operation is a no-op
    Disposed,
}

/// Which path produced an emission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EmitPath {
    Immediate,
    Deferred,
    Manual,
}

impl EmitPath {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::Deferred => "deferred",
            Self::Manual => "manual",
        }
    }
}

/// Coalescer construction parameters
#[derive(Debug, Clone)]
pub struct CoalescerConfig {
    /// Label used in logs and metrics
    pub label: String,
    /// Interval while in [`RateMode::Active`]
    pub active_interval: Duration,
    /// Interval while in [`RateMode::Static`]
    pub static_interval: Duration,
    /// Inject `currentThrottleMs` into records lacking it
    pub inject_rate_indicator: bool,
}

impl CoalescerConfig {
    /// Single-interval configuration without rate indicator
    pub fn fixed(label: impl Into<String>, interval: Duration) -> Self {
        Self {
            label: label.into(),
            active_interval: interval,
            static_interval: interval,
            inject_rate_indicator: false,
        }
    }

    fn interval_for(&self, mode: RateMode) -> Duration {
        match mode {
            RateMode::Active => self.active_interval,
            RateMode::Static => self.static_interval,
        }
    }
}

#[derive(Debug)]
struct ScheduledEmit {
    token: u64,
    timer: TimerHandle,
}

#[derive(Debug)]
struct BufferState {
    pending: Record,
    last_emit: Option<Instant>,
    mode: RateMode,
    scheduled: Option<ScheduledEmit>,
    next_token: u64,
    disposed: bool,
}

impl BufferState {
    fn cancel_scheduled(&mut self) {
        if let Some(scheduled) = self.scheduled.take() {
            scheduled.timer.cancel();
        }
    }

    /// Detach the pending record; empty buffers leave `last_emit` untouched
    fn take_record(&mut self, now: Instant) -> Option<(Record, Option<Duration>)> {
        if self.pending.is_empty() {
            return None;
        }
        let since_last = self.last_emit.map(|t| now.saturating_duration_since(t));
        self.last_emit = Some(now);
        Some((mem::take(&mut self.pending), since_last))
    }
}

struct Inner {
    config: CoalescerConfig,
    sink: Arc<dyn RecordSink>,
    scheduler: TokioScheduler,
    metrics: Arc<ThrottleMetrics>,
    state: Mutex<BufferState>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Timer body for a deferred emission
    fn flush_scheduled(&self, token: u64) {
        let ready = {
            let mut state = self.lock();
            if state.disposed {
                return;
            }
            match &state.scheduled {
                Some(scheduled) if scheduled.token == token => {}
                _ => {
                    trace!(label = %self.config.label, token, "stale emission timer ignored");
                    return;
                }
            }
            state.scheduled = None;
            state.take_record(Instant::now())
        };

        if let Some((record, since_last)) = ready {
            self.deliver(record, since_last, EmitPath::Deferred);
        }
    }

    /// Hand a detached record to the sink; failures stop here
    fn deliver(&self, record: Record, since_last: Option<Duration>, path: EmitPath) {
        let fields = record.len();
        match self.sink.emit(record) {
            Ok(()) => {
                self.metrics.inc_records_emitted();
                metrics::counter!(
                    "geo_throttle_records_emitted_total",
                    "path" => path.as_str()
                )
                .increment(1);
                if let Some(gap) = since_last {
                    metrics::histogram!("geo_throttle_emission_interval_ms")
                        .record(gap.as_secs_f64() * 1000.0);
                }
                trace!(
                    label = %self.config.label,
                    sink = %self.sink.name(),
                    path = path.as_str(),
                    fields,
                    "record emitted"
                );
            }
            Err(e) if e.is_unavailable() => {
                self.metrics.inc_emissions_dropped();
                debug!(label = %self.config.label, sink = %self.sink.name(), "sink absent, record dropped");
            }
            Err(e) => {
                self.metrics.inc_emit_failures();
                metrics::counter!("geo_throttle_emit_failures_total").increment(1);
                warn!(
                    label = %self.config.label,
                    sink = %self.sink.name(),
                    error = %e,
                    "sink rejected record"
                );
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel_scheduled();
    }
}

/// Coalescing, rate-mode-aware throttler
///
/// A cheap `Clone` handle; every clone shares the same buffer, so any
/// number of producers may push concurrently.
#[derive(Clone)]
pub struct CoalescingThrottler {
    inner: Arc<Inner>,
}

impl CoalescingThrottler {
    /// Create a throttler starting in [`RateMode::Active`]
    pub fn new(
        config: CoalescerConfig,
        sink: Arc<dyn RecordSink>,
        scheduler: TokioScheduler,
    ) -> Self {
        let state = BufferState {
            pending: Record::new(),
            last_emit: None,
            mode: RateMode::Active,
            scheduled: None,
            next_token: 0,
            disposed: false,
        };

        Self {
            inner: Arc::new(Inner {
                config,
                sink,
                scheduler,
                metrics: Arc::new(ThrottleMetrics::new()),
                state: Mutex::new(state),
            }),
        }
    }

    /// Fixed-interval throttler (no rate modes, no rate indicator)
    pub fn fixed(
        label: impl Into<String>,
        interval: Duration,
        sink: Arc<dyn RecordSink>,
        scheduler: TokioScheduler,
    ) -> Self {
        Self::new(CoalescerConfig::fixed(label, interval), sink, scheduler)
    }

    /// Merge a fragment stamped with the current time
    pub fn push(&self, fragment: Fragment) {
        self.push_at(fragment, Instant::now());
    }

    /// Merge a fragment and decide whether to emit now or later
    ///
    /// Emits synchronously when a full interval has elapsed since the last
    /// emission; otherwise schedules one emission for the remainder unless
    /// one is already outstanding. No-op after disposal.
    #[instrument(
        level = "trace",
        name = "throttler_push",
        skip(self, fragment, now),
        fields(label = %self.inner.config.label, fields = fragment.len())
    )]
    pub fn push_at(&self, fragment: Fragment, now: Instant) {
        self.push_checked(fragment, None, now);
    }

    /// Like [`push_at`](Self::push_at), but discards the fragment unless the
    /// throttler is still in `mode`
    pub(crate) fn push_for_mode_at(&self, fragment: Fragment, mode: RateMode, now: Instant) {
        self.push_checked(fragment, Some(mode), now);
    }

    fn push_checked(&self, fragment: Fragment, required_mode: Option<RateMode>, now: Instant) {
        let inner = &self.inner;
        let ready = {
            let mut state = inner.lock();
            if state.disposed {
                inner.metrics.inc_rejected_after_dispose();
                return;
            }
            if required_mode.is_some_and(|mode| mode != state.mode) {
                trace!(label = %inner.config.label, "fragment for a superseded mode dropped");
                return;
            }

            fragment.merge_into(&mut state.pending);
            inner.metrics.inc_fragments_received();
            metrics::counter!("geo_throttle_fragments_total").increment(1);

            let interval = inner.config.interval_for(state.mode);
            if inner.config.inject_rate_indicator && !state.pending.contains_key(FIELD_THROTTLE_MS)
            {
                state
                    .pending
                    .insert(FIELD_THROTTLE_MS.to_string(), interval_ms(interval));
            }

            let elapsed = state.last_emit.map(|t| now.saturating_duration_since(t));
            match elapsed {
                Some(elapsed) if elapsed < interval => {
                    if state.scheduled.is_none() {
                        self.schedule_locked(&mut state, interval - elapsed);
                    }
                    None
                }
                _ => {
                    state.cancel_scheduled();
                    state.take_record(now)
                }
            }
        };

        if let Some((record, since_last)) = ready {
            inner.deliver(record, since_last, EmitPath::Immediate);
        }
    }

    fn schedule_locked(&self, state: &mut BufferState, delay: Duration) {
        let token = state.next_token;
        state.next_token += 1;

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let timer = self.inner.scheduler.schedule(delay, move || {
            if let Some(inner) = weak.upgrade() {
                inner.flush_scheduled(token);
            }
        });
        state.scheduled = Some(ScheduledEmit { token, timer });
        self.inner.metrics.inc_deferred_scheduled();
        trace!(
            label = %self.inner.config.label,
            token,
            delay_ms = delay.as_millis() as u64,
            "emission scheduled"
        );
    }

    /// Emit the pending record now, cancelling any scheduled emission
    ///
    /// An empty buffer performs no sink call and keeps `last_emit`.
    pub fn flush(&self) {
        let ready = {
            let mut state = self.inner.lock();
            if state.disposed {
                return;
            }
            state.cancel_scheduled();
            state.take_record(Instant::now())
        };

        if let Some((record, since_last)) = ready {
            self.inner.deliver(record, since_last, EmitPath::Manual);
        }
    }

    /// Switch the rate mode; affects decisions made from now on
    pub fn set_mode(&self, mode: RateMode) {
        let mut state = self.inner.lock();
        if !state.disposed {
            state.mode = mode;
        }
    }

    /// Cancel the scheduled emission, discard buffered data and go inert
    ///
    /// Idempotent; safe against a timer that is about to fire.
    #[instrument(name = "throttler_dispose", skip(self), fields(label = %self.inner.config.label))]
    pub fn dispose(&self) {
        let discarded = {
            let mut state = self.inner.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.cancel_scheduled();
            let discarded = state.pending.len();
            state.pending.clear();
            discarded
        };
        info!(
            label = %self.inner.config.label,
            discarded_fields = discarded,
            "throttler disposed"
        );
    }

    /// Derived from the emission timer: `Buffering` while one is outstanding
    pub fn state(&self) -> ThrottlerState {
        let state = self.inner.lock();
        if state.disposed {
            ThrottlerState::Disposed
        } else if state.scheduled.is_some() {
            ThrottlerState::Buffering
        } else {
            ThrottlerState::Idle
        }
    }

    pub fn mode(&self) -> RateMode {
        self.inner.lock().mode
    }

    /// Interval of the current mode
    pub fn current_interval(&self) -> Duration {
        let mode = self.mode();
        self.inner.config.interval_for(mode)
    }

    /// Interval bound to `mode`
    pub fn interval_for(&self, mode: RateMode) -> Duration {
        self.inner.config.interval_for(mode)
    }

    /// Whether a deferred emission is outstanding (at most one ever is)
    pub fn has_scheduled_emission(&self) -> bool {
        self.inner.lock().scheduled.is_some()
    }

    /// Number of fields currently buffered
    pub fn pending_len(&self) -> usize {
        self.inner.lock().pending.len()
    }

    pub fn last_emit(&self) -> Option<Instant> {
        self.inner.lock().last_emit
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.lock().disposed
    }

    pub fn label(&self) -> &str {
        &self.inner.config.label
    }

    pub fn metrics(&self) -> &Arc<ThrottleMetrics> {
        &self.inner.metrics
    }
}

impl std::fmt::Debug for CoalescingThrottler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoalescingThrottler")
            .field("config", &self.inner.config)
            .field("sink", &self.inner.sink.name())
            .finish_non_exhaustive()
    }
}

/// Interval as the integer-milliseconds field value
pub(crate) fn interval_ms(interval: Duration) -> FieldValue {
    FieldValue::Int(i64::try_from(interval.as_millis()).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::ContractError;
    use rand::Rng;
    use std::collections::HashMap;
    use tokio::time::sleep;

    /// In-memory sink recording emissions with their (virtual) time
    #[derive(Default)]
    struct RecordingSink {
        records: Mutex<Vec<(Instant, Record)>>,
        fail: bool,
        absent: bool,
    }

    impl RecordingSink {
        fn records(&self) -> Vec<Record> {
            self.records
                .lock()
                .unwrap()
                .iter()
                .map(|(_, r)| r.clone())
                .collect()
        }

        fn times(&self) -> Vec<Instant> {
            self.records.lock().unwrap().iter().map(|(t, _)| *t).collect()
        }
    }

    impl RecordSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        fn emit(&self, record: Record) -> Result<(), ContractError> {
            if self.absent {
                return Err(ContractError::sink_unavailable("recording"));
            }
            if self.fail {
                return Err(ContractError::sink_write("recording", "mock failure"));
            }
            self.records.lock().unwrap().push((Instant::now(), record));
            Ok(())
        }
    }

    fn adaptive_config() -> CoalescerConfig {
        CoalescerConfig {
            label: "test".to_string(),
            active_interval: Duration::from_millis(100),
            static_interval: Duration::from_millis(1000),
            inject_rate_indicator: true,
        }
    }

    fn throttler_with(sink: Arc<RecordingSink>) -> CoalescingThrottler {
        CoalescingThrottler::new(adaptive_config(), sink, TokioScheduler::current().unwrap())
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[tokio::test(start_paused = true)]
    async fn test_example_scenario() {
        let sink = Arc::new(RecordingSink::default());
        let throttler = throttler_with(Arc::clone(&sink));
        let t0 = Instant::now();

        throttler.push(Fragment::new().with("heading", 10i64));
        assert_eq!(sink.records().len(), 1);
        assert_eq!(throttler.state(), ThrottlerState::Idle);

        sleep(ms(40)).await;
        throttler.push(Fragment::new().with("heading", 12i64));
        assert_eq!(sink.records().len(), 1);
        assert_eq!(throttler.state(), ThrottlerState::Buffering);

        sleep(ms(20)).await;
        throttler.push(Fragment::new().with("lat", 1.0));
        assert!(throttler.has_scheduled_emission());
        assert_eq!(throttler.metrics().snapshot().deferred_scheduled, 1);

        sleep(ms(50)).await;
        let records = sink.records();
        assert_eq!(records.len(), 2);

        let first: Record = [
            ("heading".to_string(), FieldValue::Int(10)),
            (FIELD_THROTTLE_MS.to_string(), FieldValue::Int(100)),
        ]
        .into_iter()
        .collect();
        assert_eq!(records[0], first);

        let second: Record = [
            ("heading".to_string(), FieldValue::Int(12)),
            ("lat".to_string(), FieldValue::Float(1.0)),
            (FIELD_THROTTLE_MS.to_string(), FieldValue::Int(100)),
        ]
        .into_iter()
        .collect();
        assert_eq!(records[1], second);

        let times = sink.times();
        assert_eq!(times[0], t0);
        assert_eq!(times[1] - t0, ms(100));
        assert_eq!(throttler.state(), ThrottlerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_flush_when_interval_elapsed() {
        let sink = Arc::new(RecordingSink::default());
        let throttler = throttler_with(Arc::clone(&sink));

        throttler.push(Fragment::new().with("a", 1i64));
        sleep(ms(150)).await;
        throttler.push(Fragment::new().with("a", 2i64));

        // Synchronous within the push call
        assert_eq!(sink.records().len(), 2);
        assert!(!throttler.has_scheduled_emission());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_bound_under_continuous_push() {
        let sink = Arc::new(RecordingSink::default());
        let throttler = throttler_with(Arc::clone(&sink));

        for i in 0..200i64 {
            throttler.push(Fragment::new().with("seq", i));
            assert!(throttler.has_scheduled_emission() || throttler.pending_len() == 0);
            sleep(ms(7)).await;
        }
        sleep(ms(200)).await;

        let times = sink.times();
        assert!(times.len() > 10);
        for pair in times.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap >= ms(100), "gap {gap:?} below interval");
            assert!(gap < ms(108), "gap {gap:?} above interval + one push spacing");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_coalescing_last_write_wins_random() {
        let sink = Arc::new(RecordingSink::default());
        let throttler = throttler_with(Arc::clone(&sink));
        throttler.push(Fragment::new().with("warmup", true));

        let mut rng = rand::rng();
        let names = ["heading", "pitch", "roll", "lat", "lon"];
        let mut expected: HashMap<&str, i64> = HashMap::new();

        for _ in 0..40 {
            let mut fragment = Fragment::new();
            for name in names {
                if rng.random_bool(0.4) {
                    let value: i64 = rng.random_range(0..1000);
                    fragment.insert(name, value);
                    expected.insert(name, value);
                }
            }
            throttler.push(fragment);
        }
        sleep(ms(150)).await;

        let records = sink.records();
        assert_eq!(records.len(), 2);
        for (name, value) in expected {
            assert_eq!(records[1].get(name), Some(&FieldValue::Int(value)), "{name}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_timer_outstanding() {
        let sink = Arc::new(RecordingSink::default());
        let throttler = throttler_with(Arc::clone(&sink));
        throttler.push(Fragment::new().with("a", 0i64));

        for i in 0..20i64 {
            throttler.push(Fragment::new().with("a", i));
        }
        assert_eq!(throttler.metrics().snapshot().deferred_scheduled, 1);

        sleep(ms(101)).await;
        assert_eq!(sink.records().len(), 2);
        assert!(!throttler.has_scheduled_emission());
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_emit_cancels_stale_timer() {
        let sink = Arc::new(RecordingSink::default());
        let throttler = throttler_with(Arc::clone(&sink));
        let t0 = Instant::now();

        throttler.push(Fragment::new().with("a", 1i64));
        sleep(ms(50)).await;
        throttler.push(Fragment::new().with("a", 2i64)); // timer for t0+100

        // Explicit timestamp past the interval emits immediately
        throttler.push_at(Fragment::new().with("a", 3i64), t0 + ms(120));
        assert_eq!(sink.records().len(), 2);
        assert!(!throttler.has_scheduled_emission());

        sleep(ms(60)).await;
        assert_eq!(sink.records().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_static_mode_uses_low_interval() {
        let sink = Arc::new(RecordingSink::default());
        let throttler = throttler_with(Arc::clone(&sink));
        throttler.set_mode(RateMode::Static);
        assert_eq!(throttler.current_interval(), ms(1000));

        throttler.push(Fragment::new().with("a", 1i64));
        assert_eq!(
            sink.records()[0].get(FIELD_THROTTLE_MS),
            Some(&FieldValue::Int(1000))
        );

        sleep(ms(100)).await;
        throttler.push(Fragment::new().with("a", 2i64));
        sleep(ms(500)).await;
        assert_eq!(sink.records().len(), 1);
        sleep(ms(401)).await;
        assert_eq!(sink.records().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_rate_indicator_not_overwritten() {
        let sink = Arc::new(RecordingSink::default());
        let throttler = throttler_with(Arc::clone(&sink));
        throttler.push(Fragment::new().with(FIELD_THROTTLE_MS, 1000i64));
        assert_eq!(
            sink.records()[0].get(FIELD_THROTTLE_MS),
            Some(&FieldValue::Int(1000))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_flush_is_noop() {
        let sink = Arc::new(RecordingSink::default());
        let throttler = throttler_with(Arc::clone(&sink));

        throttler.push(Fragment::new().with("a", 1i64));
        let last = throttler.last_emit();
        sleep(ms(30)).await;

        throttler.flush();
        assert_eq!(sink.records().len(), 1);
        assert_eq!(throttler.last_emit(), last);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_flush_emits_pending() {
        let sink = Arc::new(RecordingSink::default());
        let throttler = throttler_with(Arc::clone(&sink));

        throttler.push(Fragment::new().with("a", 1i64));
        sleep(ms(10)).await;
        throttler.push(Fragment::new().with("b", 2i64));
        throttler.flush();

        assert_eq!(sink.records().len(), 2);
        assert!(!throttler.has_scheduled_emission());
        sleep(ms(200)).await;
        assert_eq!(sink.records().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_discards_and_ignores() {
        let sink = Arc::new(RecordingSink::default());
        let throttler = throttler_with(Arc::clone(&sink));

        throttler.push(Fragment::new().with("a", 1i64));
        sleep(ms(10)).await;
        throttler.push(Fragment::new().with("a", 2i64));
        throttler.dispose();
        throttler.dispose();

        assert_eq!(throttler.state(), ThrottlerState::Disposed);
        assert_eq!(throttler.pending_len(), 0);

        throttler.push(Fragment::new().with("a", 3i64));
        throttler.flush();
        sleep(ms(500)).await;

        assert_eq!(sink.records().len(), 1);
        assert!(!throttler.has_scheduled_emission());
        assert_eq!(throttler.metrics().snapshot().rejected_after_dispose, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_after_dispose_is_noop() {
        let sink = Arc::new(RecordingSink::default());
        let throttler = throttler_with(Arc::clone(&sink));
        throttler.push(Fragment::new().with("a", 1i64));
        throttler.push(Fragment::new().with("a", 2i64));
        throttler.dispose();

        // A timer that escaped cancellation
        throttler.inner.flush_scheduled(0);
        assert_eq!(sink.records().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sink_failure_is_swallowed() {
        let sink = Arc::new(RecordingSink {
            fail: true,
            ..Default::default()
        });
        let throttler = throttler_with(Arc::clone(&sink));

        throttler.push(Fragment::new().with("a", 1i64));
        sleep(ms(150)).await;
        throttler.push(Fragment::new().with("a", 2i64));

        let snapshot = throttler.metrics().snapshot();
        assert_eq!(snapshot.emit_failures, 2);
        assert_eq!(snapshot.records_emitted, 0);
        // Lost flushes are not retried
        assert_eq!(throttler.pending_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_absent_sink_counts_drop() {
        let sink = Arc::new(RecordingSink {
            absent: true,
            ..Default::default()
        });
        let throttler = throttler_with(Arc::clone(&sink));
        throttler.push(Fragment::new().with("a", 1i64));

        let snapshot = throttler.metrics().snapshot();
        assert_eq!(snapshot.emissions_dropped, 1);
        assert_eq!(snapshot.emit_failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_throttler_has_no_indicator() {
        let sink = Arc::new(RecordingSink::default());
        let throttler = CoalescingThrottler::fixed(
            "fixed",
            ms(250),
            Arc::clone(&sink) as Arc<dyn RecordSink>,
            TokioScheduler::current().unwrap(),
        );
        throttler.set_mode(RateMode::Static);
        assert_eq!(throttler.current_interval(), ms(250));

        throttler.push(Fragment::new().with("a", 1i64));
        assert!(!sink.records()[0].contains_key(FIELD_THROTTLE_MS));

        // Empty fragments on an empty buffer never emit
        sleep(ms(300)).await;
        throttler.push(Fragment::new());
        assert_eq!(sink.records().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_producers() {
        let sink = Arc::new(RecordingSink::default());
        let throttler = CoalescingThrottler::new(
            CoalescerConfig {
                active_interval: ms(5),
                ..adaptive_config()
            },
            Arc::clone(&sink) as Arc<dyn RecordSink>,
            TokioScheduler::current().unwrap(),
        );

        let mut handles = Vec::new();
        for producer in 0..4i64 {
            let throttler = throttler.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..250i64 {
                    throttler.push(Fragment::new().with(format!("p{producer}"), i));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        tokio::time::sleep(ms(50)).await;

        assert_eq!(throttler.metrics().snapshot().fragments_received, 1000);
        let merged: Record = sink.records().into_iter().flatten().collect();
        for producer in 0..4 {
            assert!(merged.contains_key(&format!("p{producer}")));
        }
        assert!(!throttler.has_scheduled_emission());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fragment_for_other_mode_is_dropped() {
        let sink = Arc::new(RecordingSink::default());
        let throttler = throttler_with(Arc::clone(&sink));
        throttler.set_mode(RateMode::Static);

        let now = Instant::now();
        throttler.push_for_mode_at(Fragment::new().with("m", "active"), RateMode::Active, now);
        assert_eq!(throttler.pending_len(), 0);
        assert!(sink.records().is_empty());

        throttler.push_for_mode_at(Fragment::new().with("m", "static"), RateMode::Static, now);
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get(FIELD_THROTTLE_MS), Some(&FieldValue::Int(1000)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sink_may_dispose_from_deferred_emit() {
        struct StopSink {
            inner: RecordingSink,
            throttler: std::sync::OnceLock<CoalescingThrottler>,
        }

        impl RecordSink for StopSink {
            fn name(&self) -> &str {
                "stop"
            }

            fn emit(&self, record: Record) -> Result<(), ContractError> {
                let stop = record.contains_key("stop");
                self.inner.emit(record)?;
                if let Some(throttler) = self.throttler.get().filter(|_| stop) {
                    throttler.dispose();
                }
                Ok(())
            }
        }

        let sink = Arc::new(StopSink {
            inner: RecordingSink::default(),
            throttler: std::sync::OnceLock::new(),
        });
        let throttler = CoalescingThrottler::new(
            adaptive_config(),
            Arc::clone(&sink) as Arc<dyn RecordSink>,
            TokioScheduler::current().unwrap(),
        );
        assert!(sink.throttler.set(throttler.clone()).is_ok());

        throttler.push(Fragment::new().with("a", 1i64));
        sleep(ms(10)).await;
        throttler.push(Fragment::new().with("stop", true));
        assert!(throttler.has_scheduled_emission());

        sleep(ms(100)).await;
        assert!(throttler.is_disposed());
        assert_eq!(sink.inner.records().len(), 2);
    }
}
