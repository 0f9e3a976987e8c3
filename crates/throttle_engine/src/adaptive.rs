//! Adaptive throttler.
//!
//! Couples a [`MotionClassifier`] to a [`CoalescingThrottler`]: motion
//! samples drive the rate mode, data fragments go through the coalescing
//! path, and every mode flip produces a synthetic mode-change fragment.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use contracts::{
    Fragment, ModeObserver, ModeTransition, RateMode, RecordSink, ThrottleConfig,
    FIELD_MODE_CHANGE, FIELD_THROTTLE_MS,
};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::classifier::{MotionClassifier, TransitionCallback};
use crate::coalescer::{interval_ms, CoalescerConfig, CoalescingThrottler, ThrottlerState};
use crate::error::EngineError;
use crate::metrics::ThrottleMetrics;
use crate::scheduler::TokioScheduler;

/// Builder for [`AdaptiveThrottler`]
pub struct AdaptiveThrottlerBuilder {
    config: ThrottleConfig,
    sink: Arc<dyn RecordSink>,
    observer: Option<ModeObserver>,
    scheduler: Option<TokioScheduler>,
    label: String,
}

impl AdaptiveThrottlerBuilder {
    /// Notify `observer` synchronously on every mode transition
    pub fn observer(mut self, observer: ModeObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Drive timers on an explicit scheduler instead of the current runtime
    pub fn scheduler(mut self, scheduler: TokioScheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Label used in logs and metrics
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Build the throttler
    ///
    /// Invalid configuration values are replaced by defaults with a warning.
    ///
    /// # Errors
    /// Returns [`EngineError::NoRuntime`] when no scheduler was given and
    /// the caller is outside a Tokio runtime
    pub fn build(self) -> Result<AdaptiveThrottler, EngineError> {
        let scheduler = match self.scheduler {
            Some(scheduler) => scheduler,
            None => TokioScheduler::current()?,
        };

        let (config, warnings) = self.config.sanitized();
        for warning in &warnings {
            warn!(label = %self.label, field = %warning.field, "{}", warning.message);
        }

        let coalescer = CoalescingThrottler::new(
            CoalescerConfig {
                label: self.label.clone(),
                active_interval: config.interval_for(RateMode::Active),
                static_interval: config.interval_for(RateMode::Static),
                inject_rate_indicator: true,
            },
            self.sink,
            scheduler.clone(),
        );

        let observer = self.observer;
        let label = self.label;
        let inner = Arc::new_cyclic(|weak: &Weak<AdaptiveInner>| {
            let weak = weak.clone();
            let on_deferred: TransitionCallback = Arc::new(move |transition| {
                if let Some(inner) = weak.upgrade() {
                    inner.apply_transition(transition, Instant::now());
                }
            });
            let classifier = MotionClassifier::new(
                config.static_threshold,
                config.static_duration(),
                scheduler,
                on_deferred,
            );

            AdaptiveInner {
                label,
                config,
                coalescer,
                classifier,
                observer,
                last_applied: Mutex::new(0),
            }
        });

        metrics::gauge!("geo_throttle_current_interval_ms")
            .set(config.high_frequency_ms as f64);
        info!(
            label = %inner.label,
            high_frequency_ms = config.high_frequency_ms,
            low_frequency_ms = config.low_frequency_ms,
            static_threshold = config.static_threshold,
            static_duration_ms = config.static_duration_ms,
            "adaptive throttler created"
        );

        Ok(AdaptiveThrottler { inner })
    }
}

struct AdaptiveInner {
    label: String,
    config: ThrottleConfig,
    coalescer: CoalescingThrottler,
    classifier: MotionClassifier,
    observer: Option<ModeObserver>,
    /// Sequence of the last applied transition
    last_applied: Mutex<u64>,
}

impl AdaptiveInner {
    fn lock_transitions(&self) -> MutexGuard<'_, u64> {
        self.last_applied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, sequence: u64) -> bool {
        *self.lock_transitions() == sequence
    }

    /// Switch mode, notify the observer, then push the mode-change fragment
    ///
    /// Only the sequence check and the mode switch run under the
    /// transition lock; the observer and the sink may call back into the
    /// throttler. A transition superseded while its observer ran does not
    /// push its fragment.
    fn apply_transition(&self, transition: ModeTransition, now: Instant) {
        let sequence = transition.sequence;
        let mode = transition.to;
        {
            let mut last_applied = self.lock_transitions();
            if self.coalescer.is_disposed() {
                return;
            }
            if sequence <= *last_applied {
                debug!(
                    label = %self.label,
                    sequence,
                    last_applied = *last_applied,
                    "superseded transition dropped"
                );
                return;
            }
            *last_applied = sequence;
            self.coalescer.set_mode(mode);
        }
        let interval = self.coalescer.interval_for(mode);

        self.coalescer.metrics().inc_mode_transitions();
        metrics::counter!("geo_throttle_mode_transitions_total", "mode" => mode.as_str())
            .increment(1);
        metrics::gauge!("geo_throttle_current_interval_ms").set(interval.as_secs_f64() * 1000.0);
        info!(
            label = %self.label,
            from = %transition.from,
            to = %mode,
            interval_ms = interval.as_millis() as u64,
            "rate mode changed"
        );

        if let Some(observer) = &self.observer {
            if !self.is_current(sequence) {
                return;
            }
            observer(mode);
        }

        if !self.is_current(sequence) {
            debug!(label = %self.label, sequence, "transition superseded during notification");
            return;
        }
        let fragment = Fragment::new()
            .with(FIELD_MODE_CHANGE, mode.as_str())
            .with(FIELD_THROTTLE_MS, interval_ms(interval))
            .with_timestamp(chrono::Utc::now().timestamp_millis());
        // Dropped by the coalescer if a newer transition switched mode meanwhile
        self.coalescer.push_for_mode_at(fragment, mode, now);
    }
}

/// Motion-aware coalescing throttler
///
/// Starts in [`RateMode::Active`]. Dropping the throttler disposes it.
pub struct AdaptiveThrottler {
    inner: Arc<AdaptiveInner>,
}

impl AdaptiveThrottler {
    /// Start building a throttler writing into `sink`
    pub fn builder(config: ThrottleConfig, sink: Arc<dyn RecordSink>) -> AdaptiveThrottlerBuilder {
        AdaptiveThrottlerBuilder {
            config,
            sink,
            observer: None,
            scheduler: None,
            label: "adaptive".to_string(),
        }
    }

    /// Throttler on the current runtime without an observer
    ///
    /// # Errors
    /// Returns [`EngineError::NoRuntime`] outside a Tokio runtime
    pub fn new(config: ThrottleConfig, sink: Arc<dyn RecordSink>) -> Result<Self, EngineError> {
        Self::builder(config, sink).build()
    }

    /// Feed one acceleration-magnitude sample stamped with the current time
    pub fn observe(&self, magnitude: f64) {
        self.observe_at(magnitude, Instant::now());
    }

    /// Feed one acceleration-magnitude sample
    #[instrument(level = "trace", name = "adaptive_observe", skip(self, now), fields(label = %self.inner.label))]
    pub fn observe_at(&self, magnitude: f64, now: Instant) {
        if let Some(transition) = self.inner.classifier.classify(magnitude, now) {
            self.inner.apply_transition(transition, now);
        }
    }

    /// Push a data fragment through the coalescing path
    pub fn push(&self, fragment: Fragment) {
        self.inner.coalescer.push(fragment);
    }

    pub fn push_at(&self, fragment: Fragment, now: Instant) {
        self.inner.coalescer.push_at(fragment, now);
    }

    /// Emit pending data now
    pub fn flush(&self) {
        self.inner.coalescer.flush();
    }

    /// Stop both timers and discard buffered data. Idempotent.
    ///
    /// Safe to call from the sink or the observer.
    pub fn dispose(&self) {
        self.inner.classifier.dispose();
        self.inner.coalescer.dispose();
    }

    pub fn mode(&self) -> RateMode {
        self.inner.coalescer.mode()
    }

    pub fn current_interval(&self) -> Duration {
        self.inner.coalescer.current_interval()
    }

    pub fn state(&self) -> ThrottlerState {
        self.inner.coalescer.state()
    }

    pub fn has_scheduled_emission(&self) -> bool {
        self.inner.coalescer.has_scheduled_emission()
    }

    pub fn has_pending_static_check(&self) -> bool {
        self.inner.classifier.has_pending_check()
    }

    pub fn pending_len(&self) -> usize {
        self.inner.coalescer.pending_len()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.coalescer.is_disposed()
    }

    /// Effective (sanitized) configuration
    pub fn config(&self) -> &ThrottleConfig {
        &self.inner.config
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn metrics(&self) -> &Arc<ThrottleMetrics> {
        self.inner.coalescer.metrics()
    }
}

impl Drop for AdaptiveThrottler {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for AdaptiveThrottler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptiveThrottler")
            .field("label", &self.inner.label)
            .field("config", &self.inner.config)
            .field("mode", &self.mode())
            .finish_non_exhaustive()
    }
}
