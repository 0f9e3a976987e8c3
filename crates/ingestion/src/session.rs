//! Sensor stream session.
//!
//! One session per subscription: decodes platform callbacks into
//! fragments and routes them through a fixed or adaptive throttler into
//! the output sink. After `cancel` every callback is a no-op.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use contracts::{
    Fragment, ModeObserver, RateMode, RecordSink, StreamConfig, DEFAULT_HIGH_FREQUENCY_MS,
};
use throttle_engine::{
    AdaptiveThrottler, CoalescingThrottler, ThrottleMetricsSnapshot, TokioScheduler,
};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, trace, warn};

use crate::adapter::{decode, SampleAdapter};
use crate::adapters::{AccelerationSample, LocationSample, MagnetometerAccuracy, OrientationSample};
use crate::config::{SamplingProfile, SessionMetrics};
use crate::error::{IngestionError, Result};
use crate::event::SensorEvent;

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

enum SessionThrottler {
    Adaptive(AdaptiveThrottler),
    Fixed(CoalescingThrottler),
}

impl SessionThrottler {
    fn push(&self, fragment: Fragment) {
        match self {
            Self::Adaptive(t) => t.push(fragment),
            Self::Fixed(t) => t.push(fragment),
        }
    }

    fn dispose(&self) {
        match self {
            Self::Adaptive(t) => t.dispose(),
            Self::Fixed(t) => t.dispose(),
        }
    }

    fn current_interval(&self) -> Duration {
        match self {
            Self::Adaptive(t) => t.current_interval(),
            Self::Fixed(t) => t.current_interval(),
        }
    }

    fn metrics(&self) -> ThrottleMetricsSnapshot {
        match self {
            Self::Adaptive(t) => t.metrics().snapshot(),
            Self::Fixed(t) => t.metrics().snapshot(),
        }
    }
}

/// Builder for [`SensorStreamSession`]
pub struct SessionBuilder {
    name: String,
    config: StreamConfig,
    sink: Arc<dyn RecordSink>,
    observer: Option<ModeObserver>,
    scheduler: Option<TokioScheduler>,
}

impl SessionBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Mode observer (adaptive sessions only)
    pub fn observer(mut self, observer: ModeObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn scheduler(mut self, scheduler: TokioScheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Build the session and its throttler
    ///
    /// # Errors
    /// Returns [`IngestionError::ThrottlerSetup`] outside a Tokio runtime
    pub fn build(self) -> Result<SensorStreamSession> {
        let setup_err = |source| IngestionError::ThrottlerSetup {
            stream: self.name.clone(),
            source,
        };
        let scheduler = match self.scheduler.clone() {
            Some(scheduler) => scheduler,
            None => TokioScheduler::current().map_err(setup_err)?,
        };

        let throttler = if self.config.adaptive_throttling {
            let mut builder = AdaptiveThrottler::builder(
                self.config.to_throttle_config(),
                Arc::clone(&self.sink),
            )
            .label(self.name.clone())
            .scheduler(scheduler);
            if let Some(observer) = self.observer.clone() {
                builder = builder.observer(observer);
            }
            SessionThrottler::Adaptive(builder.build().map_err(setup_err)?)
        } else {
            let throttle_ms = if self.config.throttle_ms == 0 {
                warn!(
                    stream = %self.name,
                    "throttle_ms must be > 0, using {DEFAULT_HIGH_FREQUENCY_MS}"
                );
                DEFAULT_HIGH_FREQUENCY_MS
            } else {
                self.config.throttle_ms
            };
            SessionThrottler::Fixed(CoalescingThrottler::fixed(
                self.name.clone(),
                Duration::from_millis(throttle_ms),
                Arc::clone(&self.sink),
                scheduler,
            ))
        };

        Ok(SensorStreamSession {
            name: self.name,
            config: self.config,
            throttler,
            magnetometer_accuracy: Mutex::new(None),
            started: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            metrics: Arc::new(SessionMetrics::new()),
        })
    }
}

/// A throttled sensor subscription
pub struct SensorStreamSession {
    name: String,
    config: StreamConfig,
    throttler: SessionThrottler,
    magnetometer_accuracy: Mutex<Option<MagnetometerAccuracy>>,
    started: AtomicBool,
    cancelled: AtomicBool,
    metrics: Arc<SessionMetrics>,
}

impl SensorStreamSession {
    pub fn builder(config: StreamConfig, sink: Arc<dyn RecordSink>) -> SessionBuilder {
        SessionBuilder {
            name: "stream".to_string(),
            config,
            sink,
            observer: None,
            scheduler: None,
        }
    }

    /// Session on the current runtime with default name and no observer
    ///
    /// # Errors
    /// Returns [`IngestionError::ThrottlerSetup`] outside a Tokio runtime
    pub fn new(config: StreamConfig, sink: Arc<dyn RecordSink>) -> Result<Self> {
        Self::builder(config, sink).build()
    }

    /// Begin streaming; pushes the last known location right away
    #[instrument(name = "session_start", skip(self, last_known), fields(stream = %self.name))]
    pub fn start(&self, last_known: Option<LocationSample>) {
        if self.is_cancelled() {
            self.metrics.record_ignored();
            return;
        }
        if self.started.swap(true, Ordering::SeqCst) {
            debug!(stream = %self.name, "session already started");
            return;
        }

        info!(
            stream = %self.name,
            adaptive = self.config.adaptive_throttling,
            low_power_mode = self.config.low_power_mode,
            interval_ms = self.throttler.current_interval().as_millis() as u64,
            "sensor stream started"
        );

        match last_known {
            Some(location) => self.on_location(location),
            None => debug!(stream = %self.name, "no last known location"),
        }
    }

    /// Orientation callback
    pub fn on_orientation(&self, sample: OrientationSample) {
        if self.ignore_after_cancel() {
            return;
        }
        let sample = match sample.accuracy {
            Some(_) => sample,
            None => sample.with_accuracy(self.latest_accuracy()),
        };
        if self.push_sample(&sample) {
            self.metrics.record_orientation();
        }
    }

    /// Magnetometer calibration callback (0=unreliable .. 3=high)
    pub fn on_magnetometer_accuracy(&self, level: i64) {
        if self.ignore_after_cancel() {
            return;
        }
        match MagnetometerAccuracy::from_level(level) {
            Some(accuracy) => {
                *self
                    .magnetometer_accuracy
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(accuracy);
                debug!(stream = %self.name, ?accuracy, "magnetometer accuracy updated");
            }
            None => {
                self.metrics.record_invalid();
                debug!(stream = %self.name, level, "unknown magnetometer accuracy level ignored");
            }
        }
    }

    /// Location callback
    pub fn on_location(&self, sample: LocationSample) {
        if self.ignore_after_cancel() {
            return;
        }
        if self.push_sample(&sample) {
            self.metrics.record_location();
        }
    }

    /// Linear-acceleration callback; drives the classifier in adaptive mode
    pub fn on_acceleration(&self, x: f64, y: f64, z: f64) {
        if self.ignore_after_cancel() {
            return;
        }
        let sample = AccelerationSample::new(x, y, z);
        if !sample.is_valid() {
            self.metrics.record_invalid();
            return;
        }

        match &self.throttler {
            SessionThrottler::Adaptive(throttler) => {
                self.metrics.record_motion();
                throttler.observe(sample.magnitude());
            }
            SessionThrottler::Fixed(_) => {
                trace!(stream = %self.name, "acceleration ignored by fixed-rate stream");
            }
        }
    }

    /// Location provider became unavailable
    pub fn on_provider_disabled(&self, provider: &str) {
        if self.ignore_after_cancel() {
            return;
        }
        self.metrics.record_provider_error();
        warn!(stream = %self.name, provider, "location provider disabled");
    }

    /// Route one event to its callback
    pub fn handle_event(&self, event: SensorEvent) {
        match event {
            SensorEvent::Orientation(sample) => self.on_orientation(sample),
            SensorEvent::MagnetometerAccuracy(level) => self.on_magnetometer_accuracy(level),
            SensorEvent::Location(sample) => self.on_location(sample),
            SensorEvent::Acceleration(s) => self.on_acceleration(s.x, s.y, s.z),
            SensorEvent::ProviderDisabled(provider) => self.on_provider_disabled(&provider),
        }
    }

    /// Consume events until the channel closes or the session is cancelled
    ///
    /// Returns the number of events handled.
    pub async fn drive(&self, mut rx: mpsc::Receiver<SensorEvent>) -> u64 {
        let mut handled = 0u64;
        while let Some(event) = rx.recv().await {
            if self.is_cancelled() {
                break;
            }
            trace!(stream = %self.name, kind = event.kind(), "sensor event");
            self.handle_event(event);
            handled += 1;
        }
        debug!(stream = %self.name, handled, "event stream finished");
        handled
    }

    /// Dispose the throttler; later callbacks are no-ops. Idempotent.
    #[instrument(name = "session_cancel", skip(self), fields(stream = %self.name))]
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        self.throttler.dispose();
        info!(stream = %self.name, "sensor stream cancelled");
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Recommended platform sampling for this stream's power mode
    pub fn sampling_profile(&self) -> SamplingProfile {
        SamplingProfile::for_power_mode(self.config.low_power_mode)
    }

    pub fn is_adaptive(&self) -> bool {
        matches!(self.throttler, SessionThrottler::Adaptive(_))
    }

    /// Current rate mode (`None` for fixed-rate streams)
    pub fn mode(&self) -> Option<RateMode> {
        match &self.throttler {
            SessionThrottler::Adaptive(t) => Some(t.mode()),
            SessionThrottler::Fixed(_) => None,
        }
    }

    pub fn current_interval(&self) -> Duration {
        self.throttler.current_interval()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<SessionMetrics> {
        &self.metrics
    }

    pub fn throttle_metrics(&self) -> ThrottleMetricsSnapshot {
        self.throttler.metrics()
    }

    fn latest_accuracy(&self) -> Option<MagnetometerAccuracy> {
        *self
            .magnetometer_accuracy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn ignore_after_cancel(&self) -> bool {
        let cancelled = self.is_cancelled();
        if cancelled {
            self.metrics.record_ignored();
        }
        cancelled
    }

    fn push_sample<A: SampleAdapter>(&self, sample: &A) -> bool {
        match decode(sample, now_ms()) {
            Some(fragment) => {
                self.throttler.push(fragment);
                true
            }
            None => {
                self.metrics.record_invalid();
                debug!(stream = %self.name, kind = sample.kind().as_str(), "invalid sample dropped");
                false
            }
        }
    }
}

impl Drop for SensorStreamSession {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for SensorStreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorStreamSession")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}
