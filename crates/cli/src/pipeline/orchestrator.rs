//! Pipeline orchestrator - coordinates all components.
//!
//! mock source -> session (throttler) -> stats tap -> dispatcher -> sinks

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{ModeObserver, RateMode, RecordSink, StreamBlueprint};
use ingestion::{MockSensorConfig, MockSensorSource, MotionProfile, SensorEvent, SensorStreamSession};
use observability::{
    record_provider_disabled, record_sensor_event, record_session_started,
    record_session_stopped, EmissionStatsAggregator,
};
use tracing::{info, warn};

use super::{PipelineStats, StatsTap};
use crate::error::CliError;

const STREAM_NAME: &str = "device";
const DISPATCHER_NAME: &str = "geo_throttle";

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Effective configuration (CLI overrides applied)
    pub blueprint: StreamBlueprint,

    /// Run time (None = until shutdown)
    pub duration: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,

    /// Simulated device seed
    pub seed: Option<u64>,

    /// Simulated moving/still script
    pub profile: MotionProfile,

    /// Sensor event channel capacity
    pub buffer_size: usize,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until the duration elapses, the source ends, or `shutdown` resolves
    ///
    /// Always cancels the session and drains the sinks before returning.
    pub async fn run<F>(self, shutdown: F) -> Result<PipelineStats>
    where
        F: Future<Output = ()>,
    {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        // Dispatcher
        if blueprint.sinks.is_empty() {
            warn!("No sinks configured - emitted records will be dropped");
        }
        let dispatcher = Arc::new(
            dispatcher::create_dispatcher(DISPATCHER_NAME, blueprint.sinks.clone())
                .await
                .map_err(|e| CliError::pipeline_execution(format!("dispatcher setup: {e}")))?,
        );
        info!(sinks = dispatcher.sink_count(), "Dispatcher started");

        // Session
        let stream = blueprint.stream;
        let aggregator = if stream.adaptive_throttling {
            EmissionStatsAggregator::new()
        } else {
            EmissionStatsAggregator::with_initial_label("fixed")
        };
        let tap = Arc::new(StatsTap::new(
            Arc::clone(&dispatcher) as Arc<dyn RecordSink>,
            aggregator,
        ));
        let observer: ModeObserver =
            Arc::new(|mode: RateMode| info!(mode = %mode, "Rate mode changed"));
        let session = SensorStreamSession::builder(stream, Arc::clone(&tap) as Arc<dyn RecordSink>)
            .name(STREAM_NAME)
            .observer(observer)
            .build()
            .context("Failed to create sensor stream session")?;
        record_session_started(session.name(), session.is_adaptive());

        // Simulated device sampled at the session's recommended cadence
        let sampling = session.sampling_profile();
        let source = MockSensorSource::new(MockSensorConfig {
            orientation_hz: 1.0 / sampling.orientation_interval.as_secs_f64(),
            acceleration_hz: 1.0 / sampling.motion_interval.as_secs_f64(),
            profile: self.config.profile.clone(),
            seed: self.config.seed,
            ..Default::default()
        });
        let mut rx = source
            .start(self.config.buffer_size)
            .context("Failed to start mock sensor source")?;

        info!(
            adaptive = session.is_adaptive(),
            interval_ms = session.current_interval().as_millis() as u64,
            orientation_interval_ms = sampling.orientation_interval.as_millis() as u64,
            location_accuracy = ?sampling.location_accuracy,
            duration = ?self.config.duration,
            "Pipeline running"
        );
        session.start(Some(source.last_known_location()));

        let deadline = async {
            match self.config.duration {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(deadline);
        tokio::pin!(shutdown);

        let mut events_received = 0u64;
        loop {
            tokio::select! {
                event = rx.recv() => {
                    let Some(event) = event else {
                        warn!("Sensor source ended");
                        break;
                    };
                    record_sensor_event(event.kind());
                    if let SensorEvent::ProviderDisabled(provider) = &event {
                        record_provider_disabled(provider);
                    }
                    session.handle_event(event);
                    events_received += 1;
                }
                _ = &mut deadline => {
                    info!("Run duration reached");
                    break;
                }
                _ = &mut shutdown => {
                    warn!("Received shutdown signal, stopping pipeline...");
                    break;
                }
            }
        }

        // Shutdown
        info!("Shutting down pipeline...");
        source.stop();
        let final_interval = session.current_interval();
        session.cancel();
        record_session_stopped(session.name());
        let sinks = dispatcher.shutdown().await;

        let stats = PipelineStats {
            events_received,
            duration: start_time.elapsed(),
            adaptive: session.is_adaptive(),
            final_interval,
            session: session.metrics().snapshot(),
            throttle: session.throttle_metrics(),
            emissions: tap.summary(),
            sinks,
        };

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            records = stats.throttle.records_emitted,
            "Pipeline shutdown complete"
        );
        Ok(stats)
    }
}
