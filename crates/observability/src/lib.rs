//! # Observability
//!
//! Tracing + Prometheus metrics for the throttling pipeline.
//!
//! ## Features
//!
//! - Tracing initialisation (JSON/Pretty/Compact)
//! - Prometheus metrics export
//! - Emission statistics over the records a stream produced
//!
//! ## Example
//!
//! ```ignore
//! use observability::{EmissionStatsAggregator, ObservabilityConfig};
//!
//! observability::init_with_config(ObservabilityConfig::default())?;
//!
//! let mut stats = EmissionStatsAggregator::new();
//! stats.update(&record, elapsed_ms);
//! println!("{}", stats.summary());
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use crate::metrics::{
    record_provider_disabled, record_sensor_event, record_session_started,
    record_session_stopped, EmissionStatsAggregator, EmissionSummary, RunningStats, StatsSummary,
};

/// Initialise tracing and the Prometheus exporter with defaults
///
/// - Tracing: JSON, honours `RUST_LOG`
/// - Prometheus: listens on 0.0.0.0:9000
pub fn init() -> Result<()> {
    init_with_config(ObservabilityConfig::default())
}

/// Observability settings
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,
    /// Prometheus port (None = disabled)
    pub metrics_port: Option<u16>,
    /// Filter used when `RUST_LOG` is unset
    pub default_log_level: String,
    /// Whether `RUST_LOG` may replace `default_log_level`
    pub env_override: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Json,
            metrics_port: Some(9000),
            default_log_level: "info".to_string(),
            env_override: true,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Structured JSON lines
    #[default]
    Json,
    /// Multi-line human readable
    Pretty,
    /// Single-line human readable
    Compact,
}

/// Initialise with explicit settings
///
/// # Errors
/// A global subscriber or metrics recorder is already installed, or the
/// exporter cannot bind its port.
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    let filter = if config.env_override {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.default_log_level))
    } else {
        EnvFilter::new(&config.default_log_level)
    };

    match config.log_format {
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
                .context("Failed to initialize tracing subscriber")?;
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().pretty())
                .try_init()
                .context("Failed to initialize tracing subscriber")?;
        }
        LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact())
                .try_init()
                .context("Failed to initialize tracing subscriber")?;
        }
    }

    if let Some(port) = config.metrics_port {
        init_metrics_only(port)?;
    }

    tracing::info!(
        log_format = ?config.log_format,
        metrics_port = ?config.metrics_port,
        "Observability initialized"
    );

    Ok(())
}

/// Install only the Prometheus exporter
///
/// For callers that set up tracing themselves.
pub fn init_metrics_only(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus recorder")?;

    tracing::info!(port = port, "Prometheus metrics endpoint initialized");
    Ok(())
}
