//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::info;

use contracts::StreamConfig;
use ingestion::MotionProfile;

use crate::cli::{RunArgs, StreamOverrides};
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let loaded = config_loader::ConfigLoader::load_from_path(&args.config)
        .map_err(|e| CliError::config_load(args.config.display().to_string(), e))?;
    for warning in &loaded.warnings {
        tracing::warn!(field = %warning.field, "{}", warning.message);
    }

    let mut blueprint = loaded.blueprint;
    apply_overrides(&mut blueprint.stream, &args.overrides);

    info!(
        adaptive = blueprint.stream.adaptive_throttling,
        throttle_ms = blueprint.stream.throttle_ms,
        low_frequency_ms = blueprint.stream.low_frequency_ms,
        low_power = blueprint.stream.low_power_mode,
        sinks = blueprint.sinks.len(),
        "Configuration loaded"
    );

    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        duration: (args.duration_secs > 0).then(|| Duration::from_secs(args.duration_secs)),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
        seed: args.seed,
        profile: MotionProfile::walk_and_stop(
            Duration::from_secs(args.moving_secs.max(1)),
            Duration::from_secs(args.still_secs.max(1)),
        ),
        buffer_size: args.buffer_size,
    });

    info!("Starting pipeline...");
    let stats = pipeline
        .run(shutdown_signal())
        .await
        .context("Pipeline execution failed")?;

    stats.print_summary();
    info!("geo-throttle finished");
    Ok(())
}

/// Apply CLI flags on top of the file's stream settings
pub fn apply_overrides(stream: &mut StreamConfig, overrides: &StreamOverrides) {
    if overrides.adaptive {
        stream.adaptive_throttling = true;
    }
    if overrides.fixed {
        stream.adaptive_throttling = false;
    }
    if let Some(ms) = overrides.throttle_ms.filter(|ms| *ms > 0) {
        stream.throttle_ms = ms;
    }
    if let Some(ms) = overrides.low_frequency_ms.filter(|ms| *ms > 0) {
        stream.low_frequency_ms = ms;
    }
    if overrides.low_power {
        stream.low_power_mode = true;
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_applied() {
        let mut stream = StreamConfig::default();
        let overrides = StreamOverrides {
            adaptive: true,
            throttle_ms: Some(50),
            low_frequency_ms: Some(0),
            low_power: true,
            ..Default::default()
        };
        apply_overrides(&mut stream, &overrides);

        assert!(stream.adaptive_throttling);
        assert!(stream.low_power_mode);
        assert_eq!(stream.throttle_ms, 50);
        assert_eq!(stream.low_frequency_ms, 1000);
    }

    #[test]
    fn test_fixed_override_disables_adaptive() {
        let mut stream = StreamConfig {
            adaptive_throttling: true,
            ..Default::default()
        };
        let overrides = StreamOverrides {
            fixed: true,
            ..Default::default()
        };
        apply_overrides(&mut stream, &overrides);
        assert!(!stream.adaptive_throttling);
    }

    #[test]
    fn test_no_overrides_keeps_file_values() {
        let original = StreamConfig {
            throttle_ms: 300,
            ..Default::default()
        };
        let mut stream = original;
        apply_overrides(&mut stream, &StreamOverrides::default());
        assert_eq!(stream, original);
    }
}
