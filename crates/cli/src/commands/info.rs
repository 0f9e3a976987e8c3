//! `info` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::{StreamBlueprint, StreamConfig};
use ingestion::SamplingProfile;

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Effective configuration for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    stream: StreamConfig,
    sampling: SamplingInfo,
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct SamplingInfo {
    orientation_interval_ms: u64,
    motion_interval_ms: u64,
    location_accuracy: String,
    location_distance_filter_m: f64,
}

impl From<SamplingProfile> for SamplingInfo {
    fn from(profile: SamplingProfile) -> Self {
        Self {
            orientation_interval_ms: profile.orientation_interval.as_millis() as u64,
            motion_interval_ms: profile.motion_interval.as_millis() as u64,
            location_accuracy: format!("{:?}", profile.location_accuracy),
            location_distance_filter_m: profile.location_distance_filter_m,
        }
    }
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    queue_capacity: usize,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let loaded = config_loader::ConfigLoader::load_from_path(&args.config)
        .map_err(|e| CliError::config_load(args.config.display().to_string(), e))?;

    if args.json {
        let info = build_config_info(&loaded.blueprint);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&loaded.blueprint);
    }

    Ok(())
}

fn build_config_info(blueprint: &StreamBlueprint) -> ConfigInfo {
    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        stream: blueprint.stream,
        sampling: SamplingProfile::for_power_mode(blueprint.stream.low_power_mode).into(),
        sinks: blueprint
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type),
                queue_capacity: s.queue_capacity,
            })
            .collect(),
    }
}

fn print_config_info(blueprint: &StreamBlueprint) {
    let stream = &blueprint.stream;
    println!("=== geo-throttle Configuration ===\n");

    println!("Stream");
    println!("   Version: {:?}", blueprint.version);
    if stream.adaptive_throttling {
        println!("   Mode: adaptive");
        println!("   Active interval: {} ms", stream.throttle_ms);
        println!("   Static interval: {} ms", stream.low_frequency_ms);
        println!("   Static threshold: {}", stream.static_threshold);
        println!("   Static after: {} ms", stream.static_duration_ms);
    } else {
        println!("   Mode: fixed");
        println!("   Interval: {} ms", stream.throttle_ms);
    }
    println!("   Low power: {}", stream.low_power_mode);

    let sampling = SamplingProfile::for_power_mode(stream.low_power_mode);
    println!("\nRecommended sampling");
    println!(
        "   Orientation: every {} ms",
        sampling.orientation_interval.as_millis()
    );
    println!("   Motion: every {} ms", sampling.motion_interval.as_millis());
    println!(
        "   Location: {:?}, {} m filter",
        sampling.location_accuracy, sampling.location_distance_filter_m
    );

    println!("\nSinks ({})", blueprint.sinks.len());
    for sink in &blueprint.sinks {
        println!(
            "   {} ({:?}, queue {})",
            sink.name, sink.sink_type, sink.queue_capacity
        );
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::SinkConfig;

    #[test]
    fn test_build_config_info() {
        let blueprint = StreamBlueprint {
            stream: StreamConfig {
                low_power_mode: true,
                ..Default::default()
            },
            sinks: vec![SinkConfig::log("log")],
            ..Default::default()
        };
        let info = build_config_info(&blueprint);
        assert_eq!(info.sampling.orientation_interval_ms, 200);
        assert_eq!(info.sinks[0].sink_type, "Log");

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["stream"]["low_power_mode"], true);
    }
}
