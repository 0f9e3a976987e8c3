//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// geo-throttle - adaptive throttling of orientation and location streams
#[derive(Parser, Debug)]
#[command(
    name = "geo-throttle",
    author,
    version,
    about = "Adaptive sensor-event throttler",
    long_about = "Coalesces high-rate orientation and location updates into a bounded-rate\n\
                  record stream, slowing down automatically while the device is still.\n\n\
                  The `run` command drives a simulated device through a moving/still\n\
                  script and routes the throttled records to the configured sinks."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "GEO_THROTTLE_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "GEO_THROTTLE_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a simulated device through a throttled stream
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display the effective configuration
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "stream.toml", env = "GEO_THROTTLE_CONFIG")]
    pub config: PathBuf,

    /// Run time in seconds (0 = until Ctrl+C)
    #[arg(long, default_value = "30", env = "GEO_THROTTLE_DURATION_SECS")]
    pub duration_secs: u64,

    #[command(flatten)]
    pub overrides: StreamOverrides,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "GEO_THROTTLE_METRICS_PORT")]
    pub metrics_port: u16,

    /// RNG seed for a reproducible simulated device
    #[arg(long, env = "GEO_THROTTLE_SEED")]
    pub seed: Option<u64>,

    /// Seconds the simulated device moves per cycle
    #[arg(long, default_value = "5")]
    pub moving_secs: u64,

    /// Seconds the simulated device stays still per cycle
    #[arg(long, default_value = "5")]
    pub still_secs: u64,

    /// Sensor event channel capacity
    #[arg(long, default_value = "256", env = "GEO_THROTTLE_BUFFER_SIZE")]
    pub buffer_size: usize,
}

/// Stream settings that override the configuration file
#[derive(Args, Debug, Clone, Default)]
pub struct StreamOverrides {
    /// Force adaptive throttling on
    #[arg(long, conflicts_with = "fixed")]
    pub adaptive: bool,

    /// Force a fixed emission interval
    #[arg(long)]
    pub fixed: bool,

    /// Override the active (or fixed) interval in milliseconds
    #[arg(long, env = "GEO_THROTTLE_THROTTLE_MS")]
    pub throttle_ms: Option<u64>,

    /// Override the static interval in milliseconds
    #[arg(long, env = "GEO_THROTTLE_LOW_FREQUENCY_MS")]
    pub low_frequency_ms: Option<u64>,

    /// Prefer low-power sampling
    #[arg(long)]
    pub low_power: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "stream.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "stream.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
