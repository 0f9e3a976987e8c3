//! # geo-throttle CLI
//!
//! Command-line entry point.
//!
//! Provides:
//! - Configuration loading and validation
//! - A simulated-device pipeline through the throttler into sinks
//! - Graceful shutdown handling

mod cli;
mod commands;
mod error;
mod pipeline;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_info, run_pipeline, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_logging(&cli)?;

    info!(version = env!("CARGO_PKG_VERSION"), "geo-throttle starting");

    let result = match &cli.command {
        Commands::Run(args) => run_pipeline(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Initialize logging based on CLI options
///
/// `RUST_LOG` wins over `-v` unless `-q` is given.
fn init_logging(cli: &Cli) -> Result<()> {
    let default_log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    observability::init_with_config(observability::ObservabilityConfig {
        log_format: cli.log_format.into(),
        metrics_port: None,
        default_log_level: default_log_level.to_string(),
        env_override: !cli.quiet,
    })
}
