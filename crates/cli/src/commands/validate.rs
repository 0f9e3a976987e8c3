//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use config_loader::LoadedConfig;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    adaptive: bool,
    throttle_ms: u64,
    low_frequency_ms: u64,
    sink_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            error: Some(format!("File not found: {config_path}")),
            config_path,
            warnings: Vec::new(),
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(loaded) => valid_result(config_path, &loaded),
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: Vec::new(),
            summary: None,
        },
    }
}

fn valid_result(config_path: String, loaded: &LoadedConfig) -> ValidationResult {
    let blueprint = &loaded.blueprint;
    ValidationResult {
        valid: true,
        config_path,
        error: None,
        warnings: loaded.warnings.iter().map(ToString::to_string).collect(),
        summary: Some(ConfigSummary {
            version: format!("{:?}", blueprint.version),
            adaptive: blueprint.stream.adaptive_throttling,
            throttle_ms: blueprint.stream.throttle_ms,
            low_frequency_ms: blueprint.stream.low_frequency_ms,
            sink_count: blueprint.sinks.len(),
        }),
    }
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("OK  Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Adaptive: {}", summary.adaptive);
            println!("  Throttle: {} ms", summary.throttle_ms);
            println!("  Static interval: {} ms", summary.low_frequency_ms);
            println!("  Sinks: {}", summary.sink_count);
        }

        if !result.warnings.is_empty() {
            println!("\nWarnings (defaults applied):");
            for warning in &result.warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("ERR Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
