//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Fall back to defaults for bad stream values, collecting warnings
//! - Validate sink routing
//! - Generate `StreamBlueprint`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let loaded = ConfigLoader::load_from_path(Path::new("stream.toml")).unwrap();
//! for warning in &loaded.warnings {
//!     eprintln!("config warning: {warning}");
//! }
//! println!("throttle: {} ms", loaded.blueprint.stream.throttle_ms);
//! ```

mod parser;
mod validator;

pub use contracts::{ConfigWarning, StreamBlueprint};
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

/// A parsed blueprint plus the values that were replaced by defaults
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub blueprint: StreamBlueprint,
    pub warnings: Vec<ConfigWarning>,
}

impl LoadedConfig {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<LoadedConfig, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<LoadedConfig, ContractError> {
        Self::parse_and_validate(content, format)
    }

    /// Serialize StreamBlueprint to TOML string
    pub fn to_toml(blueprint: &StreamBlueprint) -> Result<String, ContractError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize StreamBlueprint to JSON string
    pub fn to_json(blueprint: &StreamBlueprint) -> Result<String, ContractError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }

    fn parse_and_validate(content: &str, format: ConfigFormat) -> Result<LoadedConfig, ContractError> {
        let (blueprint, mut warnings) = parser::parse(content, format)?;
        warnings.extend(validator::validate(&blueprint)?);
        Ok(LoadedConfig {
            blueprint,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::SinkType;
    use std::io::Write;

    const MINIMAL_TOML: &str = r#"
version = "V1"

[stream]
throttle_ms = 100
adaptive_throttling = true
low_frequency_ms = 1000
static_threshold = 0.1
static_duration_ms = 2000

[[sinks]]
name = "log_sink"
sink_type = "log"

[[sinks]]
name = "udp"
sink_type = "network"
queue_capacity = 32
params = { addr = "127.0.0.1:9870" }
"#;

    #[test]
    fn test_load_from_str_toml() {
        let result = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let loaded = result.unwrap();
        assert!(!loaded.has_warnings(), "{:?}", loaded.warnings);
        assert!(loaded.blueprint.stream.adaptive_throttling);
        assert_eq!(loaded.blueprint.sinks[1].sink_type, SinkType::Network);
        assert_eq!(loaded.blueprint.sinks[1].queue_capacity, 32);
    }

    #[test]
    fn test_round_trip_toml() {
        let bp = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml)
            .unwrap()
            .blueprint;
        let serialized = ConfigLoader::to_toml(&bp).unwrap();
        let bp2 = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml)
            .unwrap()
            .blueprint;
        assert_eq!(bp.stream, bp2.stream);
        assert_eq!(bp.sinks.len(), bp2.sinks.len());
        assert_eq!(bp.sinks[1].params, bp2.sinks[1].params);
    }

    #[test]
    fn test_round_trip_json() {
        let bp = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml)
            .unwrap()
            .blueprint;
        let json = ConfigLoader::to_json(&bp).unwrap();
        let loaded = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(bp.stream, loaded.blueprint.stream);
        assert!(!loaded.has_warnings());
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let content = r#"
[[sinks]]
name = "log"
sink_type = "log"

[[sinks]]
name = "log"
sink_type = "log"
"#;
        let result = ConfigLoader::load_from_str(content, ConfigFormat::Toml);
        assert!(result.unwrap_err().to_string().contains("duplicate"));
    }

    #[test]
    fn test_parse_and_validation_warnings_are_merged() {
        let content = r#"
[stream]
throttle_ms = -5
adaptive_throttling = true
low_frequency_ms = 50
"#;
        let loaded = ConfigLoader::load_from_str(content, ConfigFormat::Toml).unwrap();
        let fields: Vec<_> = loaded.warnings.iter().map(|w| w.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["stream.throttle_ms", "stream.low_frequency_ms", "sinks"]
        );
        assert_eq!(loaded.blueprint.stream.throttle_ms, 100);
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(MINIMAL_TOML.as_bytes()).unwrap();

        let loaded = ConfigLoader::load_from_path(file.path()).unwrap();
        assert_eq!(loaded.blueprint.sinks.len(), 2);
    }

    #[test]
    fn test_unsupported_extension() {
        let err = ConfigLoader::load_from_path(Path::new("stream.yaml")).unwrap_err();
        assert!(err.to_string().contains("unsupported"));
    }
}
