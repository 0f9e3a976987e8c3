//! Configuration parsing
//!
//! TOML (primary) and JSON documents are first read into a generic tree.
//! The `stream` table is then read key by key with fallback to defaults;
//! `sinks` is deserialized strictly.

use contracts::{
    ConfigVersion, ConfigWarning, ContractError, SinkConfig, StreamBlueprint, StreamConfig,
};
use serde_json::{Map, Value};

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML (recommended)
    Toml,
    /// JSON
    Json,
}

impl ConfigFormat {
    /// Infer format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Read a TOML document into a generic tree
pub fn parse_toml(content: &str) -> Result<Value, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Read a JSON document into a generic tree
pub fn parse_json(content: &str) -> Result<Value, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse a document into a blueprint plus fallback warnings
///
/// # Errors
/// Syntax errors, a non-table document root, or a malformed `sinks` array
pub fn parse(
    content: &str,
    format: ConfigFormat,
) -> Result<(StreamBlueprint, Vec<ConfigWarning>), ContractError> {
    let document = match format {
        ConfigFormat::Toml => parse_toml(content)?,
        ConfigFormat::Json => parse_json(content)?,
    };
    let Value::Object(mut root) = document else {
        return Err(ContractError::config_parse("document root must be a table"));
    };

    let mut warnings = Vec::new();
    let version = parse_version(root.remove("version"), &mut warnings);
    let stream = match root.remove("stream") {
        None => StreamConfig::default(),
        Some(Value::Object(table)) => parse_stream(&table, &mut warnings),
        Some(other) => {
            warnings.push(ConfigWarning::new(
                "stream",
                format!("expected a table, got {}, using defaults", type_name(&other)),
            ));
            StreamConfig::default()
        }
    };
    let sinks = parse_sinks(root.remove("sinks"))?;

    for key in root.keys() {
        warnings.push(ConfigWarning::new(key.as_str(), "unknown section ignored"));
    }

    Ok((
        StreamBlueprint {
            version,
            stream,
            sinks,
        },
        warnings,
    ))
}

fn parse_version(value: Option<Value>, warnings: &mut Vec<ConfigWarning>) -> ConfigVersion {
    match value {
        None => ConfigVersion::V1,
        Some(Value::String(s)) if s.eq_ignore_ascii_case("v1") || s == "1" => ConfigVersion::V1,
        Some(Value::Number(n)) if n.as_u64() == Some(1) => ConfigVersion::V1,
        Some(other) => {
            warnings.push(ConfigWarning::new(
                "version",
                format!("unsupported version {other}, assuming V1"),
            ));
            ConfigVersion::V1
        }
    }
}

/// Read the stream table one key at a time
///
/// Keys may be snake_case or camelCase. A missing key keeps its default
/// silently; a wrongly-typed or out-of-range value keeps its default and
/// adds a warning.
fn parse_stream(table: &Map<String, Value>, warnings: &mut Vec<ConfigWarning>) -> StreamConfig {
    let mut config = StreamConfig::default();

    for (key, value) in table {
        let field = format!("stream.{key}");
        match canonical_stream_key(key) {
            Some("throttle_ms") => read_millis(value, &field, &mut config.throttle_ms, warnings),
            Some("low_frequency_ms") => {
                read_millis(value, &field, &mut config.low_frequency_ms, warnings)
            }
            Some("static_duration_ms") => {
                read_millis(value, &field, &mut config.static_duration_ms, warnings)
            }
            Some("low_power_mode") => read_bool(value, &field, &mut config.low_power_mode, warnings),
            Some("adaptive_throttling") => {
                read_bool(value, &field, &mut config.adaptive_throttling, warnings)
            }
            Some("static_threshold") => {
                read_threshold(value, &field, &mut config.static_threshold, warnings)
            }
            _ => warnings.push(ConfigWarning::new(field, "unknown key ignored")),
        }
    }

    config
}

fn canonical_stream_key(key: &str) -> Option<&'static str> {
    match key {
        "throttle_ms" | "throttleMs" => Some("throttle_ms"),
        "low_power_mode" | "lowPowerMode" => Some("low_power_mode"),
        "adaptive_throttling" | "adaptiveThrottling" => Some("adaptive_throttling"),
        "low_frequency_ms" | "lowFrequencyMs" => Some("low_frequency_ms"),
        "static_threshold" | "staticThreshold" => Some("static_threshold"),
        "static_duration_ms" | "staticDurationMs" => Some("static_duration_ms"),
        _ => None,
    }
}

/// Positive millisecond count; integers or floats (rounded)
fn read_millis(value: &Value, field: &str, target: &mut u64, warnings: &mut Vec<ConfigWarning>) {
    let parsed = match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.5 && *f <= u64::MAX as f64)
                .map(|f| f.round() as u64)
        }),
        _ => None,
    };

    match parsed {
        Some(ms) if ms > 0 => *target = ms,
        _ => warnings.push(ConfigWarning::new(
            field,
            format!("expected a positive number of milliseconds, got {value}, using {target}"),
        )),
    }
}

fn read_bool(value: &Value, field: &str, target: &mut bool, warnings: &mut Vec<ConfigWarning>) {
    match value {
        Value::Bool(b) => *target = *b,
        other => warnings.push(ConfigWarning::new(
            field,
            format!("expected a boolean, got {other}, using {target}"),
        )),
    }
}

fn read_threshold(value: &Value, field: &str, target: &mut f64, warnings: &mut Vec<ConfigWarning>) {
    match value.as_f64() {
        Some(v) if v.is_finite() && v >= 0.0 => *target = v,
        _ => warnings.push(ConfigWarning::new(
            field,
            format!("expected a non-negative number, got {value}, using {target}"),
        )),
    }
}

fn parse_sinks(value: Option<Value>) -> Result<Vec<SinkConfig>, ContractError> {
    match value {
        None => Ok(Vec::new()),
        Some(value) => serde_json::from_value(value).map_err(|e| ContractError::ConfigParse {
            message: format!("invalid sinks section: {e}"),
            source: Some(Box::new(e)),
        }),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "table",
    }
}
