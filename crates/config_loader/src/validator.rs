//! Blueprint validation
//!
//! Rules:
//! - sink names are non-empty and unique
//! - queue_capacity > 0
//! - file sinks carry `path`
//! - network sinks carry a parseable `addr`
//!
//! Stream values never fail validation; suspicious combinations are
//! reported as warnings.

use std::collections::HashSet;
use std::net::SocketAddr;

use contracts::{ConfigWarning, ContractError, SinkType, StreamBlueprint};

/// Validate a blueprint
///
/// Returns the first error found, or the non-fatal warnings.
pub fn validate(blueprint: &StreamBlueprint) -> Result<Vec<ConfigWarning>, ContractError> {
    validate_sinks(blueprint)?;
    Ok(stream_warnings(blueprint))
}

fn validate_sinks(blueprint: &StreamBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();

    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].name"),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
        if sink.queue_capacity == 0 {
            return Err(ContractError::config_validation(
                format!("sinks[{}].queue_capacity", sink.name),
                "queue_capacity must be > 0",
            ));
        }

        match sink.sink_type {
            SinkType::Log => {}
            SinkType::File => {
                let has_path = sink.params.get("path").is_some_and(|p| !p.trim().is_empty());
                if !has_path {
                    return Err(ContractError::config_validation(
                        format!("sinks[{}].params.path", sink.name),
                        "file sink requires a path",
                    ));
                }
            }
            SinkType::Network => {
                let Some(addr) = sink.params.get("addr") else {
                    return Err(ContractError::config_validation(
                        format!("sinks[{}].params.addr", sink.name),
                        "network sink requires an addr",
                    ));
                };
                if let Err(e) = addr.parse::<SocketAddr>() {
                    return Err(ContractError::config_validation(
                        format!("sinks[{}].params.addr", sink.name),
                        format!("invalid socket address '{addr}': {e}"),
                    ));
                }
            }
        }
    }
    Ok(())
}

fn stream_warnings(blueprint: &StreamBlueprint) -> Vec<ConfigWarning> {
    let stream = &blueprint.stream;
    let mut warnings = Vec::new();

    if stream.adaptive_throttling && stream.low_frequency_ms < stream.throttle_ms {
        warnings.push(ConfigWarning::new(
            "stream.low_frequency_ms",
            format!(
                "static interval ({} ms) is shorter than the active interval ({} ms)",
                stream.low_frequency_ms, stream.throttle_ms
            ),
        ));
    }
    if blueprint.sinks.is_empty() {
        warnings.push(ConfigWarning::new("sinks", "no sinks configured"));
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{SinkConfig, StreamConfig};
    use std::collections::HashMap;

    fn minimal_blueprint() -> StreamBlueprint {
        StreamBlueprint {
            sinks: vec![SinkConfig::log("log")],
            ..Default::default()
        }
    }

    fn sink(name: &str, sink_type: SinkType, params: &[(&str, &str)]) -> SinkConfig {
        SinkConfig {
            name: name.into(),
            sink_type,
            queue_capacity: 10,
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn test_valid_config() {
        let warnings = validate(&minimal_blueprint()).unwrap();
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_duplicate_sink_name() {
        let mut bp = minimal_blueprint();
        bp.sinks.push(SinkConfig::log("log"));

        let err = validate(&bp).unwrap_err();
        assert!(matches!(err, ContractError::ConfigValidation { .. }));
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_empty_sink_name() {
        let mut bp = minimal_blueprint();
        bp.sinks[0].name = " ".into();
        assert!(validate(&bp).is_err());
    }

    #[test]
    fn test_zero_queue_capacity() {
        let mut bp = minimal_blueprint();
        bp.sinks[0].queue_capacity = 0;
        let err = validate(&bp).unwrap_err();
        assert!(err.to_string().contains("queue_capacity"));
    }

    #[test]
    fn test_file_sink_requires_path() {
        let mut bp = minimal_blueprint();
        bp.sinks.push(sink("file", SinkType::File, &[]));
        assert!(validate(&bp).is_err());

        bp.sinks[1] = sink("file", SinkType::File, &[("path", "out.jsonl")]);
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_network_sink_addr() {
        let mut bp = minimal_blueprint();
        bp.sinks.push(sink("udp", SinkType::Network, &[("addr", "not-an-addr")]));
        let err = validate(&bp).unwrap_err();
        assert!(err.to_string().contains("invalid socket address"));

        bp.sinks[1] = sink("udp", SinkType::Network, &[("addr", "127.0.0.1:9000")]);
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_inverted_intervals_warn() {
        let bp = StreamBlueprint {
            stream: StreamConfig {
                throttle_ms: 500,
                low_frequency_ms: 200,
                adaptive_throttling: true,
                ..Default::default()
            },
            sinks: vec![SinkConfig::log("log")],
            ..Default::default()
        };
        let warnings = validate(&bp).unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, "stream.low_frequency_ms");
    }

    #[test]
    fn test_no_sinks_warns() {
        let warnings = validate(&StreamBlueprint::default()).unwrap();
        assert_eq!(warnings[0].field, "sinks");
    }
}
