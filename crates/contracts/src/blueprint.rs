//! StreamBlueprint - Config Loader output
//!
//! Describes one throttled sensor stream and its output routing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::StreamConfig;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete stream configuration blueprint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Stream / throttling settings
    #[serde(default)]
    pub stream: StreamConfig,

    /// Output routing
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

/// Sink output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink name
    pub name: String,

    /// Sink type
    pub sink_type: SinkType,

    /// Queue capacity
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Type-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    100
}

impl SinkConfig {
    /// Log sink with default capacity
    pub fn log(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sink_type: SinkType::Log,
            queue_capacity: default_queue_capacity(),
            params: HashMap::new(),
        }
    }
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// Log output
    Log,
    /// JSON-lines file output
    File,
    /// Network output (UDP)
    Network,
}
