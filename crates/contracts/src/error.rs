//! Layered error definitions
//!
//! Categorized by source: config / runtime / sink

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Runtime Errors =====
    /// No async runtime available to drive timers
    #[error("runtime unavailable: {message}")]
    RuntimeUnavailable { message: String },

    // ===== Sink Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    /// Sink detached or shut down
    #[error("sink '{sink_name}' unavailable")]
    SinkUnavailable { sink_name: String },

    /// Sink connection error
    #[error("sink '{sink_name}' connection error: {message}")]
    SinkConnection { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Create sink unavailable error
    pub fn sink_unavailable(sink_name: impl Into<String>) -> Self {
        Self::SinkUnavailable {
            sink_name: sink_name.into(),
        }
    }

    /// Whether the error means the sink was simply absent
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::SinkUnavailable { .. })
    }
}
