//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration could not be loaded
    #[error("Failed to load configuration from {path}: {source}")]
    ConfigLoad {
        path: String,
        #[source]
        source: contracts::ContractError,
    },

    /// Pipeline setup or execution error
    #[error("Pipeline execution failed: {message}")]
    PipelineExecution { message: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn config_load(path: impl Into<String>, source: contracts::ContractError) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            source,
        }
    }

    pub fn pipeline_execution(message: impl Into<String>) -> Self {
        Self::PipelineExecution {
            message: message.into(),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
