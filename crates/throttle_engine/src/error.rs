//! Throttle engine error types

use thiserror::Error;

/// Engine errors
///
/// Only construction can fail; producer-facing operations are infallible.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No Tokio runtime to drive timers
    #[error("no tokio runtime available: {message}")]
    NoRuntime { message: String },
}

impl From<EngineError> for contracts::ContractError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NoRuntime { message } => Self::RuntimeUnavailable { message },
        }
    }
}
