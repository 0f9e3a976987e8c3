//! Ingestion error types

use thiserror::Error;

/// Ingestion errors
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Throttler could not be constructed
    #[error("failed to build throttler for stream {stream}: {source}")]
    ThrottlerSetup {
        /// Stream name
        stream: String,
        #[source]
        source: throttle_engine::EngineError,
    },

    /// Mock source was started twice
    #[error("source {source_id} is already running")]
    AlreadyRunning {
        /// Source ID
        source_id: String,
    },
}

/// Ingestion Result type alias
pub type Result<T> = std::result::Result<T, IngestionError>;
