//! Sink traits - throttler output interfaces
//!
//! [`RecordSink`] is the synchronous, fire-and-forget interface the
//! throttler calls. [`DataSink`] is the async interface for sinks that run
//! behind a worker queue.

use std::sync::Arc;

use crate::{ContractError, Record};

/// Synchronous output sink
///
/// Called outside the throttler lock with a detached record. Failures are
/// reported to the caller but never propagated into producer call paths.
pub trait RecordSink: Send + Sync {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Hand one coalesced record to the sink
    ///
    /// # Errors
    /// Returns write error or [`ContractError::SinkUnavailable`]
    fn emit(&self, record: Record) -> Result<(), ContractError>;
}

impl<S: RecordSink + ?Sized> RecordSink for Arc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn emit(&self, record: Record) -> Result<(), ContractError> {
        (**self).emit(record)
    }
}

/// Async data output trait
///
/// Implemented by sinks that are driven by a dedicated worker task.
#[trait_variant::make(DataSink: Send)]
pub trait LocalDataSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write one record
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write(&mut self, record: &Record) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}
