//! # Dispatcher
//!
//! Output side of a throttled stream.
//!
//! Responsibilities:
//! - Fan emitted records out to every configured sink
//! - Isolate slow sinks behind bounded queues so producers never block
//! - Provide sync sink adapters (callback, channel, switchable)

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use contracts::{DataSink, RecordSink};
pub use dispatcher::{create_dispatcher, Dispatcher, DispatcherBuilder, DispatcherConfig};
pub use error::DispatcherError;
pub use handle::SinkHandle;
pub use metrics::{SinkMetrics, SinkMetricsSnapshot};
pub use sinks::{
    CallbackSink, ChannelSink, FileSink, FileSinkConfig, LogSink, NetworkSink, NetworkSinkConfig,
    SwitchableSink,
};
