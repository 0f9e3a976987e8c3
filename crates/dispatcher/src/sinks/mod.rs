//! Sink implementations
//!
//! Async sinks run behind a [`crate::SinkHandle`] worker; sync adapters
//! implement [`contracts::RecordSink`] directly.

mod adapters;
mod file;
mod log;
mod network;

pub use self::adapters::{CallbackSink, ChannelSink, SwitchableSink};
pub use self::file::{FileSink, FileSinkConfig};
pub use self::log::LogSink;
pub use self::network::{NetworkSink, NetworkSinkConfig};
