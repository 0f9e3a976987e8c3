//! Dispatcher - fan-out of emitted records to configured sinks

use std::collections::HashSet;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use tracing::{debug, info, instrument};

use contracts::{ContractError, Record, RecordSink, SinkConfig, SinkType};

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::metrics::SinkMetricsSnapshot;
use crate::sinks::{FileSink, LogSink, NetworkSink};

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Display name
    pub name: String,
    /// Sink configurations
    pub sinks: Vec<SinkConfig>,
}

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder {
    config: DispatcherConfig,
}

impl DispatcherBuilder {
    pub fn new(config: DispatcherConfig) -> Self {
        Self { config }
    }

    /// Create every sink and start its worker
    ///
    /// # Errors
    /// Fails on the first sink that cannot be created; workers already
    /// started for earlier sinks are shut down.
    #[instrument(name = "dispatcher_builder_build", skip(self), fields(name = %self.config.name))]
    pub async fn build(self) -> Result<Dispatcher, DispatcherError> {
        let handles = Self::initialize_handles(&self.config).await?;
        Ok(Dispatcher::with_handles(self.config.name, handles))
    }

    #[instrument(
        name = "dispatcher_initialize_handles",
        skip(config),
        fields(sink_count = config.sinks.len())
    )]
    async fn initialize_handles(
        config: &DispatcherConfig,
    ) -> Result<Vec<SinkHandle>, DispatcherError> {
        let mut handles = Vec::with_capacity(config.sinks.len());
        let mut names = HashSet::new();

        for sink_config in &config.sinks {
            let created = if names.insert(sink_config.name.as_str()) {
                create_sink_handle(sink_config).await
            } else {
                Err(DispatcherError::DuplicateSink {
                    name: sink_config.name.clone(),
                })
            };

            match created {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    shutdown_handles(handles).await;
                    return Err(e);
                }
            }
        }
        Ok(handles)
    }
}

/// Create a SinkHandle from configuration
#[instrument(
    name = "dispatcher_create_sink_handle",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
async fn create_sink_handle(config: &SinkConfig) -> Result<SinkHandle, DispatcherError> {
    let creation_err = |e: ContractError| DispatcherError::sink_creation(&config.name, e.to_string());
    match config.sink_type {
        SinkType::Log => {
            let sink = LogSink::new(&config.name);
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
        SinkType::File => {
            let sink = FileSink::from_params(&config.name, &config.params).map_err(creation_err)?;
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
        SinkType::Network => {
            let sink = NetworkSink::from_params(&config.name, &config.params)
                .await
                .map_err(creation_err)?;
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
    }
}

async fn shutdown_handles(handles: Vec<SinkHandle>) {
    for handle in handles {
        handle.shutdown().await;
    }
}

/// Fans every emitted record out to per-sink queues
///
/// Implements [`RecordSink`], so a throttler can emit straight into it.
/// Emission never waits on a sink: a full queue drops the record for that
/// sink only. After [`Dispatcher::shutdown`] emission reports the sink as
/// unavailable.
pub struct Dispatcher {
    name: String,
    handles: RwLock<Vec<SinkHandle>>,
    records: AtomicU64,
}

impl Dispatcher {
    /// Dispatcher over already-running handles
    pub fn with_handles(name: impl Into<String>, handles: Vec<SinkHandle>) -> Self {
        let name = name.into();
        info!(dispatcher = %name, sinks = handles.len(), "dispatcher started");
        Self {
            name,
            handles: RwLock::new(handles),
            records: AtomicU64::new(0),
        }
    }

    /// Number of live sinks
    pub fn sink_count(&self) -> usize {
        self.handles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Records accepted for fan-out
    pub fn records_dispatched(&self) -> u64 {
        self.records.load(Ordering::Relaxed)
    }

    /// Get metrics for all sinks
    pub fn metrics(&self) -> Vec<(String, SinkMetricsSnapshot)> {
        self.handles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Drain every queue and close every sink
    ///
    /// Returns the final per-sink metrics. Idempotent.
    #[instrument(name = "dispatcher_shutdown", skip(self), fields(dispatcher = %self.name))]
    pub async fn shutdown(&self) -> Vec<(String, SinkMetricsSnapshot)> {
        let handles = mem::take(
            &mut *self
                .handles
                .write()
                .unwrap_or_else(PoisonError::into_inner),
        );
        if handles.is_empty() {
            return Vec::new();
        }

        let metrics: Vec<_> = handles
            .iter()
            .map(|h| (h.name().to_string(), std::sync::Arc::clone(h.metrics())))
            .collect();
        shutdown_handles(handles).await;

        info!(
            dispatcher = %self.name,
            records = self.records_dispatched(),
            "dispatcher shutdown complete"
        );
        metrics
            .into_iter()
            .map(|(name, m)| (name, m.snapshot()))
            .collect()
    }
}

impl RecordSink for Dispatcher {
    fn name(&self) -> &str {
        &self.name
    }

    fn emit(&self, record: Record) -> Result<(), ContractError> {
        let handles = self.handles.read().unwrap_or_else(PoisonError::into_inner);
        let Some((last, rest)) = handles.split_last() else {
            return Err(ContractError::sink_unavailable(&self.name));
        };

        let count = self.records.fetch_add(1, Ordering::Relaxed) + 1;
        for handle in rest {
            handle.try_send(record.clone());
        }
        last.try_send(record);

        if count % 100 == 0 {
            debug!(dispatcher = %self.name, records = count, "dispatcher progress");
        }
        Ok(())
    }
}

/// Convenience function to create a dispatcher from sink configs
#[instrument(name = "dispatcher_create", skip(sink_configs))]
pub async fn create_dispatcher(
    name: &str,
    sink_configs: Vec<SinkConfig>,
) -> Result<Dispatcher, DispatcherError> {
    let config = DispatcherConfig {
        name: name.to_string(),
        sinks: sink_configs,
    };
    DispatcherBuilder::new(config).build().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Fragment;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::tempdir;

    fn record(seq: i64) -> Record {
        let mut record = Record::new();
        Fragment::new().with("seq", seq).merge_into(&mut record);
        record
    }

    #[tokio::test]
    async fn test_dispatcher_fanout() {
        let handles = vec![
            SinkHandle::spawn(LogSink::new("sink1"), 10),
            SinkHandle::spawn(LogSink::new("sink2"), 10),
        ];
        let dispatcher = Dispatcher::with_handles("test", handles);

        for i in 0..5 {
            dispatcher.emit(record(i)).unwrap();
        }
        assert_eq!(dispatcher.records_dispatched(), 5);

        let metrics = dispatcher.shutdown().await;
        assert_eq!(metrics.len(), 2);
        for (_, snapshot) in metrics {
            assert_eq!(snapshot.write_count, 5);
        }
    }

    #[tokio::test]
    async fn test_emit_after_shutdown_is_unavailable() {
        let dispatcher =
            Dispatcher::with_handles("test", vec![SinkHandle::spawn(LogSink::new("log"), 4)]);
        dispatcher.shutdown().await;

        assert!(dispatcher.emit(record(0)).unwrap_err().is_unavailable());
        assert!(dispatcher.shutdown().await.is_empty());
    }

    #[tokio::test]
    async fn test_create_dispatcher_from_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("records.jsonl");
        let configs = vec![
            SinkConfig::log("test_log"),
            SinkConfig {
                name: "file".to_string(),
                sink_type: SinkType::File,
                queue_capacity: 50,
                params: HashMap::from([("path".to_string(), path.display().to_string())]),
            },
        ];

        let dispatcher = create_dispatcher("cfg", configs).await.unwrap();
        assert_eq!(dispatcher.sink_count(), 2);
        dispatcher.emit(record(1)).unwrap();
        dispatcher.emit(record(2)).unwrap();
        dispatcher.shutdown().await;

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_invalid_sink_fails_creation() {
        let configs = vec![SinkConfig {
            name: "file".to_string(),
            sink_type: SinkType::File,
            queue_capacity: 10,
            params: HashMap::new(),
        }];

        let result = create_dispatcher("bad", configs).await;
        assert!(matches!(result, Err(DispatcherError::SinkCreation { .. })));
    }

    #[tokio::test]
    async fn test_duplicate_sink_name_rejected() {
        let configs = vec![SinkConfig::log("same"), SinkConfig::log("same")];
        let result = create_dispatcher("dup", configs).await;
        assert!(matches!(result, Err(DispatcherError::DuplicateSink { .. })));
    }
}
