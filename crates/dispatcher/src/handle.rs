//! SinkHandle - runs an async sink behind an isolated bounded queue

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, trace};

use contracts::{DataSink, Record};

use crate::metrics::SinkMetrics;

/// Handle to a running sink worker
pub struct SinkHandle {
    /// Sink name
    name: String,
    /// Queue feeding the worker
    tx: mpsc::Sender<Record>,
    /// Shared metrics
    metrics: Arc<SinkMetrics>,
    /// Worker task handle
    worker_handle: JoinHandle<()>,
}

impl SinkHandle {
    /// Spawn the worker task for `sink` with a queue of `queue_capacity`
    pub fn spawn<S: DataSink + Send + 'static>(sink: S, queue_capacity: usize) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new(name.clone()));

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();

        let worker_handle = tokio::spawn(async move {
            sink_worker(sink, rx, worker_metrics, worker_name).await;
        });

        Self {
            name,
            tx,
            metrics,
            worker_handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Queue a record without waiting
    ///
    /// Returns false when the queue is full or the worker is gone; the
    /// record is dropped and counted.
    pub fn try_send(&self, record: Record) -> bool {
        match self.tx.try_send(record) {
            Ok(()) => {
                self.metrics
                    .set_queue_len(self.tx.max_capacity() - self.tx.capacity());
                true
            }
            Err(mpsc::error::TrySendError::Full(record)) => {
                self.metrics.inc_dropped_count();
                debug!(sink = %self.name, fields = record.len(), "queue full, record dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.metrics.inc_dropped_count();
                error!(sink = %self.name, "sink worker closed unexpectedly");
                false
            }
        }
    }

    /// Whether the worker stopped receiving
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Drain the queue, flush and close the sink
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        // Dropping the sender ends the worker loop once the queue drains
        drop(self.tx);
        if let Err(e) = self.worker_handle.await {
            error!(sink = %self.name, error = ?e, "sink worker panicked");
        }
        debug!(sink = %self.name, "sink handle shutdown complete");
    }
}

/// Worker task that consumes records and writes them to the sink
#[instrument(
    name = "sink_worker_loop",
    skip(sink, rx, metrics),
    fields(sink = %name)
)]
async fn sink_worker<S: DataSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<Record>,
    metrics: Arc<SinkMetrics>,
    name: String,
) {
    debug!(sink = %name, "sink worker started");

    while let Some(record) = rx.recv().await {
        metrics.set_queue_len(rx.len());

        match sink.write(&record).await {
            Ok(()) => {
                metrics.inc_write_count();
                trace!(sink = %name, "record written");
            }
            Err(e) => {
                // One bad record never stops the worker
                metrics.inc_failure_count();
                error!(sink = %name, error = %e, "write failed");
            }
        }
    }

    if let Err(e) = sink.flush().await {
        error!(sink = %name, error = %e, "flush failed on shutdown");
    }
    if let Err(e) = sink.close().await {
        error!(sink = %name, error = %e, "close failed on shutdown");
    }

    debug!(sink = %name, "sink worker stopped");
}
