//! Synchronous sink adapters
//!
//! Small [`RecordSink`] implementations for wiring a throttler to a
//! closure, to an async consumer, or to a sink that may come and go.

use std::sync::{Arc, PoisonError, RwLock};

use async_channel::{Receiver, Sender, TrySendError};
use contracts::{ContractError, Record, RecordSink};
use tracing::debug;

type Callback = dyn Fn(Record) -> Result<(), ContractError> + Send + Sync;

/// Sink backed by a closure
pub struct CallbackSink {
    name: String,
    callback: Box<Callback>,
}

impl CallbackSink {
    pub fn new<F>(name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(Record) -> Result<(), ContractError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            callback: Box::new(callback),
        }
    }
}

impl RecordSink for CallbackSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn emit(&self, record: Record) -> Result<(), ContractError> {
        (self.callback)(record)
    }
}

/// Sink forwarding into a bounded async channel
///
/// Never blocks: a full queue is a write error, a closed queue means the
/// consumer is gone.
pub struct ChannelSink {
    name: String,
    tx: Sender<Record>,
}

impl ChannelSink {
    /// Sink plus the receiving end for the consumer
    pub fn bounded(name: impl Into<String>, capacity: usize) -> (Self, Receiver<Record>) {
        let (tx, rx) = async_channel::bounded(capacity.max(1));
        (
            Self {
                name: name.into(),
                tx,
            },
            rx,
        )
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

impl RecordSink for ChannelSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn emit(&self, record: Record) -> Result<(), ContractError> {
        match self.tx.try_send(record) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(ContractError::sink_write(&self.name, "queue full")),
            Err(TrySendError::Closed(_)) => Err(ContractError::sink_unavailable(&self.name)),
        }
    }
}

/// Sink that can be detached and re-attached at runtime
///
/// While detached every emission fails with
/// [`ContractError::SinkUnavailable`].
pub struct SwitchableSink {
    name: String,
    target: RwLock<Option<Arc<dyn RecordSink>>>,
}

impl SwitchableSink {
    /// Start detached
    pub fn detached(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: RwLock::new(None),
        }
    }

    /// Start attached to `target`
    pub fn attached(name: impl Into<String>, target: Arc<dyn RecordSink>) -> Self {
        Self {
            name: name.into(),
            target: RwLock::new(Some(target)),
        }
    }

    /// Route emissions to `target`, returning the previous one
    pub fn attach(&self, target: Arc<dyn RecordSink>) -> Option<Arc<dyn RecordSink>> {
        debug!(sink = %self.name, target = target.name(), "sink attached");
        self.target
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(target)
    }

    /// Stop routing emissions, returning the detached target
    pub fn detach(&self) -> Option<Arc<dyn RecordSink>> {
        debug!(sink = %self.name, "sink detached");
        self.target
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn is_attached(&self) -> bool {
        self.target
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl RecordSink for SwitchableSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn emit(&self, record: Record) -> Result<(), ContractError> {
        // Clone out so the target runs without our lock held
        let target = self
            .target
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match target {
            Some(target) => target.emit(record),
            None => Err(ContractError::sink_unavailable(&self.name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Fragment;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn record() -> Record {
        let mut record = Record::new();
        Fragment::new().with("a", 1i64).merge_into(&mut record);
        record
    }

    fn counting_sink(count: Arc<AtomicUsize>) -> Arc<dyn RecordSink> {
        Arc::new(CallbackSink::new("count", move |_| {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
    }

    #[test]
    fn test_callback_sink() {
        let count = Arc::new(AtomicUsize::new(0));
        let sink = counting_sink(Arc::clone(&count));
        sink.emit(record()).unwrap();
        sink.emit(record()).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_channel_sink_full_and_closed() {
        let (sink, rx) = ChannelSink::bounded("chan", 1);
        sink.emit(record()).unwrap();
        assert_eq!(sink.len(), 1);

        let err = sink.emit(record()).unwrap_err();
        assert!(!err.is_unavailable());

        assert_eq!(rx.try_recv().unwrap(), record());
        drop(rx);
        assert!(sink.emit(record()).unwrap_err().is_unavailable());
    }

    #[test]
    fn test_switchable_sink_detach_attach() {
        let count = Arc::new(AtomicUsize::new(0));
        let sink = SwitchableSink::detached("switch");
        assert!(!sink.is_attached());
        assert!(sink.emit(record()).unwrap_err().is_unavailable());

        sink.attach(counting_sink(Arc::clone(&count)));
        sink.emit(record()).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        assert!(sink.detach().is_some());
        assert!(sink.emit(record()).unwrap_err().is_unavailable());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
