//! LogSink - logs record summaries via tracing

use contracts::{ContractError, DataSink, Record, FIELD_MODE_CHANGE, FIELD_THROTTLE_MS};
use tracing::{info, instrument};

/// Sink that logs one line per record
pub struct LogSink {
    name: String,
    written: u64,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            written: 0,
        }
    }

    fn log_record_summary(&self, record: &Record) {
        let throttle_ms = record.get(FIELD_THROTTLE_MS).and_then(|v| v.as_i64());
        let mode_change = record.get(FIELD_MODE_CHANGE).and_then(|v| v.as_str());

        match mode_change {
            Some(mode) => info!(
                sink = %self.name,
                seq = self.written,
                mode,
                throttle_ms,
                "rate mode change record"
            ),
            None => info!(
                sink = %self.name,
                seq = self.written,
                fields = record.len(),
                throttle_ms,
                "record received"
            ),
        }
    }
}

impl DataSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        level = "debug",
        skip(self, record),
        fields(sink = %self.name)
    )]
    async fn write(&mut self, record: &Record) -> Result<(), ContractError> {
        self.log_record_summary(record);
        self.written += 1;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, records = self.written, "log sink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{FieldValue, Fragment};

    #[tokio::test]
    async fn test_log_sink_write() {
        let mut sink = LogSink::new("test_log");
        let mut record = Record::new();
        Fragment::new()
            .with(FIELD_MODE_CHANGE, "static")
            .with(FIELD_THROTTLE_MS, FieldValue::Int(1000))
            .merge_into(&mut record);

        assert!(sink.write(&record).await.is_ok());
        assert!(sink.write(&Record::new()).await.is_ok());
        assert_eq!(sink.written, 2);
        assert!(sink.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_log_sink_name() {
        let sink = LogSink::new("my_logger");
        assert_eq!(sink.name(), "my_logger");
    }
}
