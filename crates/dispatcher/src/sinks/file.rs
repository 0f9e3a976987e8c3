//! FileSink - appends records to a JSON-lines file

use contracts::{ContractError, DataSink, Record};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::{debug, error, instrument};

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Output file
    pub path: PathBuf,
    /// Append to an existing file instead of truncating it
    pub append: bool,
}

impl FileSinkConfig {
    /// Create config from params map
    ///
    /// Requires `path`; `append` defaults to true.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let path = params
            .get("path")
            .map(PathBuf::from)
            .ok_or_else(|| "missing 'path' parameter".to_string())?;

        let append = match params.get("append").map(String::as_str) {
            None | Some("true") => true,
            Some("false") => false,
            Some(other) => return Err(format!("invalid 'append' value '{other}'")),
        };

        Ok(Self { path, append })
    }
}

/// Sink that writes one JSON object per line
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    writer: Option<BufWriter<File>>,
    lines: u64,
}

impl FileSink {
    /// Open (or create) the output file
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(config.append)
            .truncate(!config.append)
            .open(&config.path)?;

        debug!(path = %config.path.display(), append = config.append, "file sink opened");

        Ok(Self {
            name: name.into(),
            config,
            writer: Some(BufWriter::new(file)),
            lines: 0,
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = FileSinkConfig::from_params(params)
            .map_err(|e| ContractError::config_validation(format!("sinks.{name}.params"), e))?;
        Self::new(name, config).map_err(ContractError::from)
    }

    pub fn path(&self) -> &PathBuf {
        &self.config.path
    }

    fn writer(&mut self) -> Result<&mut BufWriter<File>, ContractError> {
        let name = &self.name;
        self.writer
            .as_mut()
            .ok_or_else(|| ContractError::sink_unavailable(name))
    }

    fn append_line(&mut self, record: &Record) -> Result<(), ContractError> {
        let line = serde_json::to_vec(record)
            .map_err(|e| ContractError::sink_write(&self.name, format!("json error: {e}")))?;

        let name = self.name.clone();
        let writer = self.writer()?;
        writer
            .write_all(&line)
            .and_then(|()| writer.write_all(b"\n"))
            .map_err(|e| {
                error!(sink = %name, error = %e, "write failed");
                ContractError::sink_write(&name, e.to_string())
            })?;
        self.lines += 1;
        Ok(())
    }
}

impl DataSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "file_sink_write", level = "debug", skip(self, record), fields(sink = %self.name))]
    async fn write(&mut self, record: &Record) -> Result<(), ContractError> {
        self.append_line(record)
    }

    #[instrument(name = "file_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        let name = self.name.clone();
        match self.writer.as_mut() {
            Some(writer) => writer
                .flush()
                .map_err(|e| ContractError::sink_write(name, e.to_string())),
            None => Ok(()),
        }
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.flush().await?;
        self.writer = None;
        debug!(sink = %self.name, lines = self.lines, "file sink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{FieldValue, Fragment};
    use tempfile::tempdir;

    fn record(heading: f64) -> Record {
        let mut record = Record::new();
        Fragment::new()
            .with("heading", heading)
            .with_timestamp(1_700_000_000_000)
            .merge_into(&mut record);
        record
    }

    #[tokio::test]
    async fn test_file_sink_writes_json_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out/records.jsonl");
        let config = FileSinkConfig {
            path: path.clone(),
            append: false,
        };

        let mut sink = FileSink::new("test_file", config).unwrap();
        sink.write(&record(10.0)).await.unwrap();
        sink.write(&record(20.5)).await.unwrap();
        sink.close().await.unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: Record = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed.get("heading"), Some(&FieldValue::Float(20.5)));
        assert_eq!(parsed.get("ts"), Some(&FieldValue::Int(1_700_000_000_000)));
    }

    #[tokio::test]
    async fn test_file_sink_append_mode() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("records.jsonl");
        let params: HashMap<String, String> =
            [("path".to_string(), path.display().to_string())].into();

        for heading in [1.0, 2.0] {
            let mut sink = FileSink::from_params("append", &params).unwrap();
            sink.write(&record(heading)).await.unwrap();
            sink.close().await.unwrap();
        }

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_write_after_close_is_unavailable() {
        let dir = tempdir().unwrap();
        let mut sink = FileSink::new(
            "closed",
            FileSinkConfig {
                path: dir.path().join("x.jsonl"),
                append: true,
            },
        )
        .unwrap();
        sink.close().await.unwrap();

        let err = sink.write(&record(0.0)).await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[test]
    fn test_config_requires_path() {
        assert!(FileSinkConfig::from_params(&HashMap::new()).is_err());

        let params: HashMap<String, String> = [
            ("path".to_string(), "a.jsonl".to_string()),
            ("append".to_string(), "maybe".to_string()),
        ]
        .into();
        assert!(FileSinkConfig::from_params(&params).is_err());
    }
}
