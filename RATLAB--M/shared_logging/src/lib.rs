#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Structured JSON logging sinks shared by the compound analysis crates.

use std::{
    collections::VecDeque,
    fmt,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Log severity level, ordered from least to most severe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// Debug information.
    Debug,
    /// Informational events.
    Info,
    /// Warning indicator.
    Warn,
    /// Error indicator.
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debug => write!(f, "DEBUG"),
            Self::Info => write!(f, "INFO"),
            Self::Warn => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Structured log record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    /// Timestamp in ISO8601.
    pub timestamp: DateTime<Utc>,
    /// Module emitting the log.
    pub module: String,
    /// Severity.
    pub level: LogLevel,
    /// Event name or human-readable message.
    pub message: String,
    /// Structured fields attached to the record.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, Value>,
}

impl LogRecord {
    /// Creates a record stamped with the current time.
    #[must_use]
    pub fn new(module: impl Into<String>, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            module: module.into(),
            level,
            message: message.into(),
            metadata: serde_json::Map::new(),
        }
    }

    /// Attaches one structured field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Merges every key of a JSON object into the metadata. Non-objects are ignored.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        if let Value::Object(fields) = metadata {
            self.metadata.extend(fields);
        }
        self
    }
}

/// Destination for structured log records.
pub trait LogSink: Send + Sync {
    /// Writes the record if it passes the sink's level filter.
    fn log(&self, record: &LogRecord) -> Result<()>;

    /// Minimum level accepted by the sink.
    fn min_level(&self) -> LogLevel {
        LogLevel::Debug
    }

    /// Returns true when records at `level` would be written.
    fn enabled(&self, level: LogLevel) -> bool {
        level >= self.min_level()
    }
}

/// Append-only JSON-lines logger backed by a file.
#[derive(Debug)]
pub struct JsonLogger {
    path: PathBuf,
    min_level: LogLevel,
    writer: Mutex<File>,
}

impl JsonLogger {
    /// Creates or opens a logger at the desired path, creating parent directories.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        Ok(Self {
            path,
            min_level: LogLevel::Debug,
            writer: Mutex::new(file),
        })
    }

    /// Drops records below `level`.
    #[must_use]
    pub const fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Returns the underlying file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for JsonLogger {
    fn log(&self, record: &LogRecord) -> Result<()> {
        if !self.enabled(record.level) {
            return Ok(());
        }
        let mut writer = self.writer.lock();
        serde_json::to_writer(&mut *writer, record)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        self.min_level
    }
}

/// Bounded in-memory sink retaining the newest records.
#[derive(Debug)]
pub struct MemoryLogSink {
    capacity: usize,
    min_level: LogLevel,
    records: Mutex<VecDeque<LogRecord>>,
}

impl MemoryLogSink {
    /// Creates a sink holding at most `capacity` records (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            min_level: LogLevel::Debug,
            records: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Drops records below `level`.
    #[must_use]
    pub const fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Copies the retained records, oldest first.
    #[must_use]
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().iter().cloned().collect()
    }

    /// Returns the retained records whose message equals `message`.
    #[must_use]
    pub fn find(&self, message: &str) -> Vec<LogRecord> {
        self.records
            .lock()
            .iter()
            .filter(|record| record.message == message)
            .cloned()
            .collect()
    }
}

impl LogSink for MemoryLogSink {
    fn log(&self, record: &LogRecord) -> Result<()> {
        if !self.enabled(record.level) {
            return Ok(());
        }
        let mut records = self.records.lock();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record.clone());
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        self.min_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn writes_json_lines() {
        let dir = tempdir().unwrap();
        let logger = JsonLogger::new(dir.path().join("nested/compound.log")).unwrap();
        logger
            .log(&LogRecord::new("compound", LogLevel::Info, "analysis").with_field("confidence", 0.5))
            .unwrap();
        let content = fs::read_to_string(logger.path()).unwrap();
        assert!(content.contains("\"message\":\"analysis\""));
        assert!(content.contains("\"level\":\"INFO\""));
        assert!(content.contains("\"confidence\":0.5"));
    }

    #[test]
    fn file_logger_filters_by_level() {
        let dir = tempdir().unwrap();
        let logger = JsonLogger::new(dir.path().join("compound.log"))
            .unwrap()
            .with_min_level(LogLevel::Warn);
        logger
            .log(&LogRecord::new("compound", LogLevel::Debug, "noisy"))
            .unwrap();
        logger
            .log(&LogRecord::new("compound", LogLevel::Warn, "degenerate"))
            .unwrap();
        let content = fs::read_to_string(logger.path()).unwrap();
        assert!(!content.contains("noisy"));
        assert_eq!(content.lines().count(), 1);
    }

    #[test]
    fn memory_sink_evicts_oldest() {
        let sink = MemoryLogSink::new(2);
        for message in ["first", "second", "third"] {
            sink.log(&LogRecord::new("compound", LogLevel::Info, message))
                .unwrap();
        }
        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].message, "second");
        assert_eq!(sink.find("third").len(), 1);
    }

    #[test]
    fn metadata_merges_objects_only() {
        let record = LogRecord::new("compound", LogLevel::Info, "merge")
            .with_metadata(json!({ "a": 1, "b": "two" }))
            .with_metadata(json!(7));
        assert_eq!(record.metadata.len(), 2);
        assert_eq!(record.metadata["b"], json!("two"));
    }
}
