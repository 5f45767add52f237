//! Destinations for invocation audit records.

use std::path::{Path, PathBuf};
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::info;

use crate::record::InvocationRecord;

/// Errors emitted by audit sinks.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Underlying I/O failure while writing the log file.
    #[error("i/o error: {source}")]
    Io {
        /// Source [`std::io::Error`].
        #[from]
        source: std::io::Error,
    },
    /// Record could not be serialised.
    #[error("serialization error: {source}")]
    Serialization {
        /// Source [`serde_json::Error`].
        #[from]
        source: serde_json::Error,
    },
}

/// Result alias for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;

/// Trait implemented by audit destinations.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Persists one record.
    async fn record(&self, record: &InvocationRecord) -> AuditResult<()>;
}

/// Writes each record as a JSON line on the diagnostic stream via `tracing`.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, record: &InvocationRecord) -> AuditResult<()> {
        let line = serde_json::to_string(record)?;
        info!(target: "toolhub::audit", record = %line, "invocation");
        Ok(())
    }
}

/// Append-only file of newline-delimited JSON records.
#[derive(Debug)]
pub struct FileAuditSink {
    path: PathBuf,
    file: Mutex<tokio::fs::File>,
}

impl FileAuditSink {
    /// Opens (or creates) the log file, creating parent directories.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors encountered while preparing the file.
    pub async fn open(path: impl Into<PathBuf>) -> AuditResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Returns the log file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AuditSink for FileAuditSink {
    async fn record(&self, record: &InvocationRecord) -> AuditResult<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        let mut guard = self.file.lock().await;
        guard.write_all(&line).await?;
        guard.flush().await?;
        Ok(())
    }
}

/// Collects records in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: StdMutex<Vec<InvocationRecord>>,
}

impl MemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of every record captured so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn records(&self) -> Vec<InvocationRecord> {
        self.records.lock().expect("audit records poisoned").clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, record: &InvocationRecord) -> AuditResult<()> {
        self.records
            .lock()
            .expect("audit records poisoned")
            .push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::record::Outcome;

    #[tokio::test]
    async fn file_sink_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit").join("calls.jsonl");

        let sink = FileAuditSink::open(&path).await.unwrap();
        for outcome in [Outcome::Allowed, Outcome::Denied] {
            let record = InvocationRecord::new("sheets", "list_sheets", Duration::ZERO, outcome);
            sink.record(&record).await.unwrap();
        }
        drop(sink);

        let reopened = FileAuditSink::open(&path).await.unwrap();
        let record =
            InvocationRecord::new("sheets", "list_sheets", Duration::ZERO, Outcome::Errored);
        reopened.record(&record).await.unwrap();

        let data = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<InvocationRecord> = data
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1].outcome(), Outcome::Denied);
        assert_eq!(lines[2].outcome(), Outcome::Errored);
    }

    #[tokio::test]
    async fn memory_sink_collects() {
        let sink = MemoryAuditSink::new();
        let record = InvocationRecord::new("a", "b", Duration::ZERO, Outcome::Allowed);
        sink.record(&record).await.unwrap();
        assert_eq!(sink.records(), vec![record]);
    }
}
