//! core::log
//!
//! Per-attempt commit records and where they go.
//!
//! # Records
//!
//! Every scheduled publish produces one [`CommitLog`], successful or not.
//! Records are handed to a [`LogSink`]; sinks never fail the caller.
//!
//! # Sinks
//!
//! - [`TracingSink`]: emits each record as a `tracing` event
//! - [`MemorySink`]: keeps the newest records in memory (100 by default)
//! - [`JsonLinesSink`]: appends records to a file, one JSON object per line
//!
//! # Example
//!
//! ```
//! use autocommitter::core::content::ContentKind;
//! use autocommitter::core::log::{CommitLog, LogSink, MemorySink};
//!
//! let sink = MemorySink::new();
//! sink.record(&CommitLog::error("rate limited", ContentKind::Simple, None));
//! assert_eq!(sink.entries().len(), 1);
//! ```

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::content::ContentKind;
use super::types::CommitResult;

/// Records kept by a [`MemorySink`] unless configured otherwise.
pub const DEFAULT_LOG_CAPACITY: usize = 100;

/// Outcome of a logged attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Success,
    Error,
}

/// One attempt, as recorded by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitLog {
    pub id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Commit sha, empty for failed attempts
    pub sha: String,
    pub status: LogStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "type")]
    pub kind: ContentKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
}

impl CommitLog {
    /// Record of a published commit.
    pub fn success(result: &CommitResult, kind: ContentKind, repository: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            message: result.message(),
            timestamp: Utc::now(),
            sha: result.sha.clone(),
            status: LogStatus::Success,
            url: Some(result.url.clone()),
            kind,
            repository,
        }
    }

    /// Record of a failed attempt.
    pub fn error(message: impl Into<String>, kind: ContentKind, repository: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            message: message.into(),
            timestamp: Utc::now(),
            sha: String::new(),
            status: LogStatus::Error,
            url: None,
            kind,
            repository,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == LogStatus::Success
    }
}

/// Running totals of scheduled attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BotStats {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
}

impl BotStats {
    pub fn record(&mut self, success: bool) {
        self.total += 1;
        if success {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
    }

    /// Rounded percentage of successful attempts; 100 before any attempt.
    pub fn success_rate(&self) -> u32 {
        if self.total == 0 {
            return 100;
        }
        ((self.successful as f64 / self.total as f64) * 100.0).round() as u32
    }
}

/// Destination for commit records.
pub trait LogSink: Send + Sync {
    fn record(&self, entry: &CommitLog);
}

/// Emits records as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn record(&self, entry: &CommitLog) {
        let repository = entry.repository.as_deref().unwrap_or("-");
        match entry.status {
            LogStatus::Success => tracing::info!(
                repository,
                kind = %entry.kind,
                sha = %entry.sha,
                url = entry.url.as_deref().unwrap_or(""),
                "{}",
                entry.message
            ),
            LogStatus::Error => tracing::error!(
                repository,
                kind = %entry.kind,
                "{}",
                entry.message
            ),
        }
    }
}

/// Keeps the newest records, newest first.
///
/// Clones share the buffer.
#[derive(Debug, Clone)]
pub struct MemorySink {
    capacity: usize,
    entries: Arc<Mutex<VecDeque<CommitLog>>>,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
        }
    }

    /// Stored records, newest first.
    pub fn entries(&self) -> Vec<CommitLog> {
        self.lock().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<CommitLog>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl LogSink for MemorySink {
    fn record(&self, entry: &CommitLog) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.lock();
        entries.push_front(entry.clone());
        entries.truncate(self.capacity);
    }
}

/// Appends records to a file as JSON lines.
///
/// Write failures are reported with `warn!` and otherwise ignored.
#[derive(Debug, Clone)]
pub struct JsonLinesSink {
    path: PathBuf,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn append(&self, entry: &CommitLog) -> std::io::Result<()> {
        let line = serde_json::to_string(entry)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)
    }
}

impl LogSink for JsonLinesSink {
    fn record(&self, entry: &CommitLog) {
        if let Err(err) = self.append(entry) {
            tracing::warn!(path = %self.path.display(), error = %err, "failed to write commit log");
        }
    }
}

/// Sends each record to several sinks.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn LogSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl LogSink for FanoutSink {
    fn record(&self, entry: &CommitLog) {
        for sink in &self.sinks {
            sink.record(entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result() -> CommitResult {
        CommitResult {
            sha: "abc123".into(),
            url: "https://github.com/o/r/commit/abc123".into(),
            retries: 0,
        }
    }

    #[test]
    fn stats_tally() {
        let mut stats = BotStats::default();
        assert_eq!(stats.success_rate(), 100);
        stats.record(true);
        stats.record(true);
        stats.record(false);
        assert_eq!(
            stats,
            BotStats {
                total: 3,
                successful: 2,
                failed: 1
            }
        );
        assert_eq!(stats.success_rate(), 67);
    }

    #[test]
    fn memory_sink_is_bounded_newest_first() {
        let sink = MemorySink::with_capacity(3);
        for i in 0..5 {
            sink.record(&CommitLog::error(format!("e{}", i), ContentKind::Simple, None));
        }
        let messages: Vec<_> = sink.entries().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["e4", "e3", "e2"]);
    }

    #[test]
    fn default_capacity() {
        let sink = MemorySink::new();
        for _ in 0..150 {
            sink.record(&CommitLog::error("x", ContentKind::Simple, None));
        }
        assert_eq!(sink.entries().len(), DEFAULT_LOG_CAPACITY);
    }

    #[test]
    fn record_wire_shape() {
        let entry = CommitLog::success(&result(), ContentKind::Readme, Some("o/r".into()));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["type"], "readme");
        assert_eq!(json["sha"], "abc123");
        assert_eq!(json["repository"], "o/r");

        let entry = CommitLog::error("boom", ContentKind::Simple, None);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["status"], "error");
        assert!(json.get("url").is_none());
        assert!(json.get("repository").is_none());
    }

    #[test]
    fn json_lines_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("commits.jsonl");
        let sink = JsonLinesSink::new(&path);

        sink.record(&CommitLog::success(&result(), ContentKind::Simple, None));
        sink.record(&CommitLog::error("boom", ContentKind::Simple, None));

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<CommitLog> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].is_success());
        assert!(!lines[1].is_success());
    }

    #[test]
    fn fanout_reaches_every_sink() {
        let a = MemorySink::new();
        let b = MemorySink::new();
        let fanout = FanoutSink::new()
            .with(Arc::new(a.clone()))
            .with(Arc::new(b.clone()));
        fanout.record(&CommitLog::error("x", ContentKind::Code, None));
        assert_eq!(a.entries().len(), 1);
        assert_eq!(b.entries().len(), 1);
    }
}
