//! Caller-visible notices and their Server-Sent Events stream.
//!
//! Every notice goes three ways: into the [`RunLog`] of the run that raised
//! it (so the result can carry it back), onto the global broadcast channel
//! streamed at `/api/logs`, and out as a `tracing` event.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Log level for frontend display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A single notice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Nesting depth for display
    #[serde(default)]
    pub indent: u8,
}

impl LogEntry {
    pub fn info(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Info, message: message.into(), indent: 0 }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Success, message: message.into(), indent: 0 }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Warning, message: message.into(), indent: 0 }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Error, message: message.into(), indent: 0 }
    }

    pub fn with_indent(mut self, indent: u8) -> Self {
        self.indent = indent;
        self
    }
}

/// Global log broadcaster
pub static LOG_BROADCASTER: Lazy<LogBroadcaster> = Lazy::new(LogBroadcaster::new);

/// Broadcasts notices to all connected SSE clients
pub struct LogBroadcaster {
    sender: broadcast::Sender<LogEntry>,
}

impl LogBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    /// Trace the entry and send it to all subscribers
    pub fn log(&self, entry: LogEntry) {
        match entry.level {
            LogLevel::Info => tracing::info!(indent = entry.indent, "{}", entry.message),
            LogLevel::Success => {
                tracing::info!(indent = entry.indent, success = true, "{}", entry.message)
            }
            LogLevel::Warning => tracing::warn!(indent = entry.indent, "{}", entry.message),
            LogLevel::Error => tracing::error!(indent = entry.indent, "{}", entry.message),
        }

        // No receivers is fine
        let _ = self.sender.send(entry);
    }

    /// Get a receiver for SSE streaming
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// Notices raised during one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct RunLog {
    entries: Vec<LogEntry>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: LogEntry) {
        LOG_BROADCASTER.log(entry.clone());
        self.entries.push(entry);
    }

    pub fn info(&mut self, msg: impl Into<String>) {
        self.push(LogEntry::info(msg));
    }

    pub fn success(&mut self, msg: impl Into<String>) {
        self.push(LogEntry::success(msg));
    }

    pub fn warning(&mut self, msg: impl Into<String>) {
        self.push(LogEntry::warning(msg));
    }

    pub fn error(&mut self, msg: impl Into<String>) {
        self.push(LogEntry::error(msg));
    }

    pub fn info_indent(&mut self, msg: impl Into<String>, indent: u8) {
        self.push(LogEntry::info(msg).with_indent(indent));
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<LogEntry> {
        self.entries
    }
}

/// Notices outside any run (server start-up, request failures).
pub fn log_info(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::info(msg));
}

pub fn log_error(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::error(msg));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_log_collects_in_order() {
        let mut log = RunLog::new();
        log.info("Detected delimiter: ','");
        log.warning("Excluded 1 negative-amount rows");
        log.info_indent("Smith: 3 rows", 1);

        let entries = log.into_entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].level, LogLevel::Warning);
        assert_eq!(entries[2].indent, 1);
    }

    #[test]
    fn test_run_log_broadcasts() {
        let mut rx = LOG_BROADCASTER.subscribe();
        let mut log = RunLog::new();
        log.success("broadcast check");

        // Other tests may broadcast concurrently; look for ours.
        let mut found = false;
        loop {
            match rx.try_recv() {
                Ok(entry) => found |= entry.message == "broadcast check",
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        assert!(found);
    }

    #[test]
    fn test_entry_json_shape() {
        let json = serde_json::to_value(LogEntry::warning("x").with_indent(2)).unwrap();
        assert_eq!(json["level"], "warning");
        assert_eq!(json["indent"], 2);
    }
}
