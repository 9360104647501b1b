// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only JSONL sink for operational proxy events.
//!
//! One JSON object per line. Writes are serialized by a lock and use an
//! open-append-close cycle per record; write volume is low relative to
//! request volume.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde_json::Value;
use tokio::sync::Mutex;

/// Severity for event-log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
        }
    }
}

/// Structured JSONL writer for operational proxy events.
pub struct EventLogger {
    path: PathBuf,
    lock: Mutex<()>,
}

impl EventLogger {
    pub fn new(auth_dir: &Path) -> Self {
        Self { path: auth_dir.join("rr_proxy_v2.events.jsonl"), lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record. `fields` must be a JSON object; its entries are
    /// merged after the envelope keys and may shadow them.
    pub async fn write(&self, level: LogLevel, event: &str, message: &str, fields: Value) {
        let mut record = serde_json::Map::new();
        record.insert(
            "ts".to_owned(),
            Value::String(humantime::format_rfc3339_millis(SystemTime::now()).to_string()),
        );
        record.insert("level".to_owned(), Value::String(level.as_str().to_owned()));
        record.insert("event".to_owned(), Value::String(event.to_owned()));
        record.insert("message".to_owned(), Value::String(message.to_owned()));
        if let Value::Object(extra) = fields {
            for (key, value) in extra {
                record.insert(key, value);
            }
        }
        let Ok(mut line) = serde_json::to_string(&Value::Object(record)) else {
            return;
        };
        line.push('\n');

        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let Ok(mut file) =
            std::fs::OpenOptions::new().create(true).append(true).open(&self.path)
        else {
            tracing::warn!(path = %self.path.display(), "failed to open event log for append");
            return;
        };
        if let Err(e) = file.write_all(line.as_bytes()) {
            tracing::warn!(err = %e, "failed to append event log record");
        }
    }

    /// Read the last `limit` lines of the log (120 when `limit` is 0).
    pub fn tail(&self, limit: usize) -> Vec<String> {
        let limit = if limit == 0 { 120 } else { limit };
        let Ok(contents) = std::fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        let lines: Vec<String> = contents.lines().map(str::to_owned).collect();
        let skip = lines.len().saturating_sub(limit);
        lines.into_iter().skip(skip).collect()
    }
}

#[cfg(test)]
#[path = "event_log_tests.rs"]
mod tests;
