//! Message Audit Log
//!
//! Append-only text record of every delivered message, one line per message:
//! `{rfc3339 timestamp}\t{user_id}\t{text}`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use lineecho_core::{EchoError, Result};

#[derive(Debug, Clone)]
pub struct MessageLogEntry {
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub text: String,
}

impl MessageLogEntry {
    pub fn new(user_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            user_id: user_id.into(),
            text: text.into(),
        }
    }

    /// Render as a single log line, newline included.
    pub fn to_line(&self) -> String {
        format!(
            "{}\t{}\t{}\n",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            escape(&self.user_id),
            escape(&self.text),
        )
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

/// Shared append-only log file. Never truncated.
pub struct MessageLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl MessageLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one timestamped line for `user_id`.
    pub async fn append_text(&self, user_id: &str, text: &str) -> Result<()> {
        self.append(&MessageLogEntry::new(user_id, text)).await
    }

    pub async fn append(&self, entry: &MessageLogEntry) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| EchoError::storage(parent, e))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| EchoError::storage(&self.path, e))?;

        file.write_all(entry.to_line().as_bytes())
            .await
            .map_err(|e| EchoError::storage(&self.path, e))?;
        file.flush()
            .await
            .map_err(|e| EchoError::storage(&self.path, e))?;

        debug!(path = %self.path.display(), user_id = %entry.user_id, "Appended message log line");
        Ok(())
    }
}
