//! Append-only feedback log.
//!
//! Each [`FeedbackRecorder::record`] call reads the whole JSON array, appends
//! one entry and rewrites the file. A `tokio::sync::Mutex` serializes the
//! cycle so concurrent submissions never overwrite each other. The new
//! contents are written to a sibling temp file and renamed into place, so a
//! reader never sees a half-written log.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::models::FeedbackEntry;

pub const ACK_MESSAGE: &str = "Feedback recorded.";

/// Aggregate counts over the feedback log.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeedbackStats {
    pub total: usize,
    pub correct: usize,
    pub incorrect: usize,
}

pub struct FeedbackRecorder {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FeedbackRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a judgment and return the entry as persisted.
    pub async fn record(
        &self,
        question: &str,
        answer: &str,
        correct: bool,
    ) -> Result<FeedbackEntry> {
        let _guard = self.lock.lock().await;

        // Stamped under the lock so file order and timestamp order agree.
        let entry = FeedbackEntry {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            question: question.to_string(),
            answer: answer.to_string(),
            correct,
        };
        let mut entries = read_log(&self.path).await?;
        entries.push(entry.clone());
        write_log(&self.path, &entries).await?;

        tracing::info!(correct, total = entries.len(), "feedback recorded");
        Ok(entry)
    }

    /// All entries in insertion order.
    pub async fn entries(&self) -> Result<Vec<FeedbackEntry>> {
        let _guard = self.lock.lock().await;
        read_log(&self.path).await
    }

    pub async fn stats(&self) -> Result<FeedbackStats> {
        let entries = self.entries().await?;
        let correct = entries.iter().filter(|e| e.correct).count();
        Ok(FeedbackStats {
            total: entries.len(),
            correct,
            incorrect: entries.len() - correct,
        })
    }
}

async fn read_log(path: &Path) -> Result<Vec<FeedbackEntry>> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(Error::persistence(format!(
                "failed to read {}: {}",
                path.display(),
                e
            )))
        }
    };

    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    serde_json::from_str(&content)
        .map_err(|e| Error::persistence(format!("malformed log {}: {}", path.display(), e)))
}

async fn write_log(path: &Path, entries: &[FeedbackEntry]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            Error::persistence(format!("failed to create {}: {}", parent.display(), e))
        })?;
    }

    let json = serde_json::to_string_pretty(entries).map_err(Error::persistence)?;

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp_path, json).await.map_err(|e| {
        Error::persistence(format!("failed to write {}: {}", tmp_path.display(), e))
    })?;
    tokio::fs::rename(&tmp_path, path).await.map_err(|e| {
        Error::persistence(format!("failed to replace {}: {}", path.display(), e))
    })?;
    Ok(())
}
