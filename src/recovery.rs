//! Side channel for snapshots that could not be persisted.
//!
//! When reconciliation fails the full parsed snapshot is handed to a
//! [`FailureSink`] so it can be inspected and replayed by hand
//! (`pinball replay <file>`).

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};

use crate::error::SinkError;
use crate::leaderboard::Snapshot;

#[async_trait]
pub trait FailureSink: Send + Sync {
    async fn persist(&self, snapshot: &Snapshot) -> Result<(), SinkError>;
}

/// `failed-scores-<ISO-8601>.json` with `:` and `.` turned into `-`.
pub fn artifact_file_name(at: DateTime<Utc>) -> String {
    let stamp = at
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("failed-scores-{stamp}.json")
}

/// Read a recovery artifact back into a snapshot.
pub async fn load_artifact(path: &Path) -> Result<Snapshot, SinkError> {
    let raw = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&raw)?)
}

/// Writes each failed snapshot to its own timestamped JSON file.
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `body` under a fresh name derived from `at`; never replaces an
    /// existing artifact.
    async fn write_new(&self, at: DateTime<Utc>, body: &[u8]) -> Result<PathBuf, SinkError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let base = artifact_file_name(at);
        let stem = base.trim_end_matches(".json");

        let mut attempt = 0u32;
        loop {
            let name = if attempt == 0 {
                base.clone()
            } else {
                format!("{stem}-{attempt}.json")
            };
            let path = self.dir.join(name);
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => {
                    write_or_discard(&path, file, body).await?;
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Fill a freshly created artifact; the file is removed again if writing or
/// flushing fails so no truncated snapshot is left for replay.
async fn write_or_discard<W>(path: &Path, mut out: W, body: &[u8]) -> Result<(), SinkError>
where
    W: AsyncWrite + Unpin,
{
    let written: std::io::Result<()> = async {
        out.write_all(body).await?;
        out.flush().await
    }
    .await;

    if let Err(e) = written {
        drop(out);
        if let Err(rm) = tokio::fs::remove_file(path).await {
            warn!(path = %path.display(), error = %rm, "failed to remove partial artifact");
        }
        return Err(e.into());
    }
    Ok(())
}

#[async_trait]
impl FailureSink for FileSink {
    async fn persist(&self, snapshot: &Snapshot) -> Result<(), SinkError> {
        let body = serde_json::to_vec_pretty(snapshot)?;
        let path = self.write_new(Utc::now(), &body).await?;
        info!(path = %path.display(), games = snapshot.len(), "saved unpersisted scores for replay");
        Ok(())
    }
}

/// Keeps failed snapshots in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    snapshots: Mutex<Vec<Snapshot>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.snapshots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl FailureSink for MemorySink {
    async fn persist(&self, snapshot: &Snapshot) -> Result<(), SinkError> {
        let mut guard = self
            .snapshots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.push(snapshot.clone());
        Ok(())
    }
}
