//! Line-delimited JSON sinks
//!
//! The output artifact and the attribution log are both append-only
//! JSONL files, opened and flushed per write. Single writer per file.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{HarvestError, Result};

/// Append-only JSONL file, one serialized value per line.
pub struct JsonlSink {
    path: PathBuf,
    lines_written: u64,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lines_written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    /// Appends one value as a JSON line and flushes.
    pub async fn append<T: Serialize>(&mut self, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| {
                HarvestError::StorageError(format!(
                    "failed to open {}: {}",
                    self.path.display(),
                    e
                ))
            })?;

        file.write_all(json.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;

        self.lines_written += 1;
        debug!(path = %self.path.display(), lines = self.lines_written, "Appended record");
        Ok(())
    }

    /// Appends a batch in order.
    pub async fn append_all<T: Serialize>(&mut self, values: &[T]) -> Result<()> {
        for value in values {
            self.append(value).await?;
        }
        Ok(())
    }
}
