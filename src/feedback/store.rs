//! JSON-lines feedback log
//!
//! One record per line in `feedback.jsonl`. Appends open the file in append
//! mode and sync before returning, so an acknowledged record survives a crash.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

use super::{FeedbackRecord, FeedbackStore};
use crate::error::{Error, Result};

const FEEDBACK_FILE: &str = "feedback.jsonl";

/// Append-only feedback log backed by a flat file
pub struct JsonlFeedbackStore {
    path: PathBuf,
    // Serializes appends against reads within this process
    lock: Mutex<()>,
}

impl JsonlFeedbackStore {
    /// Open (or create) the log inside `dir`
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| Error::storage(dir, e))?;
        Ok(Self {
            path: dir.join(FEEDBACK_FILE),
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|_| Error::storage(&self.path, "feedback lock poisoned"))
    }
}

impl FeedbackStore for JsonlFeedbackStore {
    fn append(&self, record: &FeedbackRecord) -> Result<()> {
        let mut line = serde_json::to_string(record).map_err(|e| Error::storage(&self.path, e))?;
        line.push('\n');

        let _guard = self.guard()?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::storage(&self.path, e))?;
        file.write_all(line.as_bytes())
            .and_then(|_| file.sync_data())
            .map_err(|e| Error::storage(&self.path, e))?;

        info!(
            "Recorded feedback: {} -> {} (model v{})",
            record.model_prediction, record.human_label, record.model_version
        );
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<FeedbackRecord>> {
        let _guard = self.guard()?;
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = std::fs::File::open(&self.path).map_err(|e| Error::storage(&self.path, e))?;
        let mut records = Vec::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| Error::storage(&self.path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            let record: FeedbackRecord = serde_json::from_str(&line)
                .map_err(|e| Error::storage(&self.path, format!("line {}: {}", idx + 1, e)))?;
            records.push(record);
        }

        debug!("Loaded {} feedback records", records.len());
        Ok(records)
    }
}
