//! SQLite-backed feedback log
//!
//! The table is only ever inserted into; the autoincrement id gives the
//! append order.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

use super::{FeedbackRecord, FeedbackStore};
use crate::error::{Error, Result};

const FEEDBACK_DB: &str = "feedback.db";

/// Append-only feedback log stored in SQLite
pub struct SqliteFeedbackStore {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteFeedbackStore {
    /// Open (or create) `feedback.db` inside `dir`
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| Error::storage(dir, e))?;
        let path = dir.join(FEEDBACK_DB);

        let conn = Connection::open(&path).map_err(|e| Error::storage(&path, e))?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=FULL;

            CREATE TABLE IF NOT EXISTS feedback (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                text TEXT NOT NULL,
                model_prediction TEXT NOT NULL,
                human_label TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                model_version INTEGER NOT NULL
            );
            "#,
        )
        .map_err(|e| Error::storage(&path, e))?;

        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::storage(&self.path, "feedback connection poisoned"))
    }
}

impl FeedbackStore for SqliteFeedbackStore {
    fn append(&self, record: &FeedbackRecord) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"INSERT INTO feedback (text, model_prediction, human_label, timestamp, model_version)
               VALUES (?1, ?2, ?3, ?4, ?5)"#,
            params![
                record.text,
                record.model_prediction.as_str(),
                record.human_label.as_str(),
                record.timestamp.to_rfc3339(),
                record.model_version,
            ],
        )
        .map_err(|e| Error::storage(&self.path, e))?;

        info!(
            "Recorded feedback: {} -> {} (model v{})",
            record.model_prediction, record.human_label, record.model_version
        );
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<FeedbackRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT text, model_prediction, human_label, timestamp, model_version
                 FROM feedback ORDER BY id ASC",
            )
            .map_err(|e| Error::storage(&self.path, e))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, u32>(4)?,
                ))
            })
            .map_err(|e| Error::storage(&self.path, e))?;

        let mut records = Vec::new();
        for row in rows {
            let (text, predicted, human, timestamp, model_version) =
                row.map_err(|e| Error::storage(&self.path, e))?;
            let timestamp = DateTime::parse_from_rfc3339(&timestamp)
                .map_err(|e| Error::storage(&self.path, e))?
                .with_timezone(&Utc);
            records.push(FeedbackRecord {
                text,
                model_prediction: predicted.parse().map_err(|e| Error::storage(&self.path, e))?,
                human_label: human.parse().map_err(|e| Error::storage(&self.path, e))?,
                timestamp,
                model_version,
            });
        }

        debug!("Loaded {} feedback records", records.len());
        Ok(records)
    }
}
