//! Behaviour Log
//!
//! Append-only durable store of finalized behaviour records. The layout
//! is a single human-readable JSON array, rewritten on every append
//! (read-modify-write). Corrupt existing content is discarded rather than
//! failing the append: durability of future entries matters more than
//! unreadable history.
//!
//! No concurrent-writer protection is provided; callers run one cycle per
//! persona at a time.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

use crate::error::{Result, TrackerError};
use crate::state::BehaviorRecord;

const LOG_FILE: &str = "behavior_log.json";

/// Durable JSON-array log of behaviour records
pub struct BehaviorLog {
    path: PathBuf,
}

impl BehaviorLog {
    /// Log stored under `data_dir`, created if missing.
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir).map_err(TrackerError::Persistence)?;
        Ok(Self {
            path: data_dir.join(LOG_FILE),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record and rewrite the log.
    pub async fn append(&self, record: &BehaviorRecord) -> Result<()> {
        let mut records = self.read_all().await?;
        records.push(record.clone());

        let body = serde_json::to_vec_pretty(&records)
            .map_err(|e| TrackerError::Persistence(e.into()))?;
        fs::write(&self.path, body)
            .await
            .map_err(TrackerError::Persistence)?;

        info!("Behaviour log: {} records ({})", records.len(), self.path.display());
        Ok(())
    }

    /// Read the current log. Missing file means an empty log; unreadable
    /// content is dropped with a warning.
    pub async fn read_all(&self) -> Result<Vec<BehaviorRecord>> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(TrackerError::Persistence(e)),
        };

        match serde_json::from_str(&raw) {
            Ok(records) => Ok(records),
            Err(e) => {
                warn!("Discarding corrupt behaviour log {}: {}", self.path.display(), e);
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample(activity: &str) -> BehaviorRecord {
        BehaviorRecord {
            start: "10:00".into(),
            end: "11:00".into(),
            activity: activity.into(),
            cause: "felt like it".into(),
            mood: "calm".into(),
            notes: String::new(),
        }
    }

    #[tokio::test]
    async fn test_sequential_appends_preserve_order() {
        let dir = TempDir::new().unwrap();
        let log = BehaviorLog::new(dir.path()).unwrap();

        log.append(&sample("reading")).await.unwrap();
        log.append(&sample("coding")).await.unwrap();
        log.append(&sample("napping")).await.unwrap();

        let records = log.read_all().await.unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].activity, "reading");
        assert_eq!(records[2].activity, "napping");
    }

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let dir = TempDir::new().unwrap();
        let log = BehaviorLog::new(dir.path()).unwrap();
        assert!(log.read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_log_discarded_on_append() {
        let dir = TempDir::new().unwrap();
        let log = BehaviorLog::new(dir.path()).unwrap();

        tokio::fs::write(log.path(), "not json {{{").await.unwrap();

        log.append(&sample("coding")).await.unwrap();

        let records = log.read_all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].activity, "coding");
    }

    #[tokio::test]
    async fn test_record_fields_survive_roundtrip() {
        let dir = TempDir::new().unwrap();
        let log = BehaviorLog::new(dir.path()).unwrap();

        let record = BehaviorRecord {
            start: "14:30".into(),
            end: "15:00".into(),
            activity: "coding".into(),
            cause: "deadline".into(),
            mood: "focused".into(),
            notes: "pair session".into(),
        };
        log.append(&record).await.unwrap();

        let records = log.read_all().await.unwrap();
        assert_eq!(records[0], record);
    }
}
