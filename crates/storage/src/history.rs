use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

pub const RECEIPTS_LOG: &str = "receipts.jsonl";
pub const BILLS_LOG: &str = "bills.jsonl";

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("History IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to serialize history record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One line of a history log: the stored payload plus when it was recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord<T> {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub data: T,
}

/// Append-only, line-delimited JSON log of one record type.
#[derive(Debug, Clone)]
pub struct HistoryLog<T> {
    path: PathBuf,
    _record: PhantomData<fn() -> T>,
}

impl<T> HistoryLog<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: PathBuf) -> Self {
        Self { path, _record: PhantomData }
    }

    /// Log named `file_name` inside `dir`.
    pub fn in_dir(dir: &Path, file_name: &str) -> Self {
        Self::new(dir.join(file_name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> HistoryError {
        HistoryError::Io { path: self.path.clone(), source }
    }

    /// Stamp `data` with the current time and append it as a single line.
    pub async fn append(&self, data: T) -> Result<HistoryRecord<T>, HistoryError> {
        self.append_at(Utc::now(), data).await
    }

    pub async fn append_at(
        &self,
        timestamp: DateTime<Utc>,
        data: T,
    ) -> Result<HistoryRecord<T>, HistoryError> {
        let record = HistoryRecord { timestamp, data };
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_err(e))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.io_err(e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| self.io_err(e))?;
        file.flush().await.map_err(|e| self.io_err(e))?;

        tracing::debug!(path = %self.path.display(), "Appended history record");
        Ok(record)
    }

    /// All records, newest first. A missing log is empty; unreadable lines are skipped.
    pub async fn list(&self) -> Result<Vec<HistoryRecord<T>>, HistoryError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(self.io_err(e)),
        };

        let mut records: Vec<HistoryRecord<T>> = content
            .lines()
            .enumerate()
            .filter(|(_, l)| !l.trim().is_empty())
            .filter_map(|(n, l)| match serde_json::from_str(l) {
                Ok(r) => Some(r),
                Err(e) => {
                    tracing::warn!(
                        "Skipping malformed history line {} in {}: {e}",
                        n + 1,
                        self.path.display()
                    );
                    None
                }
            })
            .collect();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Reading {
        units: f64,
        bill_amount: f64,
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[tokio::test]
    async fn missing_log_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log: HistoryLog<Reading> = HistoryLog::in_dir(dir.path(), BILLS_LOG);
        assert!(log.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn records_are_one_per_line_and_flat() {
        let dir = tempfile::tempdir().unwrap();
        let log = HistoryLog::in_dir(&dir.path().join("nested"), BILLS_LOG);
        log.append(Reading { units: 250.0, bill_amount: 845.0 }).await.unwrap();
        log.append(Reading { units: 10.0, bill_amount: 50.0 }).await.unwrap();

        let raw = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["units"], 250.0);
        assert!(first["timestamp"].is_string());
    }

    #[tokio::test]
    async fn list_sorts_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let log = HistoryLog::in_dir(dir.path(), BILLS_LOG);
        log.append_at(at(200), Reading { units: 2.0, bill_amount: 0.0 }).await.unwrap();
        log.append_at(at(100), Reading { units: 1.0, bill_amount: 0.0 }).await.unwrap();
        log.append_at(at(300), Reading { units: 3.0, bill_amount: 0.0 }).await.unwrap();

        let units: Vec<f64> = log.list().await.unwrap().iter().map(|r| r.data.units).collect();
        assert_eq!(units, vec![3.0, 2.0, 1.0]);
    }

    #[tokio::test]
    async fn malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let log: HistoryLog<Reading> = HistoryLog::in_dir(dir.path(), BILLS_LOG);
        log.append_at(at(5), Reading { units: 7.0, bill_amount: 1.0 }).await.unwrap();
        let mut raw = std::fs::read_to_string(log.path()).unwrap();
        raw.push_str("{not json\n\n");
        std::fs::write(log.path(), raw).unwrap();

        let records = log.list().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].timestamp, at(5));
    }
}
