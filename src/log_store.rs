use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

/// One symbol's result within a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockRecord {
    pub company: String,
    pub symbol: String,
    pub price: Option<f64>,
    pub currency: String,
    pub percent_change: Option<f64>,
}

/// Everything one cycle produced, stamped with the cycle start time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub stocks: Vec<StockRecord>,
}

/// The run's log, mirrored to a JSON file after every cycle.
pub struct LogStore {
    path: PathBuf,
    entries: Vec<LogEntry>,
    pending: Option<JoinHandle<()>>,
}

impl LogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Vec::new(),
            pending: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn append(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    /// Writes the whole log in the background. Failures are logged only; the
    /// next call rewrites the file from memory anyway.
    pub async fn persist(&mut self) {
        // keep writes in order
        self.flush().await;

        let bytes = match serde_json::to_vec_pretty(&self.entries) {
            Ok(bytes) => bytes,
            Err(why) => {
                tracing::error!(error = %why, "failed to serialize daily log");
                return;
            }
        };

        let path = self.path.clone();
        self.pending = Some(tokio::spawn(async move {
            if let Err(why) = tokio::fs::write(&path, bytes).await {
                tracing::error!(path = %path.display(), error = %why, "failed to write daily log");
            }
        }));
    }

    /// Waits for an outstanding write, if any.
    pub async fn flush(&mut self) {
        if let Some(handle) = self.pending.take() {
            if let Err(why) = handle.await {
                tracing::error!(error = %why, "daily log writer task failed");
            }
        }
    }

    /// Deletes the backing file so the next run starts fresh.
    pub async fn clear(&mut self) {
        self.flush().await;

        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => tracing::info!(path = %self.path.display(), "daily log removed"),
            Err(why) if why.kind() == ErrorKind::NotFound => {}
            Err(why) => {
                tracing::error!(path = %self.path.display(), error = %why, "failed to remove daily log")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn entry(price: Option<f64>) -> LogEntry {
        LogEntry {
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            stocks: vec![StockRecord {
                company: "Apple".into(),
                symbol: "AAPL".into(),
                price,
                currency: "USD".into(),
                percent_change: price.map(|_| 0.0),
            }],
        }
    }

    #[test]
    fn serializes_wire_names() {
        let json = serde_json::to_value(entry(None)).unwrap();
        let stock = &json["stocks"][0];

        assert!(json["timestamp"].is_string());
        assert!(stock["price"].is_null());
        assert!(stock["percentChange"].is_null());
        assert_eq!(stock["company"], "Apple");
    }

    #[tokio::test]
    async fn persisted_file_matches_memory() {
        let dir = tempdir().unwrap();
        let mut store = LogStore::new(dir.path().join("log.json"));

        store.append(entry(Some(1.0)));
        store.persist().await;
        store.append(entry(None));
        store.persist().await;
        store.flush().await;

        let bytes = std::fs::read(store.path()).unwrap();
        let on_disk: Vec<LogEntry> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(on_disk, store.entries());
    }

    #[tokio::test]
    async fn write_failure_keeps_entries() {
        let dir = tempdir().unwrap();
        let mut store = LogStore::new(dir.path().join("missing").join("log.json"));

        store.append(entry(Some(1.0)));
        store.persist().await;
        store.flush().await;

        assert_eq!(store.entries().len(), 1);
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn clear_removes_file_and_tolerates_missing() {
        let dir = tempdir().unwrap();
        let mut store = LogStore::new(dir.path().join("log.json"));

        store.append(entry(Some(1.0)));
        store.persist().await;
        store.clear().await;
        assert!(!store.path().exists());

        store.clear().await;
    }
}
