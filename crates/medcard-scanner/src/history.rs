//! Bounded, persisted scan history.
//!
//! The whole list lives under one well-known key as a JSON array, newest
//! first. Every write replaces the full list, so a reader never observes a
//! partially updated history.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::result::ScanResult;

/// Storage key of the history list.
pub const HISTORY_KEY: &str = "medcard_scan_history";
/// Entries kept; older ones are evicted silently.
pub const HISTORY_LIMIT: usize = 20;

#[derive(thiserror::Error, Debug)]
pub enum HistoryError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Persist(#[from] tempfile::PersistError),
}

/// Durable string key/value storage.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, HistoryError>;
    /// Replace the value atomically.
    fn set(&mut self, key: &str, value: &str) -> Result<(), HistoryError>;
    fn remove(&mut self, key: &str) -> Result<(), HistoryError>;
}

/// In-memory store; lost with the process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, HistoryError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), HistoryError> {
        self.values.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), HistoryError> {
        self.values.remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per key inside a directory.
///
/// Writes go to a temporary file in the same directory which is then renamed
/// over the target.
#[derive(Clone, Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, HistoryError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), HistoryError> {
        std::fs::create_dir_all(&self.dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(value.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.path_for(key))?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), HistoryError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// One persisted scan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Creation time in milliseconds, bumped to stay strictly increasing.
    pub id: i64,
    pub result: ScanResult,
    pub timestamp: DateTime<Utc>,
}

pub struct HistoryStore {
    storage: Box<dyn KeyValueStore>,
    last_id: i64,
}

impl HistoryStore {
    pub fn new(storage: Box<dyn KeyValueStore>) -> Self {
        Self {
            storage,
            last_id: 0,
        }
    }

    /// File-backed history in `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self::new(Box::new(FileStore::new(dir)))
    }

    /// All entries, newest first.
    ///
    /// A corrupt stored list reads as empty; it is replaced on the next write.
    pub fn load(&self) -> Result<Vec<HistoryEntry>, HistoryError> {
        let Some(raw) = self.storage.get(HISTORY_KEY)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(entries) => Ok(entries),
            Err(err) => {
                log::warn!("discarding unreadable scan history: {err}");
                Ok(Vec::new())
            }
        }
    }

    pub fn len(&self) -> Result<usize, HistoryError> {
        Ok(self.load()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, HistoryError> {
        Ok(self.len()? == 0)
    }

    /// Prepend a snapshot of `result`, evict beyond [`HISTORY_LIMIT`], and
    /// write the whole list back.
    pub fn record(&mut self, result: &ScanResult) -> Result<HistoryEntry, HistoryError> {
        let mut entries = self.load()?;
        let newest = entries.first().map_or(0, |e| e.id);
        let id = result
            .captured_at
            .timestamp_millis()
            .max(self.last_id + 1)
            .max(newest + 1);

        let mut snapshot = result.clone();
        snapshot.location = None;
        let entry = HistoryEntry {
            id,
            result: snapshot,
            timestamp: result.captured_at,
        };
        entries.insert(0, entry.clone());
        entries.truncate(HISTORY_LIMIT);

        self.storage
            .set(HISTORY_KEY, &serde_json::to_string(&entries)?)?;
        self.last_id = id;
        log::debug!("history: recorded entry {id} ({} kept)", entries.len());
        Ok(entry)
    }

    pub fn clear(&mut self) -> Result<(), HistoryError> {
        self.storage.remove(HISTORY_KEY)?;
        log::info!("history cleared");
        Ok(())
    }

    /// Standalone pretty JSON document of the full history.
    pub fn export_json(&self) -> Result<String, HistoryError> {
        Ok(serde_json::to_string_pretty(&self.load()?)?)
    }

    /// Write the export into `dir` under a date-stamped name.
    pub fn export_to_dir(
        &self,
        dir: impl AsRef<Path>,
        date: NaiveDate,
    ) -> Result<PathBuf, HistoryError> {
        let path = dir.as_ref().join(export_file_name(date));
        std::fs::write(&path, self.export_json()?)?;
        log::info!("history exported to {}", path.display());
        Ok(path)
    }

    /// [`export_to_dir`](Self::export_to_dir) stamped with
    /// [`local_export_date`].
    pub fn export_today(&self, dir: impl AsRef<Path>) -> Result<PathBuf, HistoryError> {
        self.export_to_dir(dir, local_export_date())
    }
}

/// Date stamp for exports: the user's local calendar date, not UTC.
pub fn local_export_date() -> NaiveDate {
    Local::now().date_naive()
}

/// `medcard-scan-history-YYYY-MM-DD.json`
pub fn export_file_name(date: NaiveDate) -> String {
    format!("medcard-scan-history-{}.json", date.format("%Y-%m-%d"))
}
