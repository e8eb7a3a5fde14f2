//! Persisted state: one JSON blob holding tasks (with their reminders), cached daily plans, and
//! the productivity profile.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::planner::DailyPlan;
use crate::profile::ProductivityProfile;
use crate::task::Task;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub daily_plans: BTreeMap<NaiveDate, DailyPlan>,
    #[serde(default)]
    pub profile: ProductivityProfile,
}

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            tasks: Vec::new(),
            daily_plans: BTreeMap::new(),
            profile: ProductivityProfile::default(),
        }
    }
}

impl Snapshot {
    pub fn encode(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decode a stored blob. Malformed data is logged and treated as empty state.
    pub fn decode_or_default(blob: &str) -> Self {
        match serde_json::from_str(blob) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "stored state is malformed; starting empty");
                Self::default()
            }
        }
    }
}

/// Where the snapshot blob lives.
pub trait Storage {
    /// `Ok(None)` when nothing has been stored yet.
    fn read(&self) -> Result<Option<String>, StoreError>;
    fn write(&self, blob: &str) -> Result<(), StoreError>;
}

/// A single JSON file. Writes go to a sibling temp file and are renamed into place.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl Storage for FileStorage {
    fn read(&self) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_err(e)),
        }
    }

    fn write(&self, blob: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, blob).map_err(|e| self.io_err(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))?;
        Ok(())
    }
}

/// In-memory blob. Clones share the same slot, so a test can reopen a store on it.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    blob: Arc<Mutex<Option<String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blob(blob: impl Into<String>) -> Self {
        Self {
            blob: Arc::new(Mutex::new(Some(blob.into()))),
        }
    }

    pub fn blob(&self) -> Option<String> {
        self.blob.lock().map(|b| b.clone()).unwrap_or_default()
    }
}

impl Storage for MemoryStorage {
    fn read(&self) -> Result<Option<String>, StoreError> {
        Ok(self.blob())
    }

    fn write(&self, blob: &str) -> Result<(), StoreError> {
        if let Ok(mut slot) = self.blob.lock() {
            *slot = Some(blob.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_blob_is_empty_state() {
        let s = Snapshot::decode_or_default("{ not json");
        assert!(s.tasks.is_empty());
        assert_eq!(s.profile, ProductivityProfile::default());
    }

    #[test]
    fn missing_fields_default() {
        let s = Snapshot::decode_or_default("{}");
        assert_eq!(s, Snapshot::default());
    }

    #[test]
    fn file_storage_missing_file_reads_none() {
        let dir = tempfile::tempdir().unwrap();
        let fs = FileStorage::new(dir.path().join("state.json"));
        assert!(fs.read().unwrap().is_none());

        fs.write("{\"tasks\":[]}").unwrap();
        assert_eq!(fs.read().unwrap().as_deref(), Some("{\"tasks\":[]}"));
    }

    #[test]
    fn file_storage_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let fs = FileStorage::new(dir.path().join("nested").join("state.json"));
        fs.write("{}").unwrap();
        assert!(fs.path().exists());
    }
}
