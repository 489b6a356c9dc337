//! Run-state persistence — atomic JSON files under a state directory.
//!
//! The aggregator needs the prior run's snapshot across invocations, and the
//! adjudication gateway persists its verdict cache so unchanged findings are
//! never re-consulted. Both are plain JSON files written with the
//! write-tmp-then-rename pattern so a crash mid-write never corrupts state.
//! The snapshot JSON schema is a compatibility contract: field names are
//! stable serde names.

use crate::error::StoreError;
use std::path::{Path, PathBuf};

/// A single JSON-backed state file.
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load and deserialize the file. Returns `Ok(None)` if it doesn't exist.
    pub fn load<T: serde::de::DeserializeOwned>(&self) -> Result<Option<T>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&self.path)?;
        let value = serde_json::from_str(&data).map_err(|e| StoreError::Corrupt {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(Some(value))
    }

    /// Serialize and atomically write the value.
    ///
    /// Writes to a `.tmp` sibling, then renames onto the target path.
    /// Creates parent directories if they don't exist.
    pub fn save<T: serde::Serialize>(&self, value: &T) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(value).map_err(|e| StoreError::Corrupt {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json.as_bytes())?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// The directory holding all cross-run state for one analyzed project.
#[derive(Debug, Clone)]
pub struct StateDir {
    root: PathBuf,
}

impl StateDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store for the most recent sealed snapshot.
    pub fn snapshot_store(&self) -> JsonStore {
        JsonStore::new(self.root.join("snapshot.json"))
    }

    /// Store for the oracle verdict cache.
    pub fn verdict_cache_store(&self) -> JsonStore {
        JsonStore::new(self.root.join("verdicts.json"))
    }
}
