//! Store implementation
//!
//! Layout on disk:
//!
//! ```text
//! <root>/
//!   plans/<id>.json       one record per file
//!   patterns/<sig>.json
//!   queue.json            named lists (save_list/load_list)
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use crate::record::Record;

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error for {id}: {source}")]
    Serialize {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid record id: {0:?}")]
    InvalidId(String),
}

/// File-backed record store
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    /// Open a store rooted at the given directory, creating it if needed
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|source| StoreError::Io {
            path: root.clone(),
            source,
        })?;
        debug!(root = %root.display(), "Store opened");
        Ok(Self { root })
    }

    /// Root directory of this store
    pub fn root(&self) -> &Path {
        &self.root
    }

    // === Canonical record operations (collection from Record impl) ===

    /// Write a record to its canonical collection
    pub fn put<R: Record>(&self, record: &R) -> Result<(), StoreError> {
        self.put_in(R::collection_name(), record.id(), record)
    }

    /// Read a record from its canonical collection
    pub fn get<R: Record>(&self, id: &str) -> Result<Option<R>, StoreError> {
        self.get_in(R::collection_name(), id)
    }

    /// List every record in the canonical collection, skipping corrupt files
    pub fn list<R: Record>(&self) -> Result<Vec<R>, StoreError> {
        self.list_in(R::collection_name())
    }

    /// Delete a record from its canonical collection
    pub fn delete<R: Record>(&self, id: &str) -> Result<bool, StoreError> {
        self.delete_in(R::collection_name(), id)
    }

    // === Explicit-collection operations ===
    //
    // For callers that key records off-canonically, e.g. the pattern
    // library storing Plans under "patterns" keyed by signature.

    /// Write a value into an explicit collection under an explicit key
    pub fn put_in<T: Serialize>(&self, collection: &str, id: &str, value: &T) -> Result<(), StoreError> {
        let path = self.record_path(collection, id)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let json = serde_json::to_string_pretty(value).map_err(|source| StoreError::Serialize {
            id: id.to_string(),
            source,
        })?;

        fs::write(&path, json).map_err(|source| StoreError::Io { path, source })?;
        Ok(())
    }

    /// Read a value from an explicit collection
    pub fn get_in<T: DeserializeOwned>(&self, collection: &str, id: &str) -> Result<Option<T>, StoreError> {
        let path = self.record_path(collection, id)?;
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;

        match serde_json::from_str(&content) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping corrupt record");
                Ok(None)
            }
        }
    }

    /// List every readable record in a collection
    ///
    /// Unreadable or unparsable files are skipped with a warning so a
    /// single corrupt record never blocks the rest of the collection.
    pub fn list_in<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>, StoreError> {
        let dir = self.root.join(collection);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;

        let mut records = Vec::new();
        for entry in entries {
            let Ok(entry) = entry else { continue };
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }

            let content = match fs::read_to_string(&path) {
                Ok(c) => c,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable record");
                    continue;
                }
            };

            match serde_json::from_str(&content) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping corrupt record");
                }
            }
        }

        Ok(records)
    }

    /// Delete a record from an explicit collection, returning whether it existed
    pub fn delete_in(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let path = self.record_path(collection, id)?;
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).map_err(|source| StoreError::Io { path, source })?;
        Ok(true)
    }

    // === Named list operations (queue snapshots, source contexts) ===

    /// Persist a list of values as one JSON array file
    pub fn save_list<T: Serialize>(&self, name: &str, items: &[T]) -> Result<(), StoreError> {
        let path = self.list_path(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let json = serde_json::to_string_pretty(items).map_err(|source| StoreError::Serialize {
            id: name.to_string(),
            source,
        })?;

        fs::write(&path, json).map_err(|source| StoreError::Io { path, source })?;
        Ok(())
    }

    /// Load a list saved with [`Store::save_list`]
    ///
    /// Corrupt elements are skipped individually; a missing or entirely
    /// unparsable file yields an empty list.
    pub fn load_list<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>, StoreError> {
        let path = self.list_path(name)?;
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;

        let raw: Vec<serde_json::Value> = match serde_json::from_str(&content) {
            Ok(v) => v,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "List file corrupt, starting empty");
                return Ok(Vec::new());
            }
        };

        let mut items = Vec::with_capacity(raw.len());
        for (idx, value) in raw.into_iter().enumerate() {
            match serde_json::from_value(value) {
                Ok(item) => items.push(item),
                Err(e) => {
                    warn!(path = %path.display(), idx, error = %e, "Skipping corrupt list entry");
                }
            }
        }

        Ok(items)
    }

    fn record_path(&self, collection: &str, id: &str) -> Result<PathBuf, StoreError> {
        validate_key(id)?;
        validate_key(collection)?;
        Ok(self.root.join(collection).join(format!("{}.json", id)))
    }

    fn list_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        validate_key(name)?;
        Ok(self.root.join(format!("{}.json", name)))
    }
}

/// Reject keys that would escape the store directory
fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty() || key.contains('/') || key.contains('\\') || key.contains("..") {
        return Err(StoreError::InvalidId(key.to_string()));
    }
    Ok(())
}
