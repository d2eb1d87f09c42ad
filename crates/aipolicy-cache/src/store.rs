//! Durable snapshots of cache entries.
//!
//! A snapshot is the JSON envelope `{ "data": ..., "timestamp": <epoch ms> }`
//! so a later session can hydrate before the first network round-trip.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub data: serde_json::Value,
    /// Milliseconds since the Unix epoch at which `data` was fetched.
    pub timestamp: i64,
}

/// Key-value persistence for snapshots. Implementations must tolerate
/// concurrent callers.
pub trait SnapshotStore: Send + Sync {
    /// Returns `Ok(None)` when no snapshot exists for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the snapshot exists but cannot be read or
    /// decoded.
    fn load(&self, key: &str) -> Result<Option<Envelope>, StoreError>;

    /// # Errors
    ///
    /// Returns [`StoreError`] if the snapshot cannot be written.
    fn save(&self, key: &str, envelope: &Envelope) -> Result<(), StoreError>;

    /// Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if an existing snapshot cannot be deleted.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Stores each key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_owned()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self, key: &str) -> Result<Option<Envelope>, StoreError> {
        let path = self.path_for(key)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&path, e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Serialize {
                key: key.to_owned(),
                source,
            })
    }

    fn save(&self, key: &str, envelope: &Envelope) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir).map_err(|e| io_error(&self.dir, e))?;

        let bytes = serde_json::to_vec(envelope).map_err(|source| StoreError::Serialize {
            key: key.to_owned(),
            source,
        })?;

        // Write-then-rename so a crash never leaves a truncated snapshot.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes).map_err(|e| io_error(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| io_error(&path, e))
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path, e)),
        }
    }
}

/// Process-local store, for tests and for running without a cache dir.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    snapshots: Mutex<HashMap<String, Envelope>>,
}

impl MemorySnapshotStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self, key: &str) -> Result<Option<Envelope>, StoreError> {
        Ok(self
            .snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn save(&self, key: &str, envelope: &Envelope) -> Result<(), StoreError> {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), envelope.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn envelope() -> Envelope {
        Envelope {
            data: json!({ "countries": ["Kenya"] }),
            timestamp: 1_700_000_000_000,
        }
    }

    #[test]
    fn file_store_saves_and_loads() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("nested"));

        assert_eq!(store.load("countries").unwrap(), None);
        store.save("countries", &envelope()).unwrap();
        assert_eq!(store.load("countries").unwrap(), Some(envelope()));
        assert!(dir.path().join("nested/countries.json").exists());
    }

    #[test]
    fn file_store_writes_the_envelope_shape() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path());
        store.save("cached_stats", &envelope()).unwrap();

        let raw = fs::read_to_string(dir.path().join("cached_stats.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["timestamp"], 1_700_000_000_000_i64);
        assert_eq!(value["data"]["countries"][0], "Kenya");
    }

    #[test]
    fn file_store_remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path());
        store.save("k", &envelope()).unwrap();
        store.remove("k").unwrap();
        store.remove("k").unwrap();
        assert_eq!(store.load("k").unwrap(), None);
    }

    #[test]
    fn file_store_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path());
        assert!(matches!(
            store.save("../escape", &envelope()),
            Err(StoreError::InvalidKey(_))
        ));
        assert!(matches!(store.load(""), Err(StoreError::InvalidKey(_))));
    }

    #[test]
    fn file_store_reports_corrupt_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("countries.json"), "{not json").unwrap();
        let store = FileSnapshotStore::new(dir.path());
        assert!(matches!(
            store.load("countries"),
            Err(StoreError::Serialize { .. })
        ));
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemorySnapshotStore::new();
        assert!(store.is_empty());
        store.save("k", &envelope()).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.load("k").unwrap(), Some(envelope()));
        store.remove("k").unwrap();
        assert!(store.is_empty());
    }
}
