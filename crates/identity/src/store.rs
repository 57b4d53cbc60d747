//! Local key-value persistence.
//!
//! The dashboard keeps a small amount of state outside the remote service:
//! the guest-mode identity record and the last route an unauthenticated
//! visitor tried to reach. A [`LocalStore`] is the moral equivalent of
//! browser local storage for a single-operator process: string values under
//! well-known keys, surviving restarts when backed by a file.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use thiserror::Error;

/// Well-known local store keys.
pub mod keys {
    /// Key for the persisted guest identity record.
    pub const GUEST_USER: &str = "guest_user";

    /// Key for the path to restore after a successful sign-in.
    pub const LAST_VISITED_ROUTE: &str = "lastVisitedRoute";
}

/// Errors from the local store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Reading or writing the backing storage failed.
    #[error("local store I/O error: {0}")]
    Io(String),
}

/// String key-value persistence for identity-adjacent local state.
///
/// Implementations must tolerate concurrent use from multiple handlers.
pub trait LocalStore: Send + Sync {
    /// Read the value under `key`, if present.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the backing storage cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the backing storage cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Delete the value under `key`. Deleting a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the backing storage cannot be written.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

// =============================================================================
// MemoryStore
// =============================================================================

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.lock().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.lock().remove(key);
        Ok(())
    }
}

// =============================================================================
// JsonFileStore
// =============================================================================

/// File-backed store: one JSON object of string entries on disk.
///
/// Reads tolerate a corrupt file by treating it as empty (it is rewritten
/// wholesale on the next `set`), so a damaged store degrades to "signed
/// out" rather than a hard failure.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles against the same file.
    lock: Mutex<()>,
}

impl JsonFileStore {
    /// Create a store backed by the JSON file at `path`.
    ///
    /// The file is created lazily on first write; the parent directory is
    /// created if missing.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn read_map(&self) -> Result<HashMap<String, String>, StoreError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(StoreError::Io(e.to_string())),
        };

        match serde_json::from_slice(&bytes) {
            Ok(map) => Ok(map),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "local store file is corrupt, treating as empty"
                );
                Ok(HashMap::new())
            }
        }
    }

    fn write_map(&self, map: &HashMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
        }

        let json = serde_json::to_string_pretty(map).map_err(|e| StoreError::Io(e.to_string()))?;
        std::fs::write(&self.path, json).map_err(|e| StoreError::Io(e.to_string()))
    }
}

impl LocalStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read_map()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut map = self.read_map()?;
        map.insert(key.to_owned(), value.to_owned());
        self.write_map(&map)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut map = self.read_map()?;
        if map.remove(key).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").unwrap(), None);

        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap(), Some("v".to_owned()));

        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn test_memory_store_remove_missing_key_is_ok() {
        let store = MemoryStore::new();
        assert!(store.remove("missing").is_ok());
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = std::env::temp_dir().join(format!("aduana-store-{}", std::process::id()));
        let path = dir.join("roundtrip.json");
        let _ = std::fs::remove_file(&path);

        let store = JsonFileStore::new(&path);
        assert_eq!(store.get(keys::GUEST_USER).unwrap(), None);

        store.set(keys::GUEST_USER, "{}").unwrap();
        assert_eq!(store.get(keys::GUEST_USER).unwrap(), Some("{}".to_owned()));

        // A second store over the same file sees the persisted value.
        let reopened = JsonFileStore::new(&path);
        assert_eq!(reopened.get(keys::GUEST_USER).unwrap(), Some("{}".to_owned()));

        store.remove(keys::GUEST_USER).unwrap();
        assert_eq!(store.get(keys::GUEST_USER).unwrap(), None);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_file_store_corrupt_file_treated_as_empty() {
        let dir = std::env::temp_dir().join(format!("aduana-store-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("corrupt.json");
        std::fs::write(&path, "not json at all{{{").unwrap();

        let store = JsonFileStore::new(&path);
        assert_eq!(store.get("anything").unwrap(), None);

        // Writing heals the file.
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap(), Some("v".to_owned()));

        let _ = std::fs::remove_file(&path);
    }
}
