//! Persistent key-value storage backing the session.
//!
//! The dashboard keeps two string entries, the raw token and the JSON user
//! record. They are always written and removed as a pair by the session
//! manager; the stores themselves know nothing about that pairing.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::StorageError;

pub const TOKEN_KEY: &str = "auth_token";
pub const USER_KEY: &str = "admin";
/// Path remembered by the route guard for the post-login return.
pub const REDIRECT_KEY: &str = "redirect_from";

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().map(|e| e.is_empty()).unwrap_or(true)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

/// JSON object on disk, re-read on every access so that another process
/// logging out is noticed by the next validity check.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()) }
    }

    /// `<config dir>/folio-auth/session.json`, falling back to the working
    /// directory when the platform has no config dir.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("folio-auth")
            .join("session.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, String>, StorageError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }
        match serde_json::from_str(&content) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Discarding unreadable session file"
                );
                Ok(HashMap::new())
            }
        }
    }

    fn save(&self, entries: &HashMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().map_err(|_| StorageError::Poisoned)?;
        let mut entries = self.load()?;
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().map_err(|_| StorageError::Poisoned)?;
        let mut entries = self.load()?;
        if entries.remove(key).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_set_get_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get(TOKEN_KEY).unwrap(), None);

        store.set(TOKEN_KEY, "abc").unwrap();
        assert_eq!(store.get(TOKEN_KEY).unwrap().as_deref(), Some("abc"));

        store.remove(TOKEN_KEY).unwrap();
        store.remove(TOKEN_KEY).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_file_store_survives_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let store = FileStore::new(&path);
        store.set(TOKEN_KEY, "abc").unwrap();
        store.set(USER_KEY, r#"{"id":"1"}"#).unwrap();

        let reopened = FileStore::new(&path);
        assert_eq!(reopened.get(TOKEN_KEY).unwrap().as_deref(), Some("abc"));
        assert_eq!(reopened.get(USER_KEY).unwrap().as_deref(), Some(r#"{"id":"1"}"#));

        reopened.remove(TOKEN_KEY).unwrap();
        assert_eq!(store.get(TOKEN_KEY).unwrap(), None);
        assert!(store.get(USER_KEY).unwrap().is_some());
    }

    #[test]
    fn test_file_store_missing_or_corrupt_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let store = FileStore::new(&path);
        assert_eq!(store.get(TOKEN_KEY).unwrap(), None);
        store.remove(TOKEN_KEY).unwrap();

        fs::write(&path, "{ not json").unwrap();
        assert_eq!(store.get(TOKEN_KEY).unwrap(), None);
        store.set(TOKEN_KEY, "fresh").unwrap();
        assert_eq!(store.get(TOKEN_KEY).unwrap().as_deref(), Some("fresh"));
    }
}
