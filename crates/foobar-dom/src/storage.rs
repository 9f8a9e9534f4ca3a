//! Storage
//!
//! localStorage backend: a string key/value store, optionally persisted to
//! a JSON file so state survives a simulated reload.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Storage error
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage file is not a JSON object of strings: {0}")]
    Format(#[from] serde_json::Error),
}

/// Storage backend
#[derive(Debug, Default)]
pub struct Storage {
    data: BTreeMap<String, String>,
    path: Option<PathBuf>,
}

impl Storage {
    /// In-memory storage
    pub fn memory() -> Self {
        Self::default()
    }

    /// Storage persisted to `path`, loading existing contents
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            if contents.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&contents)?
            }
        } else {
            BTreeMap::new()
        };
        tracing::debug!(path = %path.display(), keys = data.len(), "opened storage");
        Ok(Self { data, path: Some(path) })
    }

    pub fn is_persistent(&self) -> bool {
        self.path.is_some()
    }

    pub fn get_item(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(|s| s.as_str())
    }

    pub fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.data.insert(key.to_string(), value.to_string());
        self.persist()
    }

    pub fn remove_item(&mut self, key: &str) -> Result<(), StorageError> {
        if self.data.remove(key).is_some() {
            self.persist()?;
        }
        Ok(())
    }

    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.data.clear();
        self.persist()
    }

    /// Key at index, in key order
    pub fn key(&self, index: usize) -> Option<&str> {
        self.data.keys().nth(index).map(|s| s.as_str())
    }

    pub fn length(&self) -> usize {
        self.data.len()
    }

    /// Write to disk if file backed
    pub fn persist(&self) -> Result<(), StorageError> {
        if let Some(path) = &self.path {
            let contents = serde_json::to_string_pretty(&self.data)?;
            fs::write(path, contents)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage() {
        let mut storage = Storage::memory();
        storage.set_item("foobar", "{}").unwrap();
        storage.set_item("alpha", "1").unwrap();
        assert_eq!(storage.length(), 2);
        assert_eq!(storage.key(0), Some("alpha"));
        storage.remove_item("alpha").unwrap();
        assert_eq!(storage.get_item("alpha"), None);
        storage.clear().unwrap();
        assert_eq!(storage.length(), 0);
        assert!(!storage.is_persistent());
    }

    #[test]
    fn test_file_storage_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.json");

        let mut storage = Storage::open(&path).unwrap();
        storage.set_item("foobar", "{\"bar-1\":{}}").unwrap();
        drop(storage);

        let storage = Storage::open(&path).unwrap();
        assert_eq!(storage.get_item("foobar"), Some("{\"bar-1\":{}}"));
    }

    #[test]
    fn test_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(Storage::open(&path), Err(StorageError::Format(_))));
    }
}
