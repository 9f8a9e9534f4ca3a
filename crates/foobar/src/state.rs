//! Remembered bar state
//!
//! One JSON object per plugin name in local storage, keyed by bar id.

use foobar_core::{Error, Result};
use foobar_dom::Storage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Last user visible action on a bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BarAction {
    Open,
    Closed,
    Dismissed,
}

/// State stored for one bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoredState {
    pub action: Option<BarAction>,
    pub active: usize,
    /// Wall clock ms of the last change
    pub modified: u64,
}

impl StoredState {
    pub fn is_expired(&self, lifetime_ms: Option<u64>, now: u64) -> bool {
        lifetime_ms.is_some_and(|lifetime| self.modified.saturating_add(lifetime) < now)
    }
}

/// In-memory copy of a plugin's stored states
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateStore {
    key: String,
    entries: BTreeMap<String, StoredState>,
}

impl StateStore {
    /// Read the blob stored under `key`. A malformed blob is discarded.
    pub fn load(storage: &Storage, key: &str) -> Self {
        let entries = match storage.get_item(key).map(serde_json::from_str::<BTreeMap<String, StoredState>>) {
            Some(Ok(entries)) => entries,
            Some(Err(e)) => {
                tracing::warn!("discarding malformed stored state `{key}`: {e}");
                BTreeMap::new()
            }
            None => BTreeMap::new(),
        };
        Self { key: key.to_string(), entries }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// State of `id` unless it outlived `lifetime_ms`; expired entries are
    /// pruned.
    pub fn get(&mut self, id: &str, lifetime_ms: Option<u64>, now: u64) -> Option<StoredState> {
        let state = *self.entries.get(id)?;
        if state.is_expired(lifetime_ms, now) {
            tracing::debug!("stored state of `{id}` expired");
            self.entries.remove(id);
            return None;
        }
        Some(state)
    }

    pub fn set(&mut self, id: &str, state: StoredState) {
        self.entries.insert(id.to_string(), state);
    }

    pub fn remove(&mut self, id: &str) -> bool {
        self.entries.remove(id).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the blob back, removing the key when nothing is stored
    pub fn save(&self, storage: &mut Storage) -> Result<()> {
        if self.entries.is_empty() {
            return Ok(storage.remove_item(&self.key)?);
        }
        let blob = serde_json::to_string(&self.entries).map_err(|e| Error::Storage(e.to_string()))?;
        Ok(storage.set_item(&self.key, &blob)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load() {
        let mut storage = Storage::memory();
        let mut store = StateStore::load(&storage, "foobar");
        store.set("bar-1", StoredState { action: Some(BarAction::Dismissed), active: 2, modified: 10 });
        assert!(store.save(&mut storage).is_ok());
        assert_eq!(
            storage.get_item("foobar"),
            Some(r#"{"bar-1":{"action":"dismissed","active":2,"modified":10}}"#)
        );

        let mut reloaded = StateStore::load(&storage, "foobar");
        assert_eq!(reloaded.get("bar-1", None, 99).map(|s| s.active), Some(2));
    }

    #[test]
    fn test_expired_entries_are_pruned() {
        let mut store = StateStore::default();
        store.set("bar-1", StoredState { action: Some(BarAction::Open), active: 0, modified: 1_000 });
        assert!(store.get("bar-1", Some(500), 1_400).is_some());
        assert!(store.get("bar-1", Some(500), 1_600).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_malformed_blob_is_discarded() {
        let mut storage = Storage::memory();
        assert!(storage.set_item("foobar", "not json").is_ok());
        assert!(StateStore::load(&storage, "foobar").is_empty());
    }
}
