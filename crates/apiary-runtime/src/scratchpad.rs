//! Scratchpad: a key/value store shared among the agents of a swarm.

use dashmap::DashMap;
use std::collections::BTreeMap;

/// Swarm-wide key/value scratchpad.
///
/// The engine only exposes the storage interface; tools and plugins decide
/// what to keep in it. Contents round-trip through snapshots.
#[derive(Debug, Default)]
pub struct ScratchpadStore {
    entries: DashMap<String, String>,
}

impl ScratchpadStore {
    /// Create an empty scratchpad.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Write an entry.
    pub fn write(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Read an entry.
    #[must_use]
    pub fn read(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.clone())
    }

    /// Delete an entry. Returns whether it existed.
    pub fn delete(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// List keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Export all entries (for snapshots), sorted by key.
    #[must_use]
    pub fn export(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    /// Replace the contents from a snapshot.
    pub fn import(&self, entries: BTreeMap<String, String>) {
        self.entries.clear();
        for (key, value) in entries {
            self.entries.insert(key, value);
        }
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the scratchpad is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
