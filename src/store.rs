//! In-memory key to value-list store with thread-safe access
//!
//! Each key maps to an ordered, append-only list of string values. The map
//! sits behind one `RwLock` shared by every connection task and the operator
//! console; callers hold the lock only for the duration of a single map
//! operation, never across socket I/O.

use crate::error::Result;
use crate::persist;
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;

/// Thread-safe mapping from key to its ordered list of values.
///
/// Invariant: a key present in the map always holds a non-empty list;
/// removing a key deletes the entry outright.
pub struct ListStore {
    data: RwLock<HashMap<String, Vec<String>>>,
}

impl ListStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }

    /// Create a store from a snapshot file; a missing file means empty.
    pub fn from_snapshot<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            data: RwLock::new(persist::load(path)?),
        })
    }

    /// Append `value` to `key`'s list, creating the list if absent.
    ///
    /// Returns whether the key existed before this call. Duplicate values
    /// are kept; insertion order is preserved.
    pub async fn append(&self, key: String, value: String) -> bool {
        let mut data = self.data.write().await;
        match data.get_mut(&key) {
            Some(values) => {
                values.push(value);
                true
            }
            None => {
                data.insert(key, vec![value]);
                false
            }
        }
    }

    /// Values for `key`, or an empty list if the key is absent.
    pub async fn read(&self, key: &str) -> Vec<String> {
        let data = self.data.read().await;
        data.get(key).cloned().unwrap_or_default()
    }

    /// Delete `key`'s entry and return what it held (empty if absent).
    pub async fn remove(&self, key: &str) -> Vec<String> {
        let mut data = self.data.write().await;
        data.remove(key).unwrap_or_default()
    }

    /// Number of keys currently in the store.
    pub async fn len(&self) -> usize {
        let data = self.data.read().await;
        data.len()
    }

    /// Replace the whole mapping with the snapshot at `path`.
    pub async fn load<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let loaded = persist::load(path)?;
        let mut data = self.data.write().await;
        *data = loaded;
        Ok(())
    }

    /// Write the whole mapping to the snapshot at `path`.
    pub async fn store<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let data = self.data.read().await;
        persist::save(path, &data)
    }
}

impl Default for ListStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_append_reports_prior_existence() {
        let store = ListStore::new();
        assert!(!store.append("k".to_string(), "v1".to_string()).await);
        assert!(store.append("k".to_string(), "v2".to_string()).await);
        assert!(store.append("k".to_string(), "v2".to_string()).await);
    }

    #[tokio::test]
    async fn test_read_preserves_order_and_duplicates() {
        let store = ListStore::new();
        store.append("a".to_string(), "1".to_string()).await;
        store.append("a".to_string(), "2".to_string()).await;
        store.append("a".to_string(), "1".to_string()).await;
        assert_eq!(
            store.read("a").await,
            vec!["1".to_string(), "2".to_string(), "1".to_string()]
        );
    }

    #[tokio::test]
    async fn test_absent_key_is_not_an_error() {
        let store = ListStore::new();
        assert!(store.read("missing").await.is_empty());
        assert!(store.remove("missing").await.is_empty());
    }

    #[tokio::test]
    async fn test_remove_then_read() {
        let store = ListStore::new();
        store.append("k".to_string(), "v".to_string()).await;
        assert_eq!(store.remove("k").await, vec!["v".to_string()]);
        assert!(store.read("k").await.is_empty());
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let temp_file = NamedTempFile::new().unwrap();
        let store = ListStore::new();
        store.append("a".to_string(), "1".to_string()).await;
        store.append("a".to_string(), "2".to_string()).await;
        store.append("b".to_string(), "x".to_string()).await;
        store.store(temp_file.path()).await.unwrap();

        let restored = ListStore::from_snapshot(temp_file.path()).unwrap();
        assert_eq!(
            restored.read("a").await,
            vec!["1".to_string(), "2".to_string()]
        );
        assert_eq!(restored.read("b").await, vec!["x".to_string()]);
        assert_eq!(restored.len().await, 2);
    }

    #[tokio::test]
    async fn test_load_replaces_wholesale() {
        let temp_file = NamedTempFile::new().unwrap();
        let snapshot = ListStore::new();
        snapshot.append("kept".to_string(), "v".to_string()).await;
        snapshot.store(temp_file.path()).await.unwrap();

        let store = ListStore::new();
        store.append("dropped".to_string(), "v".to_string()).await;
        store.load(temp_file.path()).await.unwrap();
        assert!(store.read("dropped").await.is_empty());
        assert_eq!(store.read("kept").await, vec!["v".to_string()]);
    }

    #[tokio::test]
    async fn test_concurrent_appends_lose_nothing() {
        let store = Arc::new(ListStore::new());
        let mut handles = vec![];
        for i in 0..32 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.append("shared".to_string(), format!("v{}", i)).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        let mut values = store.read("shared").await;
        values.sort();
        let mut expected: Vec<String> = (0..32).map(|i| format!("v{}", i)).collect();
        expected.sort();
        assert_eq!(values, expected);
    }
}
