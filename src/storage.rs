//! Storage Interface (C3, §4.3): a `key -> opaque value` map that the
//! replication loop and collection facades treat as opaque.

use crate::error::StorageError;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;

/// `get/set/delete/clear/keys/watch` over string keys and opaque JSON
/// values. Implementors may back this with any store; the replication loop
/// never inspects the value beyond handing it to a CRDT's own
/// (de)serialization.
#[async_trait]
pub trait Storage: Send + Sync {
    /// The current value for `key`, or `StorageError::NotFound` if absent.
    async fn get(&self, key: &str) -> Result<Value, StorageError>;

    /// Unconditionally writes `value` to `key`, notifying any watchers.
    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;

    /// Removes `key`. Idempotent: deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Removes every key.
    async fn clear(&self) -> Result<(), StorageError>;

    /// The current set of keys.
    async fn keys(&self) -> Result<Vec<String>, StorageError>;

    /// Subscribes to changes on `key`. At-least-once delivery: a watcher may
    /// observe the same value more than once, but never miss a change that
    /// happened after it subscribed.
    fn watch(&self, key: &str) -> broadcast::Receiver<Value>;
}

/// Reference [`Storage`] implementation backed by a concurrent map, with one
/// broadcast channel lazily created per watched key.
#[derive(Default)]
pub struct MemoryStorage {
    values: DashMap<String, Value>,
    watchers: DashMap<String, broadcast::Sender<Value>>,
}

impl MemoryStorage {
    /// An empty store.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn notify(&self, key: &str, value: &Value) {
        if let Some(tx) = self.watchers.get(key) {
            // No receivers is not an error: watch() had never been called.
            let _ = tx.send(value.clone());
        }
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Value, StorageError> {
        self.values
            .get(key)
            .map(|v| v.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.values.insert(key.to_string(), value.clone());
        self.notify(key, &value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.values.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.values.clear();
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.values.iter().map(|e| e.key().clone()).collect())
    }

    fn watch(&self, key: &str) -> broadcast::Receiver<Value> {
        self.watchers
            .entry(key.to_string())
            .or_insert_with(|| broadcast::channel(32).0)
            .subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_on_missing_key_is_not_found() {
        let store = MemoryStorage::new();
        assert!(matches!(store.get("k").await, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn set_then_get_roundtrips() {
        let store = MemoryStorage::new();
        store.set("k", serde_json::json!("v")).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), serde_json::json!("v"));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryStorage::new();
        store.delete("missing").await.unwrap();
        store.set("k", serde_json::json!(1)).await.unwrap();
        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert!(store.get("k").await.is_err());
    }

    #[tokio::test]
    async fn clear_removes_every_key() {
        let store = MemoryStorage::new();
        store.set("a", serde_json::json!(1)).await.unwrap();
        store.set("b", serde_json::json!(2)).await.unwrap();
        store.clear().await.unwrap();
        assert!(store.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn keys_reflects_current_contents() {
        let store = MemoryStorage::new();
        store.set("a", serde_json::json!(1)).await.unwrap();
        store.set("b", serde_json::json!(2)).await.unwrap();
        let mut keys = store.keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn watch_observes_subsequent_writes() {
        let store = MemoryStorage::new();
        let mut rx = store.watch("k");
        store.set("k", serde_json::json!("v1")).await.unwrap();
        store.set("k", serde_json::json!("v2")).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), serde_json::json!("v1"));
        assert_eq!(rx.recv().await.unwrap(), serde_json::json!("v2"));
    }
}
