//! Collection Facades (C6, §4.6): binds one CRDT type to one storage key,
//! generalizing the teacher's domain-specific CRDT wrappers into a single
//! reusable wrapper since this library has no fixed domain entities.

use crate::error::{Error, StorageError};
use crate::storage::Storage;
use crate::transport::SyncEngine;
use latticed_core::{Crdt, OperationKind, SyncOperation, VectorClock};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;

/// A typed view over one storage key, backed by a CRDT value of type `T`.
///
/// `set` (and, through [`Collection::mutate`], every typed mutator —
/// `add`, `put`, `remove`, `increment`, `append`, `insert_at`, `remove_at`
/// — built on top of it by callers) follows one pattern: read current value
/// (falling back to `T::default` via [`Crdt`] construction on miss), apply
/// the mutator, write the whole value back, bump the clock, and emit a
/// [`SyncOperation`]. Transport errors on the write path are swallowed —
/// offline-first means the local write is authoritative and the operation
/// will be rediscovered on the next pull.
pub struct Collection<T> {
    name: String,
    storage: Arc<dyn Storage>,
    clock: Arc<Mutex<VectorClock>>,
    replica_id: String,
    engine: Option<Arc<dyn SyncEngine>>,
    _marker: PhantomData<T>,
}

impl<T> Collection<T>
where
    T: Crdt + Serialize + DeserializeOwned + Default,
{
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        storage: Arc<dyn Storage>,
        clock: Arc<Mutex<VectorClock>>,
        replica_id: impl Into<String>,
        engine: Option<Arc<dyn SyncEngine>>,
    ) -> Self {
        Self {
            name: name.into(),
            storage,
            clock,
            replica_id: replica_id.into(),
            engine,
            _marker: PhantomData,
        }
    }

    /// The current value, or `T::default()` if the key has never been set.
    pub async fn get_value(&self) -> Result<T, Error> {
        match self.storage.get(&self.name).await {
            Ok(raw) => {
                let value: T = serde_json::from_value(raw).map_err(|e| {
                    Error::Storage(StorageError::Backend(format!("decode failed: {e}")))
                })?;
                Ok(value)
            }
            Err(StorageError::NotFound(_)) => Ok(T::default()),
            Err(e) => Err(Error::Storage(e)),
        }
    }

    /// Applies `mutate` to the current value, writes the result back,
    /// advances the clock, and emits the resulting operation through the
    /// transport (if any). Returns the new value.
    pub async fn mutate(&self, mutate: impl FnOnce(&T) -> T) -> Result<T, Error> {
        let current = self.get_value().await?;
        let next = mutate(&current);

        let raw = serde_json::to_value(&next)
            .map_err(|e| Error::Storage(StorageError::Backend(format!("encode failed: {e}"))))?;
        self.storage
            .set(&self.name, raw.clone())
            .await
            .map_err(Error::Storage)?;

        let clock = {
            let mut guard = self.clock.lock();
            *guard = guard.increment(&self.replica_id);
            guard.clone()
        };

        if let Some(engine) = &self.engine {
            let op = SyncOperation {
                id: uuid::Uuid::new_v4().to_string(),
                kind: OperationKind::Set,
                key: self.name.clone(),
                value: Some(raw),
                timestamp: chrono::Utc::now().timestamp_millis(),
                replica: self.replica_id.clone(),
                clock,
                server_clock: None,
                op_vector: None,
                collection: Some(self.name.clone()),
                tags: None,
                scope: None,
            };
            // Swallowed: offline-first, the next pull will re-surface this.
            let _ = engine.push(vec![op]).await;
        }

        Ok(next)
    }

    /// Unconditionally replaces the current value (the `set(value)` primitive).
    pub async fn set(&self, value: T) -> Result<T, Error> {
        self.mutate(|_| value.clone()).await
    }

    /// A typed projection of the underlying storage watch stream.
    pub fn watch(&self) -> tokio::sync::broadcast::Receiver<serde_json::Value> {
        self.storage.watch(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use latticed_core::GSet;

    fn collection(storage: Arc<dyn Storage>) -> Collection<GSet<String>> {
        Collection::new(
            "tags",
            storage,
            Arc::new(Mutex::new(VectorClock::empty())),
            "r1",
            None,
        )
    }

    #[tokio::test]
    async fn missing_key_reads_as_default() {
        let storage = MemoryStorage::new();
        let c = collection(storage);
        assert!(c.get_value().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mutate_writes_back_and_advances_clock() {
        let storage = MemoryStorage::new();
        let clock = Arc::new(Mutex::new(VectorClock::empty()));
        let c = Collection::<GSet<String>>::new("tags", storage, Arc::clone(&clock), "r1", None);

        let result = c.mutate(|g| g.add("x".to_string())).await.unwrap();
        assert!(result.contains(&"x".to_string()));
        assert_eq!(clock.lock().get("r1"), 1);
    }

    #[tokio::test]
    async fn set_replaces_whole_value() {
        let storage = MemoryStorage::new();
        let c = collection(storage);
        c.mutate(|g| g.add("a".to_string())).await.unwrap();
        let replaced = c.set(GSet::empty().add("b".to_string())).await.unwrap();
        assert!(!replaced.contains(&"a".to_string()));
        assert!(replaced.contains(&"b".to_string()));
    }

    #[tokio::test]
    async fn repeated_mutate_persists_across_reads() {
        let storage = MemoryStorage::new();
        let c = collection(storage);
        c.mutate(|g| g.add("a".to_string())).await.unwrap();
        c.mutate(|g| g.add("b".to_string())).await.unwrap();
        let value = c.get_value().await.unwrap();
        assert!(value.contains(&"a".to_string()));
        assert!(value.contains(&"b".to_string()));
    }
}
