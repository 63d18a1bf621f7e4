//! Replication Loop (C5, §4.5): background pull-and-apply, periodic
//! reconciliation, and the per-operation causality filter that decides
//! whether a remote operation gets applied at all.

use crate::error::Error;
use crate::storage::Storage;
use crate::transport::SyncEngine;
use latticed_core::{ConflictResolution, OperationKind, ReconciliationRequest, SyncOperation, VectorClock};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Drives the pull and reconcile background loops for one replica, sharing
/// a [`Storage`] handle, [`SyncEngine`], and vector clock with the
/// [`Collection`](crate::collection::Collection) facades built on the same
/// handles.
pub struct ReplicationLoop {
    storage: Arc<dyn Storage>,
    engine: Arc<dyn SyncEngine>,
    clock: Arc<Mutex<VectorClock>>,
    replica_id: String,
}

impl ReplicationLoop {
    #[must_use]
    pub fn new(
        storage: Arc<dyn Storage>,
        engine: Arc<dyn SyncEngine>,
        clock: Arc<Mutex<VectorClock>>,
        replica_id: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            engine,
            clock,
            replica_id: replica_id.into(),
        }
    }

    /// Applies a batch of remote operations against local storage and clock,
    /// per the §4.5 algorithm: skip loopback, skip strictly-dominated
    /// operations, dispatch by kind, then unconditionally overwrite the
    /// local clock with the operation's clock.
    ///
    /// That final step is an overwrite rather than a componentwise merge —
    /// preserved here exactly as specified rather than "fixed", since a
    /// merge would silently change what operations downstream code observes
    /// as dominated on a later call. See the decision recorded in
    /// `DESIGN.md`.
    pub async fn apply_operations(&self, batch: Vec<SyncOperation>) -> Result<(), Error> {
        for op in batch {
            if op.replica == self.replica_id {
                continue;
            }

            let local = self.clock.lock().clone();
            if op.clock.compare(&local) == latticed_core::CausalOrder::Less {
                tracing::debug!(op_id = %op.id, "skipping dominated operation");
                continue;
            }

            match op.kind {
                OperationKind::Set => {
                    let value = op.value.clone().unwrap_or(serde_json::Value::Null);
                    self.storage
                        .set(&op.key, value)
                        .await
                        .map_err(Error::Storage)?;
                }
                OperationKind::Delete => {
                    self.storage
                        .delete(&op.key)
                        .await
                        .map_err(Error::Storage)?;
                }
                OperationKind::Reconcile => {
                    if let Some(server_clock) = &op.server_clock {
                        *self.clock.lock() = server_clock.clone();
                    }
                }
            }

            // Overwrite, not merge — see the doc comment above.
            tracing::debug!(op_id = %op.id, "advancing local clock to operation's clock (overwrite, not merge)");
            *self.clock.lock() = op.clock;
        }
        Ok(())
    }

    /// One reconcile round: send the current clock, then integrate the
    /// response per §4.5's "Reconcile integration" rule.
    pub async fn reconcile_once(&self) -> Result<(), Error> {
        let request = ReconciliationRequest {
            id: uuid::Uuid::new_v4().to_string(),
            operations: Vec::new(),
            client_state: self.clock.lock().clone(),
            replica_id: self.replica_id.clone(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        };

        let response = self.engine.reconcile(request).await.map_err(Error::Sync)?;

        if let Some(server_ops) = response.server_operations {
            self.apply_operations(server_ops).await?;
        }

        if let Some(resolved) = response.resolved_state {
            *self.clock.lock() = resolved;
        }

        if let Some(conflicts) = response.conflicts {
            for conflict in conflicts {
                // `Merge` has no generic way to recover the original CRDT
                // type from an opaque `serde_json::Value` here, so it falls
                // back to the server's value, same as `Server`.
                if matches!(conflict.resolution, ConflictResolution::Server | ConflictResolution::Merge) {
                    self.storage
                        .set(&conflict.key, conflict.server_value.clone())
                        .await
                        .map_err(Error::Storage)?;
                }
            }
        }

        Ok(())
    }

    /// Spawns the pull loop (every `interval`) and the reconcile loop (every
    /// `5 * interval`) as background tasks. Returns their handles so the
    /// caller can abort them on shutdown.
    pub fn spawn_auto_sync(self: &Arc<Self>, interval: Duration) -> (JoinHandle<()>, JoinHandle<()>) {
        let pull_loop = {
            let this = Arc::clone(self);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                loop {
                    ticker.tick().await;
                    match this.engine.pull().await {
                        Ok(batch) => {
                            if let Err(err) = this.apply_operations(batch).await {
                                tracing::warn!(error = %err, "pull loop failed to apply batch");
                            }
                        }
                        Err(err) => tracing::warn!(error = %err, "pull loop failed"),
                    }
                }
            })
        };

        let reconcile_loop = {
            let this = Arc::clone(self);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval.saturating_mul(5));
                loop {
                    ticker.tick().await;
                    if let Err(err) = this.reconcile_once().await {
                        tracing::warn!(error = %err, "reconcile loop failed");
                    }
                }
            })
        };

        (pull_loop, reconcile_loop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::transport::ManualSyncEngine;

    fn op(id: &str, replica: &str, clock: VectorClock, kind: OperationKind) -> SyncOperation {
        SyncOperation {
            id: id.to_string(),
            kind,
            key: "k".to_string(),
            value: Some(serde_json::json!("v")),
            timestamp: 1000,
            replica: replica.to_string(),
            clock,
            server_clock: None,
            op_vector: None,
            collection: None,
            tags: None,
            scope: None,
        }
    }

    fn loop_for(storage: Arc<dyn Storage>) -> ReplicationLoop {
        ReplicationLoop::new(
            storage,
            Arc::new(ManualSyncEngine::new()),
            Arc::new(Mutex::new(VectorClock::empty())),
            "local",
        )
    }

    #[tokio::test]
    async fn loopback_operations_are_skipped() {
        let storage = MemoryStorage::new();
        let rl = loop_for(storage.clone());
        let batch = vec![op("o1", "local", VectorClock::empty().increment("local"), OperationKind::Set)];
        rl.apply_operations(batch).await.unwrap();
        assert!(storage.get("k").await.is_err());
    }

    #[tokio::test]
    async fn dominated_operations_are_skipped() {
        let storage = MemoryStorage::new();
        let clock = Arc::new(Mutex::new(VectorClock::empty().increment("remote").increment("remote")));
        let rl = ReplicationLoop::new(
            storage.clone(),
            Arc::new(ManualSyncEngine::new()),
            Arc::clone(&clock),
            "local",
        );
        let stale = op(
            "o1",
            "remote",
            VectorClock::empty().increment("remote"),
            OperationKind::Set,
        );
        rl.apply_operations(vec![stale]).await.unwrap();
        assert!(storage.get("k").await.is_err());
    }

    #[tokio::test]
    async fn set_operation_writes_value_and_advances_clock() {
        let storage = MemoryStorage::new();
        let rl = loop_for(storage.clone());
        let remote_clock = VectorClock::empty().increment("remote");
        rl.apply_operations(vec![op("o1", "remote", remote_clock.clone(), OperationKind::Set)])
            .await
            .unwrap();
        assert_eq!(storage.get("k").await.unwrap(), serde_json::json!("v"));
        assert_eq!(rl.clock.lock().get("remote"), 1);
    }

    #[tokio::test]
    async fn delete_operation_removes_key() {
        let storage = MemoryStorage::new();
        storage.set("k", serde_json::json!("v")).await.unwrap();
        let rl = loop_for(storage.clone());
        let remote_clock = VectorClock::empty().increment("remote");
        rl.apply_operations(vec![op("o1", "remote", remote_clock, OperationKind::Delete)])
            .await
            .unwrap();
        assert!(storage.get("k").await.is_err());
    }

    #[tokio::test]
    async fn clock_overwrite_is_not_a_merge() {
        // Regression test pinning the documented §9 behavior: applying a
        // remote op whose clock is concurrent with (not a superset of) the
        // local clock overwrites rather than merges, so entries the remote
        // clock doesn't know about are dropped from the local clock.
        let storage = MemoryStorage::new();
        let clock = Arc::new(Mutex::new(VectorClock::empty().increment("third_party")));
        let rl = ReplicationLoop::new(
            storage.clone(),
            Arc::new(ManualSyncEngine::new()),
            Arc::clone(&clock),
            "local",
        );
        let remote_clock = VectorClock::empty().increment("remote");
        rl.apply_operations(vec![op("o1", "remote", remote_clock.clone(), OperationKind::Set)])
            .await
            .unwrap();

        let final_clock = rl.clock.lock().clone();
        assert_eq!(final_clock.get("remote"), 1);
        // A componentwise merge would have kept this at 1; an overwrite drops it.
        assert_eq!(final_clock.get("third_party"), 0);
    }

    #[tokio::test]
    async fn reconcile_response_with_no_conflicts_is_a_noop_on_storage() {
        let storage = MemoryStorage::new();
        let rl = loop_for(storage.clone());
        rl.reconcile_once().await.unwrap();
        assert!(storage.keys().await.unwrap().is_empty());
    }
}
