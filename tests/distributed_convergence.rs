//! Crate-level convergence tests: two replicas, connected by the in-process
//! mock transport, exchanging operations through the full collection +
//! replication loop stack and ending up with the same view.

use latticed::collection::Collection;
use latticed::replication::ReplicationLoop;
use latticed::storage::{MemoryStorage, Storage};
use latticed::transport::{ManualSyncEngine, MockTransport, SyncEngine};
use latticed_core::{Crdt, GSet, OrMap, PnCounter, VectorClock};
use parking_lot::Mutex;
use std::sync::Arc;

fn replica(
    name: &str,
    storage: Arc<dyn Storage>,
    engine: Arc<dyn SyncEngine>,
) -> (Collection<GSet<String>>, Arc<ReplicationLoop>, Arc<Mutex<VectorClock>>) {
    let clock = Arc::new(Mutex::new(VectorClock::empty()));
    let collection = Collection::new("tags", Arc::clone(&storage), Arc::clone(&clock), name, Some(Arc::clone(&engine)));
    let repl = Arc::new(ReplicationLoop::new(storage, engine, Arc::clone(&clock), name));
    (collection, repl, clock)
}

#[tokio::test]
async fn two_replicas_converge_on_a_shared_gset_via_mock_transport() {
    let (a_transport, b_transport): (Arc<dyn SyncEngine>, Arc<dyn SyncEngine>) = {
        let (a, b) = MockTransport::pair();
        (a, b)
    };
    a_transport.connect().await.unwrap();
    b_transport.connect().await.unwrap();

    let (a_tags, a_repl, _a_clock) = replica("a", MemoryStorage::new(), Arc::clone(&a_transport));
    let (b_tags, b_repl, _b_clock) = replica("b", MemoryStorage::new(), Arc::clone(&b_transport));

    a_tags.mutate(|g| g.add("rust".to_string())).await.unwrap();
    b_tags.mutate(|g| g.add("crdt".to_string())).await.unwrap();

    let a_ops = a_transport.pull().await.unwrap();
    b_repl.apply_operations(a_ops).await.unwrap();
    let b_ops = b_transport.pull().await.unwrap();
    a_repl.apply_operations(b_ops).await.unwrap();

    let a_view = a_tags.get_value().await.unwrap();
    let b_view = b_tags.get_value().await.unwrap();

    assert!(a_view.contains(&"rust".to_string()));
    assert!(a_view.contains(&"crdt".to_string()));
    assert!(b_view.contains(&"rust".to_string()));
    assert!(b_view.contains(&"crdt".to_string()));
}

#[tokio::test]
async fn pn_counter_converges_regardless_of_merge_order() {
    let a = PnCounter::empty().increment("a", 5).decrement("a", 2);
    let b = PnCounter::empty().increment("b", 3);

    let ab = a.merge(&b);
    let ba = b.merge(&a);

    assert_eq!(ab.value(), ba.value());
    assert_eq!(ab.value(), 6);
}

#[tokio::test]
async fn or_map_merge_keeps_later_write_across_replicas() {
    let a = OrMap::<String, String>::empty().put("k".to_string(), "from-a".to_string(), 100);
    let b = OrMap::<String, String>::empty().put("k".to_string(), "from-b".to_string(), 200);

    let merged_ab = a.merge(&b);
    let merged_ba = b.merge(&a);

    assert_eq!(merged_ab.get(&"k".to_string()), Some(&"from-b".to_string()));
    assert_eq!(merged_ba.get(&"k".to_string()), Some(&"from-b".to_string()));
}

#[tokio::test]
async fn manual_sync_engine_reconcile_always_accepts_client_state() {
    // Pins the documented §9 behavior: manual mode's reconcile is a trivial
    // accept of whatever clock the caller sends, never a real merge.
    let storage = MemoryStorage::new();
    let clock = Arc::new(Mutex::new(VectorClock::empty().increment("solo")));
    let repl = ReplicationLoop::new(storage, Arc::new(ManualSyncEngine::new()), Arc::clone(&clock), "solo");
    repl.reconcile_once().await.unwrap();
    assert_eq!(clock.lock().get("solo"), 1);
}

#[tokio::test]
async fn reconnect_after_disconnect_resumes_operation_flow() {
    let (a, b) = MockTransport::pair();
    a.connect().await.unwrap();
    b.connect().await.unwrap();

    let (a_tags, _a_repl, _) = replica("a", MemoryStorage::new(), Arc::clone(&a) as Arc<dyn SyncEngine>);
    let storage_b = MemoryStorage::new();
    let (b_tags, b_repl, _) = replica("b", Arc::clone(&storage_b), Arc::clone(&b) as Arc<dyn SyncEngine>);

    a.disconnect().await.unwrap();
    assert!(a_tags.mutate(|g| g.add("offline-write".to_string())).await.is_ok());

    a.connect().await.unwrap();
    a_tags.mutate(|g| g.add("after-reconnect".to_string())).await.unwrap();

    let ops = a.pull().await.unwrap();
    b_repl.apply_operations(ops).await.unwrap();
    let view = b_tags.get_value().await.unwrap();
    assert!(view.contains(&"after-reconnect".to_string()));
}
