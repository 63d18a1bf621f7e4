use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use latticed::replication::ReplicationLoop;
use latticed::storage::MemoryStorage;
use latticed::transport::ManualSyncEngine;
use latticed_core::{GSet, OperationKind, SyncOperation, VectorClock};
use parking_lot::Mutex;
use std::sync::Arc;

fn op(id: usize, clock: VectorClock) -> SyncOperation {
    SyncOperation {
        id: id.to_string(),
        kind: OperationKind::Set,
        key: "bench".to_string(),
        value: Some(serde_json::json!({"n": id})),
        timestamp: 1000,
        replica: "remote".to_string(),
        clock,
        server_clock: None,
        op_vector: None,
        collection: Some("bench".to_string()),
        tags: None,
        scope: None,
    }
}

fn apply_operations_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("replication");
    group.throughput(Throughput::Elements(100));

    group.bench_function("apply_operations_batch_of_100", |b| {
        b.to_async(&rt).iter(|| async {
            let storage = MemoryStorage::new();
            let rl = ReplicationLoop::new(
                storage,
                Arc::new(ManualSyncEngine::new()),
                Arc::new(Mutex::new(VectorClock::empty())),
                "local",
            );
            let mut clock = VectorClock::empty();
            let batch: Vec<_> = (0..100)
                .map(|i| {
                    clock = clock.increment("remote");
                    op(i, clock.clone())
                })
                .collect();
            rl.apply_operations(batch).await.unwrap();
        })
    });

    group.finish();
}

fn gset_merge_benchmark(c: &mut Criterion) {
    use latticed_core::Crdt;

    let mut group = c.benchmark_group("crdt");
    let a = (0..500).fold(GSet::empty(), |g, i| g.add(format!("a-{i}")));
    let b = (0..500).fold(GSet::empty(), |g, i| g.add(format!("b-{i}")));
    group.throughput(Throughput::Elements(1000));

    group.bench_function("gset_merge_1000_elements", |bencher| {
        bencher.iter(|| a.merge(&b));
    });

    group.finish();
}

criterion_group!(benches, apply_operations_benchmark, gset_merge_benchmark);
criterion_main!(benches);
