//! latticed - a local-first replicated data engine.
//!
//! CRDTs, vector clocks, and a sync engine over a pluggable storage and
//! transport. This binary is a demonstration harness: it wires together
//! storage, transport, the replication loop, and a collection facade, and
//! runs a small two-replica convergence scenario so the pieces can be
//! exercised end-to-end without a real network.

use latticed::collection::Collection;
use latticed::config::Config;
use latticed::replication::ReplicationLoop;
use latticed::storage::{self, MemoryStorage};
use latticed::telemetry;
use latticed::transport::{ManualSyncEngine, MockTransport, SyncEngine};
use latticed_core::{Crdt, GSet, VectorClock};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

/// Resolve the configuration path from CLI arguments.
/// Supports `-c <path>`, `--config <path>`, or a bare path.
/// Falls back to `latticed.toml` when no argument is provided.
fn resolve_config_path() -> String {
    let mut args = std::env::args().skip(1);

    let raw_path = match args.next() {
        Some(flag) if flag == "-c" || flag == "--config" => args.next().unwrap_or_else(|| {
            eprintln!("Missing path after {}", flag);
            std::process::exit(1);
        }),
        Some(path) => path,
        None => "latticed.toml".to_string(),
    };

    match std::fs::canonicalize(Path::new(&raw_path)) {
        Ok(p) => p.to_string_lossy().into_owned(),
        Err(_) => raw_path,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = resolve_config_path();

    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "WARN: failed to load config from {}: {} (falling back to defaults for the demo)",
                config_path, e
            );
            Config {
                storage: latticed::config::StorageConfig::Memory,
                sync: latticed::config::SyncConfig::Manual,
                replica_id: "demo-local".to_string(),
                auto_sync_interval_ms: None,
                authorization: None,
                business_logic: None,
                log_format: latticed::config::LogFormat::Pretty,
            }
        }
    };

    telemetry::init(config.log_format);

    if let Err(errors) = latticed::config::validate(&config) {
        for err in &errors {
            error!(error = %err, "configuration validation failed");
        }
        return Err(anyhow::anyhow!(
            "configuration validation failed with {} error(s)",
            errors.len()
        ));
    }

    info!(replica_id = %config.replica_id, "starting latticed");

    run_demo_scenario(&config).await?;

    Ok(())
}

/// Wires two in-process replicas together over [`MockTransport`] and
/// demonstrates eventual convergence of a shared `GSet` collection: each
/// replica writes independently, pulls the other's operations, and ends up
/// observing the union.
async fn run_demo_scenario(config: &Config) -> anyhow::Result<()> {
    let local_storage = MemoryStorage::new();
    let remote_storage = MemoryStorage::new();

    let (local_transport, remote_transport): (Arc<dyn SyncEngine>, Arc<dyn SyncEngine>) =
        match &config.sync {
            latticed::config::SyncConfig::Manual => {
                (Arc::new(ManualSyncEngine::new()), Arc::new(ManualSyncEngine::new()))
            }
            latticed::config::SyncConfig::Websocket { .. } => {
                info!("a real endpoint to dial is not configured for this demo; using the in-process mock transport instead of latticed::websocket::WebSocketTransport");
                let (a, b) = MockTransport::pair();
                (a, b)
            }
        };

    local_transport.connect().await?;
    remote_transport.connect().await?;

    let local_clock = Arc::new(Mutex::new(VectorClock::empty()));
    let remote_clock = Arc::new(Mutex::new(VectorClock::empty()));

    let local_tags: Collection<GSet<String>> = Collection::new(
        "tags",
        Arc::clone(&local_storage) as Arc<dyn storage::Storage>,
        Arc::clone(&local_clock),
        "local",
        Some(Arc::clone(&local_transport)),
    );
    let remote_tags: Collection<GSet<String>> = Collection::new(
        "tags",
        Arc::clone(&remote_storage) as Arc<dyn storage::Storage>,
        Arc::clone(&remote_clock),
        "remote",
        Some(Arc::clone(&remote_transport)),
    );

    local_tags.mutate(|g| g.add("rust".to_string())).await?;
    remote_tags.mutate(|g| g.add("crdt".to_string())).await?;

    let local_replication = ReplicationLoop::new(
        Arc::clone(&local_storage) as Arc<dyn storage::Storage>,
        Arc::clone(&local_transport),
        Arc::clone(&local_clock),
        "local",
    );
    let remote_replication = ReplicationLoop::new(
        Arc::clone(&remote_storage) as Arc<dyn storage::Storage>,
        Arc::clone(&remote_transport),
        Arc::clone(&remote_clock),
        "remote",
    );

    if let Some(auto_sync) = config.auto_sync_interval_ms {
        info!(interval_ms = auto_sync, "auto-sync configured but demo runs a single manual round");
    }

    let local_ops = local_transport.pull().await.unwrap_or_default();
    local_replication.apply_operations(local_ops).await?;
    let remote_ops = remote_transport.pull().await.unwrap_or_default();
    remote_replication.apply_operations(remote_ops).await?;

    let local_view = local_tags.get_value().await?;
    let remote_view = remote_tags.get_value().await?;

    info!(
        local_converged = local_view.contains(&"crdt".to_string()),
        remote_converged = remote_view.contains(&"rust".to_string()),
        "demo scenario complete"
    );

    Ok(())
}
