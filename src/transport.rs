//! Sync Engine / Transport (C4, §4.4): connect/disconnect/push/pull/reconcile
//! over a connection state machine, plus an in-process mock transport used by
//! the replication loop's own tests and by the demo binary.

use crate::error::SyncError;
use async_trait::async_trait;
use latticed_core::{
    DataConflict, ReconciliationRequest, ReconciliationResponse, SyncOperation, VectorClock,
};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, Mutex};

/// The three-valued status the `status` stream (§4.4) reports. Distinct from
/// [`ConnectionState`]: `Disconnected`, `Connecting`, and `Reconnecting` all
/// collapse to `Offline` here, matching the spec's observable surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Online,
    Offline,
    Syncing,
}

impl From<ConnectionState> for ConnectionStatus {
    fn from(state: ConnectionState) -> Self {
        match state {
            ConnectionState::Online => Self::Online,
            ConnectionState::Syncing => Self::Syncing,
            ConnectionState::Disconnected | ConnectionState::Connecting | ConnectionState::Reconnecting => {
                Self::Offline
            }
        }
    }
}

/// Connection lifecycle. `Syncing` is a sub-state of `Online` entered for the
/// duration of a push/pull/reconcile call; it is not reachable from
/// `Disconnected` directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Online,
    Syncing,
    Reconnecting,
}

impl ConnectionState {
    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Disconnected,
            1 => Self::Connecting,
            2 => Self::Online,
            3 => Self::Syncing,
            _ => Self::Reconnecting,
        }
    }

    pub(crate) fn as_u8(self) -> u8 {
        match self {
            Self::Disconnected => 0,
            Self::Connecting => 1,
            Self::Online => 2,
            Self::Syncing => 3,
            Self::Reconnecting => 4,
        }
    }
}

/// Push/pull timeout.
pub const PUSH_PULL_TIMEOUT: Duration = Duration::from_secs(10);
/// Reconcile timeout — longer, since it's a full divergence exchange.
pub const RECONCILE_TIMEOUT: Duration = Duration::from_secs(15);
/// Base backoff unit for reconnection attempts: `attempt * BACKOFF_UNIT`.
pub const BACKOFF_UNIT: Duration = Duration::from_millis(1000);
/// Reconnection attempts are capped; past this the engine stays `Reconnecting`
/// and waits for an explicit `connect()`.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Connects to a remote peer, exchanges operations, and reconciles full
/// replica state. Implementors own their own transport (WebSocket, in-process
/// channel, ...); the replication loop only calls this trait.
#[async_trait]
pub trait SyncEngine: Send + Sync {
    async fn connect(&self) -> Result<(), SyncError>;
    async fn disconnect(&self) -> Result<(), SyncError>;
    fn state(&self) -> ConnectionState;

    /// Sends a batch of locally-generated operations to the peer.
    async fn push(&self, ops: Vec<SyncOperation>) -> Result<(), SyncError>;

    /// Pulls operations the peer has produced since the last pull.
    async fn pull(&self) -> Result<Vec<SyncOperation>, SyncError>;

    /// Exchanges vector clocks and per-collection state to resolve
    /// divergence beyond what incremental push/pull caught.
    async fn reconcile(
        &self,
        request: ReconciliationRequest,
    ) -> Result<ReconciliationResponse, SyncError>;

    /// Operations pushed by the peer, broadcast without a matching pull —
    /// the unsolicited half of the wire protocol (§6).
    fn operations(&self) -> broadcast::Receiver<SyncOperation>;

    /// Connection state transitions, collapsed to the spec's three-valued
    /// `Online | Offline | Syncing` (§4.4).
    fn status(&self) -> broadcast::Receiver<ConnectionStatus>;

    /// Server-reported disagreements pushed outside of a reconcile round
    /// (the unsolicited `conflict` wire message, §6).
    fn conflicts(&self) -> broadcast::Receiver<DataConflict>;
}

/// Degenerate [`SyncEngine`] for `sync.mode = "manual"`: always reports
/// `Online`, push/pull are no-ops, and reconcile trivially accepts the
/// caller's own clock. Exists so the replication loop has something to drive
/// when the operator has opted out of any transport.
pub struct ManualSyncEngine {
    ops_tx: broadcast::Sender<SyncOperation>,
    status_tx: broadcast::Sender<ConnectionStatus>,
    conflicts_tx: broadcast::Sender<DataConflict>,
}

impl ManualSyncEngine {
    #[must_use]
    pub fn new() -> Self {
        let (ops_tx, _) = broadcast::channel(16);
        let (status_tx, _) = broadcast::channel(1);
        // Manual mode's status stream is a single `Offline` (§4.4) — sent
        // eagerly so any subscriber, whenever it subscribes, can still miss
        // it (broadcast has no replay), matching "a lazy stream" rather than
        // a retained value.
        let _ = status_tx.send(ConnectionStatus::Offline);
        let (conflicts_tx, _) = broadcast::channel(16);
        Self {
            ops_tx,
            status_tx,
            conflicts_tx,
        }
    }
}

impl Default for ManualSyncEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SyncEngine for ManualSyncEngine {
    async fn connect(&self) -> Result<(), SyncError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), SyncError> {
        Ok(())
    }

    fn state(&self) -> ConnectionState {
        ConnectionState::Online
    }

    async fn push(&self, _ops: Vec<SyncOperation>) -> Result<(), SyncError> {
        Ok(())
    }

    async fn pull(&self) -> Result<Vec<SyncOperation>, SyncError> {
        Ok(Vec::new())
    }

    async fn reconcile(
        &self,
        request: ReconciliationRequest,
    ) -> Result<ReconciliationResponse, SyncError> {
        Ok(ReconciliationResponse {
            id: request.id,
            status: latticed_core::ReconciliationStatus::Accepted,
            server_operations: None,
            resolved_state: Some(request.client_state),
            conflicts: None,
        })
    }

    fn operations(&self) -> broadcast::Receiver<SyncOperation> {
        self.ops_tx.subscribe()
    }

    fn status(&self) -> broadcast::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    fn conflicts(&self) -> broadcast::Receiver<DataConflict> {
        self.conflicts_tx.subscribe()
    }
}

type ReconcileResponder = oneshot::Sender<ReconciliationResponse>;

/// In-process [`SyncEngine`] connecting two replicas over `tokio::mpsc`
/// channels, for tests and the demo binary — no real network I/O, but it
/// exercises the full state machine and request/response correlation a
/// WebSocket transport would need.
pub struct MockTransport {
    state: AtomicU8,
    peer_ops_tx: mpsc::Sender<SyncOperation>,
    inbox: Mutex<mpsc::Receiver<SyncOperation>>,
    ops_broadcast: broadcast::Sender<SyncOperation>,
    peer_reconcile_tx: mpsc::Sender<(ReconciliationRequest, ReconcileResponder)>,
    reconcile_inbox: Mutex<mpsc::Receiver<(ReconciliationRequest, ReconcileResponder)>>,
    status_tx: broadcast::Sender<ConnectionStatus>,
    conflicts_tx: broadcast::Sender<DataConflict>,
}

impl MockTransport {
    /// Builds a connected pair: operations and reconcile requests sent by one
    /// side arrive at the other.
    #[must_use]
    pub fn pair() -> (Arc<Self>, Arc<Self>) {
        let (a_tx, b_inbox) = mpsc::channel(64);
        let (b_tx, a_inbox) = mpsc::channel(64);
        let (a_rec_tx, b_rec_inbox) = mpsc::channel(16);
        let (b_rec_tx, a_rec_inbox) = mpsc::channel(16);

        let a = Arc::new(Self {
            state: AtomicU8::new(ConnectionState::Disconnected.as_u8()),
            peer_ops_tx: b_tx,
            inbox: Mutex::new(a_inbox),
            ops_broadcast: broadcast::channel(64).0,
            peer_reconcile_tx: b_rec_tx,
            reconcile_inbox: Mutex::new(a_rec_inbox),
            status_tx: broadcast::channel(16).0,
            conflicts_tx: broadcast::channel(16).0,
        });
        let b = Arc::new(Self {
            state: AtomicU8::new(ConnectionState::Disconnected.as_u8()),
            peer_ops_tx: a_tx,
            inbox: Mutex::new(b_inbox),
            ops_broadcast: broadcast::channel(64).0,
            peer_reconcile_tx: a_rec_tx,
            reconcile_inbox: Mutex::new(b_rec_inbox),
            status_tx: broadcast::channel(16).0,
            conflicts_tx: broadcast::channel(16).0,
        });
        (a, b)
    }

    fn set_state(&self, s: ConnectionState) {
        self.state.store(s.as_u8(), Ordering::SeqCst);
        let _ = self.status_tx.send(ConnectionStatus::from(s));
    }

    /// Injects a server-reported conflict onto the `conflicts` stream, as a
    /// real peer would when pushing an unsolicited `conflict` wire message.
    /// Exposed for tests exercising the Replication Loop's conflict
    /// consumption rather than reconcile-round conflicts.
    pub fn push_conflict(&self, conflict: DataConflict) {
        let _ = self.conflicts_tx.send(conflict);
    }

    /// Waits for one inbound reconcile request and answers it by merging
    /// clocks — a stand-in for what a real server peer would do. Tests call
    /// this explicitly to advance the mock peer.
    pub async fn serve_one_reconcile(&self, local_clock: VectorClock) {
        let mut inbox = self.reconcile_inbox.lock().await;
        if let Some((request, responder)) = inbox.recv().await {
            let merged = local_clock.merge(&request.client_state);
            let _ = responder.send(ReconciliationResponse {
                id: request.id,
                status: latticed_core::ReconciliationStatus::Accepted,
                server_operations: None,
                resolved_state: Some(merged),
                conflicts: None,
            });
        }
    }
}

#[async_trait]
impl SyncEngine for MockTransport {
    async fn connect(&self) -> Result<(), SyncError> {
        self.set_state(ConnectionState::Connecting);
        self.set_state(ConnectionState::Online);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), SyncError> {
        self.set_state(ConnectionState::Disconnected);
        Ok(())
    }

    fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    async fn push(&self, ops: Vec<SyncOperation>) -> Result<(), SyncError> {
        if self.state() != ConnectionState::Online {
            return Err(SyncError::NotConnected);
        }
        self.set_state(ConnectionState::Syncing);
        for op in ops {
            self.peer_ops_tx
                .send(op)
                .await
                .map_err(|e| SyncError::SendError(e.to_string()))?;
        }
        self.set_state(ConnectionState::Online);
        Ok(())
    }

    async fn pull(&self) -> Result<Vec<SyncOperation>, SyncError> {
        if self.state() != ConnectionState::Online {
            return Err(SyncError::NotConnected);
        }
        self.set_state(ConnectionState::Syncing);
        let mut inbox = self.inbox.lock().await;
        let mut ops = Vec::new();
        while let Ok(op) = inbox.try_recv() {
            let _ = self.ops_broadcast.send(op.clone());
            ops.push(op);
        }
        self.set_state(ConnectionState::Online);
        Ok(ops)
    }

    async fn reconcile(
        &self,
        request: ReconciliationRequest,
    ) -> Result<ReconciliationResponse, SyncError> {
        if self.state() != ConnectionState::Online {
            return Err(SyncError::NotConnected);
        }
        self.set_state(ConnectionState::Syncing);
        let (tx, rx) = oneshot::channel();
        self.peer_reconcile_tx
            .send((request, tx))
            .await
            .map_err(|e| SyncError::SendError(e.to_string()))?;
        let response = tokio::time::timeout(RECONCILE_TIMEOUT, rx)
            .await
            .map_err(|_| SyncError::Timeout)?
            .map_err(|_| SyncError::ReconcileError("peer dropped response channel".into()))?;
        self.set_state(ConnectionState::Online);
        Ok(response)
    }

    fn operations(&self) -> broadcast::Receiver<SyncOperation> {
        self.ops_broadcast.subscribe()
    }

    fn status(&self) -> broadcast::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    fn conflicts(&self) -> broadcast::Receiver<DataConflict> {
        self.conflicts_tx.subscribe()
    }
}
