//! Wire protocol types (§6): the envelope carried over the transport, the
//! reconciliation request/response pair, and the JSON-tagged `WireMessage`
//! enum that frames every message type the sync engine sends or receives.

use crate::clock::VectorClock;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The unit of work the replication loop pushes, pulls, and applies.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SyncOperation {
    pub id: String,
    pub kind: OperationKind,
    pub key: String,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    pub value: Option<serde_json::Value>,
    pub timestamp: i64,
    pub replica: String,
    pub clock: VectorClock,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    pub server_clock: Option<VectorClock>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    pub op_vector: Option<VectorClock>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    pub collection: Option<String>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    pub tags: Option<Vec<String>>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    pub scope: Option<String>,
}

/// What a [`SyncOperation`] does to the key/value store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum OperationKind {
    Set,
    Delete,
    Reconcile,
}

/// A client's request to reconcile its state against the server's.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ReconciliationRequest {
    pub id: String,
    pub operations: Vec<SyncOperation>,
    pub client_state: VectorClock,
    pub replica_id: String,
    pub timestamp: i64,
}

/// The server's verdict on a [`ReconciliationRequest`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ReconciliationResponse {
    pub id: String,
    pub status: ReconciliationStatus,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    pub server_operations: Option<Vec<SyncOperation>>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    pub resolved_state: Option<VectorClock>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    pub conflicts: Option<Vec<ConflictEntry>>,
}

/// Outcome of a reconcile round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ReconciliationStatus {
    Accepted,
    Conflict,
    Rejected,
}

/// A single per-key disagreement surfaced by a reconcile round.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ConflictEntry {
    pub key: String,
    pub client_value: serde_json::Value,
    pub server_value: serde_json::Value,
    pub resolution: ConflictResolution,
}

/// Which side (or strategy) a conflict resolves to.
///
/// `Merge` is accepted on the wire but, per §9's documented gap, the
/// replication loop currently treats it the same as `Server` rather than
/// invoking a per-key merger — there is no generic way to recover the
/// original CRDT type from an opaque `serde_json::Value` at this layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ConflictResolution {
    Client,
    Server,
    Merge,
}

/// Filters a pull or a partial-sync registration to a subset of state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct PartialSyncConfig {
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    pub collections: Option<Vec<String>>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    pub tags: Option<Vec<String>>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    pub scope: Option<String>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    pub since: Option<i64>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    pub limit: Option<usize>,
}

/// A server-reported disagreement pushed outside of a reconcile round, on
/// the `conflicts` stream.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct DataConflict {
    pub key: String,
    pub local_value: serde_json::Value,
    pub remote_value: serde_json::Value,
    pub timestamp: i64,
}

/// Every message shape the transport frames, tagged by `type` on the wire —
/// the same tagged-enum idiom the teacher uses for its own line-protocol
/// messages.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "kebab-case"))]
pub enum WireMessage {
    Push {
        id: String,
        operations: Vec<SyncOperation>,
    },
    Ack {
        id: String,
    },
    Pull {
        id: String,
        #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
        config: Option<PartialSyncConfig>,
    },
    Operations {
        #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
        request_id: Option<String>,
        operations: Vec<SyncOperation>,
    },
    Reconcile {
        #[cfg_attr(feature = "serde", serde(flatten))]
        request: ReconciliationRequest,
    },
    ReconcileResponse {
        id: String,
        response: ReconciliationResponse,
    },
    PartialSync {
        config: PartialSyncConfig,
    },
    PartialSyncComplete,
    Conflict {
        conflict: DataConflict,
    },
}

impl WireMessage {
    /// `true` for the message types a server sends without the client
    /// having asked for that exact response (`operations` broadcasts and
    /// `conflict` notifications) — used by the sync engine to route a
    /// decoded message either to a pending request-table entry or to the
    /// unsolicited streams the Replication Loop consumes.
    #[must_use]
    pub fn is_unsolicited(&self) -> bool {
        matches!(
            self,
            Self::Operations { request_id: None, .. } | Self::Conflict { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::VectorClock;

    fn op(replica: &str) -> SyncOperation {
        SyncOperation {
            id: "op-1".into(),
            kind: OperationKind::Set,
            key: "k".into(),
            value: Some(serde_json::json!("v")),
            timestamp: 1000,
            replica: replica.into(),
            clock: VectorClock::empty().increment(replica),
            server_clock: None,
            op_vector: None,
            collection: None,
            tags: None,
            scope: None,
        }
    }

    #[test]
    #[cfg(feature = "serde")]
    fn push_message_roundtrips_with_type_tag() {
        let msg = WireMessage::Push {
            id: "req-1".into(),
            operations: vec![op("r1")],
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"push\""));
        let back: WireMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn broadcast_operations_message_is_unsolicited() {
        let msg = WireMessage::Operations {
            request_id: None,
            operations: vec![op("r1")],
        };
        assert!(msg.is_unsolicited());
    }

    #[test]
    fn correlated_operations_message_is_not_unsolicited() {
        let msg = WireMessage::Operations {
            request_id: Some("req-1".into()),
            operations: vec![op("r1")],
        };
        assert!(!msg.is_unsolicited());
    }

    #[test]
    fn conflict_message_is_unsolicited() {
        let msg = WireMessage::Conflict {
            conflict: DataConflict {
                key: "k".into(),
                local_value: serde_json::json!("a"),
                remote_value: serde_json::json!("b"),
                timestamp: 1000,
            },
        };
        assert!(msg.is_unsolicited());
    }

    #[test]
    #[cfg(feature = "serde")]
    fn reconcile_response_roundtrips() {
        let response = ReconciliationResponse {
            id: "req-1".into(),
            status: ReconciliationStatus::Conflict,
            server_operations: None,
            resolved_state: Some(VectorClock::empty().increment("s1")),
            conflicts: Some(vec![ConflictEntry {
                key: "k".into(),
                client_value: serde_json::json!("a"),
                server_value: serde_json::json!("b"),
                resolution: ConflictResolution::Server,
            }]),
        };
        let msg = WireMessage::ReconcileResponse {
            id: "req-1".into(),
            response: response.clone(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: WireMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
