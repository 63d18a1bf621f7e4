//! CRDT algebra, vector clocks, and wire protocol types for the `latticed`
//! replication engine.
//!
//! This crate is the pure, synchronous core: no I/O, no async runtime, no
//! storage backend. The `latticed` binary crate builds the sync engine,
//! storage trait, replication loop, collection facades, and hub on top of
//! the types exported here.

pub mod clock;
pub mod crdt;
pub mod error;
pub mod protocol;

pub use clock::{CausalOrder, ReplicaId, VectorClock};
pub use crdt::{Crdt, GSet, LwwRegister, OrMap, OrderedSet, PnCounter, Rga, TombstoneSet, TwoPhaseSet};
pub use error::{CrdtError, CrdtResult};
pub use protocol::{
    ConflictEntry, ConflictResolution, DataConflict, OperationKind, PartialSyncConfig,
    ReconciliationRequest, ReconciliationResponse, ReconciliationStatus, SyncOperation, WireMessage,
};
