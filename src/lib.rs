//! latticed - a local-first replicated data engine.
//!
//! CRDTs, vector clocks, and a sync engine over a pluggable storage and
//! transport, re-exported as a library so the binary, the benchmarks, and
//! the crate-level integration tests all build on the same modules.

pub mod collection;
pub mod config;
pub mod error;
pub mod hub;
pub mod replication;
pub mod storage;
pub mod telemetry;
pub mod transport;
pub mod websocket;

pub use error::{Error, Result};
