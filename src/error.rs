//! Unified error handling for the `latticed` sync engine.
//!
//! Mirrors the teacher's `HandlerError`/`ChannelError` shape: a `thiserror`
//! enum per subsystem, each carrying an `error_code()` for structured log
//! fields, unified under one crate-level `Error` via `#[from]`.

use thiserror::Error;

/// Storage-backend failures (§7).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("key not found: {0}")]
    NotFound(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    #[inline]
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Backend(_) => "backend_error",
        }
    }
}

/// Sync-engine / transport failures (§7).
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("connection error: {0}")]
    ConnectionError(String),

    #[error("failed to initialize transport: {0}")]
    InitError(String),

    #[error("not connected")]
    NotConnected,

    #[error("operation timed out")]
    Timeout,

    #[error("failed to send message: {0}")]
    SendError(String),

    #[error("pull failed: {0}")]
    PullError(String),

    #[error("reconcile failed: {0}")]
    ReconcileError(String),

    #[error("partial sync failed: {0}")]
    PartialSyncError(String),
}

impl SyncError {
    #[inline]
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ConnectionError(_) => "connection_error",
            Self::InitError(_) => "init_error",
            Self::NotConnected => "not_connected",
            Self::Timeout => "timeout",
            Self::SendError(_) => "send_error",
            Self::PullError(_) => "pull_error",
            Self::ReconcileError(_) => "reconcile_error",
            Self::PartialSyncError(_) => "partial_sync_error",
        }
    }
}

/// Unifies every subsystem's error kind behind one type for call sites that
/// cross subsystem boundaries (e.g. the replication loop).
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Crdt(#[from] latticed_core::CrdtError),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}

impl Error {
    #[inline]
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Storage(e) => e.error_code(),
            Self::Sync(e) => e.error_code(),
            Self::Crdt(e) => e.error_code(),
            Self::Config(_) => "config_error",
        }
    }
}

/// Crate-wide result alias, matching the teacher's `HandlerResult` convention.
pub type Result<T> = std::result::Result<T, Error>;
