//! CRDT-layer errors.
//!
//! Mirrors the `error_code()`-bearing `thiserror` style the rest of the
//! ambient stack uses (see the root crate's `error` module) so that every
//! error kind in the library is both a typed value and a stable string for
//! structured log fields.

use thiserror::Error;

/// Invariant violations raised by a CRDT mutator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CrdtError {
    #[error("index {index} out of bounds for sequence of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("cannot generate a position strictly between the given bounds")]
    PositionGenerationFailed,
}

impl CrdtError {
    #[inline]
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::IndexOutOfBounds { .. } => "index_out_of_bounds",
            Self::PositionGenerationFailed => "position_generation_failed",
        }
    }
}

pub type CrdtResult<T> = Result<T, CrdtError>;
