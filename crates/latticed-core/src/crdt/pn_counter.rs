//! Positive/Negative Counter (PN-Counter) CRDT.

use super::Crdt;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A counter that supports both increment and decrement while still
/// converging: two per-replica maps, `incs` and `decs`, joined per-replica
/// by `max`. `value() = Σincs − Σdecs`.
///
/// # Example
///
/// ```rust
/// use latticed_core::crdt::PnCounter;
///
/// let a = PnCounter::empty().increment("r1", 5).decrement("r1", 2);
/// let b = PnCounter::empty().increment("r2", 3).decrement("r2", 1);
/// assert_eq!(a.merge(&b).value(), 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PnCounter {
    incs: HashMap<String, u64>,
    decs: HashMap<String, u64>,
}

impl Default for PnCounter {
    fn default() -> Self {
        Self::empty()
    }
}

impl PnCounter {
    /// The zero counter.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            incs: HashMap::new(),
            decs: HashMap::new(),
        }
    }

    /// Adds `n` to `replica`'s increment bucket.
    #[must_use]
    pub fn increment(&self, replica: impl Into<String>, n: u64) -> Self {
        let mut incs = self.incs.clone();
        *incs.entry(replica.into()).or_insert(0) += n;
        Self {
            incs,
            decs: self.decs.clone(),
        }
    }

    /// Adds `n` to `replica`'s decrement bucket.
    #[must_use]
    pub fn decrement(&self, replica: impl Into<String>, n: u64) -> Self {
        let mut decs = self.decs.clone();
        *decs.entry(replica.into()).or_insert(0) += n;
        Self {
            incs: self.incs.clone(),
            decs,
        }
    }

    /// `Σincs − Σdecs`.
    #[must_use]
    pub fn value(&self) -> i64 {
        let total_incs: u64 = self.incs.values().sum();
        let total_decs: u64 = self.decs.values().sum();
        total_incs as i64 - total_decs as i64
    }
}

impl Crdt for PnCounter {
    /// Per-replica `max` on both the `incs` and `decs` maps.
    fn merge(&self, other: &Self) -> Self {
        let mut incs = self.incs.clone();
        for (replica, &n) in &other.incs {
            let slot = incs.entry(replica.clone()).or_insert(0);
            *slot = (*slot).max(n);
        }
        let mut decs = self.decs.clone();
        for (replica, &n) in &other.decs {
            let slot = decs.entry(replica.clone()).or_insert(0);
            *slot = (*slot).max(n);
        }
        Self { incs, decs }
    }
}
