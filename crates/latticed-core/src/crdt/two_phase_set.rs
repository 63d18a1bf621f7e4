//! Two-Phase Set (2P-Set) CRDT.

use super::Crdt;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::hash::Hash;

/// A set where removal is permanent: once removed, an element can never be
/// re-added. Internally two [`GSet`](super::GSet)-like grow-only sets,
/// `adds` and `removes`; `has(e)` is `e ∈ adds ∧ e ∉ removes`.
///
/// # Example
///
/// ```rust
/// use latticed_core::crdt::TwoPhaseSet;
///
/// let s = TwoPhaseSet::empty().add("x").remove("x").add("x");
/// assert!(!s.has(&"x")); // resurrection is blocked
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TwoPhaseSet<T>
where
    T: Eq + Hash,
{
    adds: HashSet<T>,
    removes: HashSet<T>,
}

impl<T> Default for TwoPhaseSet<T>
where
    T: Eq + Hash,
{
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> TwoPhaseSet<T>
where
    T: Eq + Hash + Clone,
{
    /// The empty set.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            adds: HashSet::new(),
            removes: HashSet::new(),
        }
    }

    /// Adds `e`, unless `e` has already been removed (permanently blocked).
    #[must_use]
    pub fn add(&self, e: T) -> Self {
        if self.removes.contains(&e) {
            return self.clone();
        }
        let mut adds = self.adds.clone();
        adds.insert(e);
        Self {
            adds,
            removes: self.removes.clone(),
        }
    }

    /// Marks `e` as removed, whether or not it was ever added.
    #[must_use]
    pub fn remove(&self, e: T) -> Self {
        let mut removes = self.removes.clone();
        removes.insert(e);
        Self {
            adds: self.adds.clone(),
            removes,
        }
    }

    /// `true` iff `e` was added and has not been removed.
    #[must_use]
    pub fn has(&self, e: &T) -> bool {
        self.adds.contains(e) && !self.removes.contains(e)
    }

    /// Currently-visible elements.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.adds.iter().filter(|e| !self.removes.contains(*e))
    }
}

impl<T> Crdt for TwoPhaseSet<T>
where
    T: Eq + Hash + Clone,
{
    /// Union both the `adds` and `removes` sides.
    fn merge(&self, other: &Self) -> Self {
        let mut adds = self.adds.clone();
        adds.extend(other.adds.iter().cloned());
        let mut removes = self.removes.clone();
        removes.extend(other.removes.iter().cloned());
        Self { adds, removes }
    }
}
