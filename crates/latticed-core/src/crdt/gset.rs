//! Grow-only set (G-Set) CRDT.

use super::Crdt;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::hash::Hash;

/// A set that only ever grows: `add` is the sole mutator, merge is union.
///
/// # Example
///
/// ```rust
/// use latticed_core::crdt::GSet;
///
/// let a: GSet<&str> = GSet::empty().add("alice").add("bob");
/// let b: GSet<&str> = GSet::empty().add("bob").add("charlie");
///
/// let merged = a.merge(&b);
/// assert!(merged.contains(&"alice"));
/// assert!(merged.contains(&"charlie"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GSet<T>
where
    T: Eq + Hash,
{
    elements: HashSet<T>,
}

impl<T> Default for GSet<T>
where
    T: Eq + Hash,
{
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> GSet<T>
where
    T: Eq + Hash + Clone,
{
    /// The empty set.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            elements: HashSet::new(),
        }
    }

    /// A new set with `value` added (no-op if already present).
    #[must_use]
    pub fn add(&self, value: T) -> Self {
        let mut elements = self.elements.clone();
        elements.insert(value);
        Self { elements }
    }

    /// `true` if the set contains `value`.
    #[must_use]
    pub fn contains(&self, value: &T) -> bool {
        self.elements.contains(value)
    }

    /// Number of elements.
    #[must_use]
    pub fn size(&self) -> usize {
        self.elements.len()
    }

    /// `true` if the set has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// All current elements, in unspecified order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.elements.iter()
    }
}

impl<T> Crdt for GSet<T>
where
    T: Eq + Hash + Clone,
{
    /// Set union. Commutative, associative, idempotent; never shrinks.
    fn merge(&self, other: &Self) -> Self {
        let mut elements = self.elements.clone();
        elements.extend(other.elements.iter().cloned());
        Self { elements }
    }
}

impl<T> FromIterator<T> for GSet<T>
where
    T: Eq + Hash,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            elements: iter.into_iter().collect(),
        }
    }
}
