//! Ordered Set CRDT: like [`TombstoneSet`](super::TombstoneSet), but
//! tombstones are permanent — add-after-remove never resurrects, even with
//! a later timestamp.

use super::Crdt;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
struct Entry<V> {
    value: V,
    ts: i64,
    replica: String,
}

/// A keyed set with permanent removal, simpler than [`TombstoneSet`].
///
/// # Example
///
/// ```rust
/// use latticed_core::crdt::OrderedSet;
///
/// let s = OrderedSet::empty()
///     .add("id1", "v1", 100, "a")
///     .remove("id1")
///     .add("id1", "v2", 999, "a"); // later timestamp does not resurrect
/// assert!(!s.has("id1"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OrderedSet<V> {
    entries: HashMap<String, Entry<V>>,
    tombstones: HashSet<String>,
}

impl<V> Default for OrderedSet<V> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<V> OrderedSet<V>
where
    V: Clone,
{
    /// The empty set.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
            tombstones: HashSet::new(),
        }
    }

    /// Adds `value` under `id`; a no-op if `id` is permanently tombstoned.
    #[must_use]
    pub fn add(&self, id: impl Into<String>, value: V, ts: i64, replica: impl Into<String>) -> Self {
        let id = id.into();
        if self.tombstones.contains(&id) {
            return self.clone();
        }
        let mut entries = self.entries.clone();
        entries.insert(
            id,
            Entry {
                value,
                ts,
                replica: replica.into(),
            },
        );
        Self {
            entries,
            tombstones: self.tombstones.clone(),
        }
    }

    /// Permanently removes `id`.
    #[must_use]
    pub fn remove(&self, id: impl Into<String>) -> Self {
        let id = id.into();
        let mut entries = self.entries.clone();
        entries.remove(&id);
        let mut tombstones = self.tombstones.clone();
        tombstones.insert(id);
        Self { entries, tombstones }
    }

    /// `true` iff `id` has a live entry and is not tombstoned.
    #[must_use]
    pub fn has(&self, id: &str) -> bool {
        self.entries.contains_key(id) && !self.tombstones.contains(id)
    }

    /// The value for `id`, if present and not tombstoned.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&V> {
        if self.has(id) {
            self.entries.get(id).map(|e| &e.value)
        } else {
            None
        }
    }
}

impl<V> Crdt for OrderedSet<V>
where
    V: Clone,
{
    /// Entries merged by `(ts, replica)` max; tombstone set is a union (and,
    /// being permanent, always wins over a competing entry).
    fn merge(&self, other: &Self) -> Self {
        let mut entries: HashMap<String, Entry<V>> = HashMap::new();
        for id in self.entries.keys().chain(other.entries.keys()) {
            if entries.contains_key(id) {
                continue;
            }
            let winner = match (self.entries.get(id), other.entries.get(id)) {
                (Some(a), Some(b)) => {
                    if (a.ts, &a.replica) >= (b.ts, &b.replica) {
                        a.clone()
                    } else {
                        b.clone()
                    }
                }
                (Some(a), None) => a.clone(),
                (None, Some(b)) => b.clone(),
                (None, None) => unreachable!(),
            };
            entries.insert(id.clone(), winner);
        }

        let mut tombstones = self.tombstones.clone();
        tombstones.extend(other.tombstones.iter().cloned());
        for id in &tombstones {
            entries.remove(id);
        }

        Self { entries, tombstones }
    }
}
