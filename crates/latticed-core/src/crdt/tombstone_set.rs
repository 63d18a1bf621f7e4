//! Tombstone Set CRDT: a keyed set where removal is recorded with a
//! timestamp, allowing a later `add` to resurrect the entry.

use super::Crdt;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
struct Entry<V> {
    value: V,
    ts: i64,
    replica: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
struct Tombstone {
    ts: i64,
    replica: String,
}

fn lex_greater(ts_a: i64, replica_a: &str, ts_b: i64, replica_b: &str) -> bool {
    (ts_a, replica_a) >= (ts_b, replica_b)
}

/// A keyed set where each `id` carries its own entry and tombstone, so
/// elements with a later `add` than any competing tombstone can be
/// resurrected. Contrast with [`OrderedSet`](super::OrderedSet), whose
/// tombstones are permanent.
///
/// # Example
///
/// ```rust
/// use latticed_core::crdt::TombstoneSet;
///
/// let s = TombstoneSet::empty()
///     .add("id1", "hello", 100, "a")
///     .remove("id1", 50, "a"); // older than the add: ignored
/// assert!(s.has("id1"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TombstoneSet<V> {
    entries: HashMap<String, Entry<V>>,
    tombstones: HashMap<String, Tombstone>,
}

impl<V> Default for TombstoneSet<V> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<V> TombstoneSet<V>
where
    V: Clone,
{
    /// The empty set.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
            tombstones: HashMap::new(),
        }
    }

    /// Adds `value` under `id`, skipped if a tombstone with `ts >= ts`
    /// already covers this id.
    #[must_use]
    pub fn add(&self, id: impl Into<String>, value: V, ts: i64, replica: impl Into<String>) -> Self {
        let id = id.into();
        let replica = replica.into();
        if let Some(tomb) = self.tombstones.get(&id) {
            if tomb.ts >= ts {
                return self.clone();
            }
        }
        let mut entries = self.entries.clone();
        entries.insert(id, Entry { value, ts, replica });
        Self {
            entries,
            tombstones: self.tombstones.clone(),
        }
    }

    /// Removes `id`, skipped if an existing entry has `ts > ts`.
    #[must_use]
    pub fn remove(&self, id: impl Into<String>, ts: i64, replica: impl Into<String>) -> Self {
        let id = id.into();
        let replica = replica.into();
        if let Some(entry) = self.entries.get(&id) {
            if entry.ts > ts {
                return self.clone();
            }
        }
        let mut entries = self.entries.clone();
        entries.remove(&id);
        let mut tombstones = self.tombstones.clone();
        tombstones.insert(id, Tombstone { ts, replica });
        Self { entries, tombstones }
    }

    /// Visible iff an entry exists and either no tombstone exists or the
    /// entry's timestamp is strictly greater than the tombstone's.
    #[must_use]
    pub fn has(&self, id: &str) -> bool {
        match (self.entries.get(id), self.tombstones.get(id)) {
            (Some(entry), Some(tomb)) => entry.ts > tomb.ts,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// The value for `id`, if currently visible.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&V> {
        if self.has(id) {
            self.entries.get(id).map(|e| &e.value)
        } else {
            None
        }
    }

    /// Visible values in ascending `(ts, replica)` order.
    pub fn values(&self) -> Vec<&V> {
        let mut visible: Vec<(&String, &Entry<V>)> = self
            .entries
            .iter()
            .filter(|(id, _)| self.has(id))
            .collect();
        visible.sort_by(|(_, a), (_, b)| (a.ts, &a.replica).cmp(&(b.ts, &b.replica)));
        visible.into_iter().map(|(_, e)| &e.value).collect()
    }
}

impl<V> Crdt for TombstoneSet<V>
where
    V: Clone,
{
    /// Four-step merge (§4.2): keep the lexicographically larger
    /// `(ts, replica)` entry and tombstone per key, then prune whichever
    /// side is dominated by the other.
    fn merge(&self, other: &Self) -> Self {
        let mut entries: HashMap<String, Entry<V>> = HashMap::new();
        for id in self.entries.keys().chain(other.entries.keys()) {
            if entries.contains_key(id) {
                continue;
            }
            let winner = match (self.entries.get(id), other.entries.get(id)) {
                (Some(a), Some(b)) => {
                    if lex_greater(a.ts, &a.replica, b.ts, &b.replica) {
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

        let mut tombstones: HashMap<String, Tombstone> = HashMap::new();
        for id in self.tombstones.keys().chain(other.tombstones.keys()) {
            if tombstones.contains_key(id) {
                continue;
            }
            let winner = match (self.tombstones.get(id), other.tombstones.get(id)) {
                (Some(a), Some(b)) => {
                    if lex_greater(a.ts, &a.replica, b.ts, &b.replica) {
                        a.clone()
                    } else {
                        b.clone()
                    }
                }
                (Some(a), None) => a.clone(),
                (None, Some(b)) => b.clone(),
                (None, None) => unreachable!(),
            };
            tombstones.insert(id.clone(), winner);
        }

        for (id, tomb) in &tombstones.clone() {
            if let Some(entry) = entries.get(id) {
                if tomb.ts > entry.ts {
                    entries.remove(id);
                } else if entry.ts > tomb.ts {
                    tombstones.remove(id);
                }
            }
        }

        Self { entries, tombstones }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_remove_hides() {
        let s = TombstoneSet::empty().add("id1", "v", 100, "a").remove("id1", 200, "a");
        assert!(!s.has("id1"));
    }

    #[test]
    fn remove_older_than_entry_is_skipped() {
        let s = TombstoneSet::empty().add("id1", "v", 200, "a").remove("id1", 100, "a");
        assert!(s.has("id1"));
    }

    #[test]
    fn add_blocked_by_newer_tombstone() {
        let s = TombstoneSet::empty()
            .remove("id1", 200, "a")
            .add("id1", "v", 100, "a");
        assert!(!s.has("id1"));
    }

    #[test]
    fn add_after_older_tombstone_resurrects() {
        let s = TombstoneSet::empty()
            .remove("id1", 100, "a")
            .add("id1", "v2", 200, "a");
        assert!(s.has("id1"));
        assert_eq!(s.get("id1"), Some(&"v2"));
    }

    #[test]
    fn merge_prunes_dominated_entry() {
        let a = TombstoneSet::empty().add("id1", "v", 100, "a");
        let b = TombstoneSet::<&str>::empty().remove("id1", 200, "b");
        let merged = a.merge(&b);
        assert!(!merged.has("id1"));
    }

    #[test]
    fn merge_prunes_dominated_tombstone() {
        let a = TombstoneSet::empty().remove("id1", 100, "a");
        let b = TombstoneSet::empty().add("id1", "v", 200, "b");
        let merged = a.merge(&b);
        assert!(merged.has("id1"));
    }

    #[test]
    fn merge_is_commutative() {
        let a = TombstoneSet::empty().add("id1", "v1", 100, "a");
        let b = TombstoneSet::empty().add("id1", "v2", 200, "b");
        assert_eq!(a.merge(&b), b.merge(&a));
    }

    #[test]
    fn merge_is_idempotent() {
        let a = TombstoneSet::empty().add("id1", "v1", 100, "a");
        assert_eq!(a.merge(&a), a);
    }

    #[test]
    fn values_ordered_ascending_by_ts_then_replica() {
        let s = TombstoneSet::empty()
            .add("id2", "second", 200, "a")
            .add("id1", "first", 100, "a");
        assert_eq!(s.values(), vec![&"first", &"second"]);
    }
}
