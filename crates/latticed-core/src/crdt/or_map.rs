//! Observed-Remove Map (OR-Map) CRDT: per-key add/remove with
//! timestamp-based visibility.

use super::Crdt;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
struct Slot<V> {
    value: V,
    added: i64,
    removed: Option<i64>,
}

impl<V> Slot<V> {
    fn activity(&self) -> i64 {
        self.removed.unwrap_or(self.added)
    }
}

/// A map where each key independently tracks its last add/remove activity.
///
/// `put(k, v)` always overwrites any previous entry for `k` and clears its
/// removed marker; `remove(k)` is a no-op on a missing or already-removed
/// key. `get(k)` is visible only while `removed` is absent.
///
/// # Example
///
/// ```rust
/// use latticed_core::crdt::OrMap;
///
/// let m = OrMap::empty().put("k", "v1", 100).remove("k", 200);
/// assert_eq!(m.get("k"), None);
/// let m = m.put("k", "v2", 300);
/// assert_eq!(m.get("k"), Some(&"v2"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OrMap<K, V>
where
    K: Eq + Hash,
{
    slots: HashMap<K, Slot<V>>,
}

impl<K, V> Default for OrMap<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::empty()
    }
}

impl<K, V> OrMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// The empty map.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            slots: HashMap::new(),
        }
    }

    /// Sets `k` to `v`, overwriting any previous entry and clearing removal.
    #[must_use]
    pub fn put(&self, k: K, v: V, added: i64) -> Self {
        let mut slots = self.slots.clone();
        slots.insert(
            k,
            Slot {
                value: v,
                added,
                removed: None,
            },
        );
        Self { slots }
    }

    /// Marks `k` removed at `ts`; a no-op if `k` is missing or already
    /// removed.
    #[must_use]
    pub fn remove(&self, k: &K, ts: i64) -> Self {
        let mut slots = self.slots.clone();
        if let Some(slot) = slots.get_mut(k) {
            if slot.removed.is_none() {
                slot.removed = Some(ts);
            }
        }
        Self { slots }
    }

    /// The value for `k`, if present and not removed.
    #[must_use]
    pub fn get(&self, k: &K) -> Option<&V> {
        self.slots
            .get(k)
            .filter(|slot| slot.removed.is_none())
            .map(|slot| &slot.value)
    }

    /// Currently-visible `(key, value)` pairs.
    pub fn entries(&self) -> impl Iterator<Item = (&K, &V)> {
        self.slots
            .iter()
            .filter(|(_, slot)| slot.removed.is_none())
            .map(|(k, slot)| (k, &slot.value))
    }
}

impl<K, V> Crdt for OrMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Per key, keep the side whose `max(added, removed.unwrap_or(added))`
    /// (its latest activity) is greater.
    fn merge(&self, other: &Self) -> Self {
        let mut slots: HashMap<K, Slot<V>> = HashMap::new();
        for k in self.slots.keys().chain(other.slots.keys()) {
            if slots.contains_key(k) {
                continue;
            }
            let winner = match (self.slots.get(k), other.slots.get(k)) {
                (Some(a), Some(b)) => {
                    if a.activity() >= b.activity() {
                        a.clone()
                    } else {
                        b.clone()
                    }
                }
                (Some(a), None) => a.clone(),
                (None, Some(b)) => b.clone(),
                (None, None) => unreachable!(),
            };
            slots.insert(k.clone(), winner);
        }
        Self { slots }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get() {
        let m = OrMap::empty().put("k", "v", 100);
        assert_eq!(m.get(&"k"), Some(&"v"));
    }

    #[test]
    fn remove_hides_value() {
        let m = OrMap::empty().put("k", "v", 100).remove(&"k", 200);
        assert_eq!(m.get(&"k"), None);
    }

    #[test]
    fn remove_on_missing_key_is_noop() {
        let m: OrMap<&str, &str> = OrMap::empty().remove(&"missing", 100);
        assert_eq!(m.get(&"missing"), None);
    }

    #[test]
    fn put_after_remove_resurrects() {
        let m = OrMap::empty()
            .put("k", "v1", 100)
            .remove(&"k", 200)
            .put("k", "v2", 300);
        assert_eq!(m.get(&"k"), Some(&"v2"));
    }

    #[test]
    fn merge_keeps_latest_activity() {
        let a = OrMap::empty().put("k", "v1", 100);
        let b = OrMap::empty().put("k", "v1", 100).remove(&"k", 200);
        let merged = a.merge(&b);
        assert_eq!(merged.get(&"k"), None);
        assert_eq!(b.merge(&a), merged);
    }

    #[test]
    fn merge_is_idempotent_and_commutative() {
        let a = OrMap::empty().put("k1", "v1", 100);
        let b = OrMap::empty().put("k2", "v2", 200);
        assert_eq!(a.merge(&b), b.merge(&a));
        assert_eq!(a.merge(&a), a);
    }
}
