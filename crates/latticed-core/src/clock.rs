//! Vector clocks for causal ordering across replicas.
//!
//! A [`VectorClock`] maps a replica identifier to a monotone counter. It is
//! the causality primitive every CRDT and the replication loop rely on to
//! decide whether one observation happened-before, happened-after, or is
//! concurrent with another.

use std::cmp::Ordering as StdOrdering;
use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Opaque, non-empty, stable-for-the-lifetime-of-a-replica identifier.
///
/// Doubles as a map key in the vector clock and as a deterministic
/// lexicographic tie-breaker in several CRDTs.
pub type ReplicaId = String;

/// The result of comparing two vector clocks under the causal partial order.
///
/// The spec's `compare` collapses `Equal` and `Concurrent` into a single
/// value since the replication loop only ever branches on `Less` ("strictly
/// dominated, skip"); this type keeps them distinct because `Ordering::Equal`
/// is a useful, testable special case of concurrency, as long as callers
/// that need spec-exact behavior treat `Concurrent` and `Equal` alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CausalOrder {
    Less,
    Greater,
    Equal,
    Concurrent,
}

impl CausalOrder {
    /// True for `Equal` or `Concurrent` — the spec's collapsed "neither
    /// dominates" case.
    #[must_use]
    pub fn is_concurrent(self) -> bool {
        matches!(self, Self::Equal | Self::Concurrent)
    }
}

/// A per-replica logical clock: `replica -> counter`, missing entries are zero.
///
/// Every operation is a pure function returning a new clock; `VectorClock`
/// itself is never mutated in place, matching the "every mutator returns a
/// new instance" rule the CRDT values in this crate also follow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VectorClock {
    entries: HashMap<ReplicaId, u64>,
}

impl VectorClock {
    /// The empty clock: every replica reads zero.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Current counter for `replica`; zero if absent.
    #[must_use]
    pub fn get(&self, replica: &str) -> u64 {
        self.entries.get(replica).copied().unwrap_or(0)
    }

    /// A new clock with `replica`'s counter incremented by one.
    #[must_use]
    pub fn increment(&self, replica: &str) -> Self {
        let mut entries = self.entries.clone();
        let counter = entries.entry(replica.to_string()).or_insert(0);
        *counter += 1;
        Self { entries }
    }

    /// Componentwise max of both clocks.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        let mut entries = self.entries.clone();
        for (replica, &count) in &other.entries {
            let slot = entries.entry(replica.clone()).or_insert(0);
            *slot = (*slot).max(count);
        }
        Self { entries }
    }

    /// Compare under the causal partial order (§4.1 algorithm): iterate the
    /// union of keys, tracking whether any component is strictly smaller and
    /// whether any is strictly larger.
    #[must_use]
    pub fn compare(&self, other: &Self) -> CausalOrder {
        let mut any_less = false;
        let mut any_greater = false;

        let keys = self.entries.keys().chain(other.entries.keys());
        let mut seen = std::collections::HashSet::new();
        for replica in keys {
            if !seen.insert(replica.as_str()) {
                continue;
            }
            match self.get(replica).cmp(&other.get(replica)) {
                StdOrdering::Less => any_less = true,
                StdOrdering::Greater => any_greater = true,
                StdOrdering::Equal => {}
            }
        }

        match (any_less, any_greater) {
            (true, false) => CausalOrder::Less,
            (false, true) => CausalOrder::Greater,
            (false, false) => CausalOrder::Equal,
            (true, true) => CausalOrder::Concurrent,
        }
    }

    /// Spec-exact comparison: collapses `Equal` into `Concurrent` so callers
    /// only ever see `{Less, Greater, Concurrent}` (§3, §9).
    #[must_use]
    pub fn compare_collapsed(&self, other: &Self) -> CausalOrder {
        match self.compare(other) {
            CausalOrder::Equal => CausalOrder::Concurrent,
            other => other,
        }
    }

    /// `true` iff `self` strictly happened-before `other`.
    #[must_use]
    pub fn happened_before(&self, other: &Self) -> bool {
        matches!(self.compare(other), CausalOrder::Less)
    }

    /// Iterate `(replica, counter)` pairs for entries with a non-zero counter.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(k, &v)| (k.as_str(), v))
    }
}

impl FromIterator<(ReplicaId, u64)> for VectorClock {
    fn from_iter<I: IntoIterator<Item = (ReplicaId, u64)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_clock_reads_zero_everywhere() {
        let vc = VectorClock::empty();
        assert_eq!(vc.get("r1"), 0);
    }

    #[test]
    fn increment_bumps_exactly_one_key() {
        let vc = VectorClock::empty().increment("r1");
        assert_eq!(vc.get("r1"), 1);
        assert_eq!(vc.get("r2"), 0);
    }

    #[test]
    fn increment_is_monotone_at_the_bumped_key() {
        let vc = VectorClock::empty().increment("r1");
        let vc2 = vc.increment("r1");
        assert!(vc2.get("r1") > vc.get("r1"));
    }

    #[test]
    fn compare_self_increment_is_less() {
        let vc = VectorClock::empty().increment("r1");
        let vc2 = vc.increment("r1");
        assert_eq!(vc.compare(&vc2), CausalOrder::Less);
        assert_eq!(vc2.compare(&vc), CausalOrder::Greater);
    }

    #[test]
    fn independent_increments_are_concurrent() {
        let vc1 = VectorClock::empty().increment("r1");
        let vc2 = VectorClock::empty().increment("r2");
        assert_eq!(vc1.compare(&vc2), CausalOrder::Concurrent);
        assert_eq!(vc2.compare(&vc1), CausalOrder::Concurrent);
    }

    #[test]
    fn empty_is_less_than_any_nonempty() {
        let empty = VectorClock::empty();
        let vc = VectorClock::empty().increment("r1");
        assert_eq!(empty.compare(&vc), CausalOrder::Less);
    }

    #[test]
    fn empty_is_equal_to_itself() {
        let empty = VectorClock::empty();
        assert_eq!(empty.compare(&empty), CausalOrder::Equal);
        assert!(empty.compare_collapsed(&empty).is_concurrent());
    }

    #[test]
    fn merge_is_componentwise_max() {
        let vc1 = VectorClock::empty().increment("r1").increment("r1");
        let vc2 = VectorClock::empty().increment("r2").increment("r2").increment("r2");
        let merged = vc1.merge(&vc2);
        assert_eq!(merged.get("r1"), 2);
        assert_eq!(merged.get("r2"), 3);
    }

    #[test]
    fn merge_dominates_both_inputs() {
        let vc1 = VectorClock::empty().increment("r1");
        let vc2 = VectorClock::empty().increment("r2");
        let merged = vc1.merge(&vc2);
        assert_eq!(vc1.compare(&merged), CausalOrder::Less);
        assert_eq!(vc2.compare(&merged), CausalOrder::Less);
    }

    #[test]
    fn scenario_vector_clock_partial_order() {
        // Scenario 5 from the testable-properties section.
        let vc1 = VectorClock::empty().increment("r1");
        let vc2 = VectorClock::empty().increment("r2");
        assert_eq!(vc1.compare_collapsed(&vc2), CausalOrder::Concurrent);

        let vc2_prime = vc2.increment("r2").increment("r1");
        assert_eq!(vc2.compare(&vc2_prime), CausalOrder::Less);
    }
}
