//! Replicated Growable Array (RGA) CRDT: a sequence ordered by dense
//! dotted-decimal position strings.

use super::Crdt;
use crate::error::{CrdtError, CrdtResult};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A dotted-decimal position, e.g. `[0, 1, 5]` renders as `"0.1.5"`.
///
/// Backed by `Vec<i64>` because Rust's derived slice/vec `Ord` is already
/// lexicographic with "shorter common-prefix is less" — exactly the
/// comparison the dotted-decimal scheme requires, so no custom `Ord` impl is
/// needed. Components are signed so `before()` can always decrement the
/// trailing component directly, with no special-casing for an all-zero
/// position (notably `before_any()`'s own `[0, 0]`, the position `append()`
/// gives the very first element ever inserted).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Position(Vec<i64>);

impl Position {
    fn before_any() -> Self {
        Self(vec![0, 0])
    }

    fn after(p: &Self) -> Self {
        let mut v = p.0.clone();
        match v.last_mut() {
            Some(last) => *last += 1,
            None => v.push(1),
        }
        Self(v)
    }

    /// A position strictly less than `q`: decrementing the trailing
    /// component always yields one, since that component may go negative —
    /// unlike the unsigned scheme this replaced, there is no "already at the
    /// floor" case to fall back on.
    fn before(q: &Self) -> Self {
        let mut v = q.0.clone();
        match v.last_mut() {
            Some(last) => *last -= 1,
            None => v.push(-1),
        }
        Self(v)
    }

    fn between(p: &Self, q: &Self) -> Self {
        let max_len = p.0.len().max(q.0.len());
        for i in 0..max_len {
            let pi = p.0.get(i).copied().unwrap_or(0);
            let qi = q.0.get(i).copied().unwrap_or(0);
            if pi != qi {
                if qi > pi + 1 {
                    let mut v: Vec<i64> = p.0.get(..i).unwrap_or(&p.0).to_vec();
                    while v.len() < i {
                        v.push(0);
                    }
                    v.push((pi + qi) / 2);
                    return Self(v);
                }
                let mut v = p.0.clone();
                v.push(0);
                return Self(v);
            }
        }
        // p == q: callers never ask for a gap between equal bounds.
        let mut v = p.0.clone();
        v.push(0);
        Self(v)
    }

    /// Dotted-decimal string form, e.g. `"0.1.5"`.
    #[must_use]
    pub fn to_dotted_string(&self) -> String {
        self.0
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
struct Node<V> {
    value: V,
    ts: i64,
    replica: String,
    position: Position,
}

/// A sequence CRDT: logical order is the ascending sort of [`Position`]s;
/// concurrent inserts at the same id collide and resolve by `(ts, replica)`
/// max, matching every other CRDT in this crate.
///
/// Removal drops the id locally; because a [`Collection`](crate) facade
/// always syncs the whole `Rga` value rather than per-id deltas, a remove
/// that has not yet propagated can be reintroduced by a merge with a
/// replica that still holds the id — this follows directly from the merge
/// rule in §4.2 ("union of id→entry") which specifies no tombstone set for
/// this type.
///
/// # Example
///
/// ```rust
/// use latticed_core::crdt::Rga;
///
/// let r = Rga::empty().append("a", "r1").append("c", "r1");
/// let r = r.insert_at(1, "b", "r1").unwrap();
/// assert_eq!(r.to_vec(), vec![&"a", &"b", &"c"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rga<V> {
    nodes: HashMap<String, Node<V>>,
}

impl<V> Default for Rga<V> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<V> Rga<V>
where
    V: Clone,
{
    /// The empty sequence.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            nodes: HashMap::new(),
        }
    }

    fn sorted(&self) -> Vec<&Node<V>> {
        let mut nodes: Vec<&Node<V>> = self.nodes.values().collect();
        nodes.sort_by(|a, b| a.position.cmp(&b.position));
        nodes
    }

    /// Number of live elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// `true` if the sequence has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The sequence in logical (position) order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<&V> {
        self.sorted().into_iter().map(|n| &n.value).collect()
    }

    /// Appends `value` after the current last element.
    #[must_use]
    pub fn append(&self, value: V, replica: impl Into<String>) -> Self {
        let max_position = self.sorted().last().map(|n| n.position.clone());
        let position = match max_position {
            Some(p) => Position::after(&p),
            None => Position::before_any(),
        };
        self.insert_with_position(value, replica, position)
    }

    /// Inserts `value` so it lands at sorted index `i`, shifting subsequent
    /// elements. Fails with [`CrdtError::IndexOutOfBounds`] if `i > len()`.
    pub fn insert_at(&self, i: usize, value: V, replica: impl Into<String>) -> CrdtResult<Self> {
        let sorted = self.sorted();
        if i > sorted.len() {
            return Err(CrdtError::IndexOutOfBounds {
                index: i,
                len: sorted.len(),
            });
        }
        let predecessor = if i == 0 { None } else { Some(sorted[i - 1].position.clone()) };
        let successor = sorted.get(i).map(|n| n.position.clone());

        let position = match (predecessor, successor) {
            (None, None) => Position::before_any(),
            (None, Some(q)) => Position::before(&q),
            (Some(p), None) => Position::after(&p),
            (Some(p), Some(q)) => Position::between(&p, &q),
        };
        Ok(self.insert_with_position(value, replica, position))
    }

    fn insert_with_position(&self, value: V, replica: impl Into<String>, position: Position) -> Self {
        let mut nodes = self.nodes.clone();
        let replica = replica.into();
        let id = format!("{}-{}", replica, uuid::Uuid::new_v4());
        let ts = chrono::Utc::now().timestamp_millis();
        nodes.insert(
            id,
            Node {
                value,
                ts,
                replica,
                position,
            },
        );
        Self { nodes }
    }

    /// Removes the element at sorted index `i`. Fails with
    /// [`CrdtError::IndexOutOfBounds`] if `i >= len()`.
    pub fn remove_at(&self, i: usize) -> CrdtResult<Self> {
        let sorted = self.sorted();
        let id = sorted
            .get(i)
            .map(|n| n.position.clone())
            .ok_or(CrdtError::IndexOutOfBounds {
                index: i,
                len: sorted.len(),
            })?;
        let mut nodes = self.nodes.clone();
        nodes.retain(|_, n| n.position != id);
        Ok(Self { nodes })
    }
}

impl<V> Crdt for Rga<V>
where
    V: Clone,
{
    /// Union of `id → entry`; on an id collision, keep the `(ts, replica)`
    /// max.
    fn merge(&self, other: &Self) -> Self {
        let mut nodes = self.nodes.clone();
        for (id, node) in &other.nodes {
            match nodes.get(id) {
                Some(existing) if (existing.ts, &existing.replica) >= (node.ts, &node.replica) => {}
                _ => {
                    nodes.insert(id.clone(), node.clone());
                }
            }
        }
        Self { nodes }
    }
}
