//! Last-Writer-Wins (LWW) Register CRDT.

use super::Crdt;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A register that resolves concurrent writes by timestamp, then by replica.
///
/// `merge` keeps the value with the larger `ts`; on an exact tie, the value
/// with the lexicographically larger `replica` wins. Wall-clock skew is
/// accepted: the contract is convergence, not real-time ordering.
///
/// # Example
///
/// ```rust
/// use latticed_core::crdt::LwwRegister;
///
/// let r1 = LwwRegister::new("v1", 1000, "a");
/// let r2 = LwwRegister::new("v2", 1000, "b");
///
/// assert_eq!(r1.merge(&r2).value(), &"v2");
/// assert_eq!(r2.merge(&r1).value(), &"v2");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LwwRegister<T> {
    value: T,
    ts: i64,
    replica: String,
}

impl<T> LwwRegister<T> {
    /// A register stamped with `ts` and `replica`.
    pub fn new(value: T, ts: i64, replica: impl Into<String>) -> Self {
        Self {
            value,
            ts,
            replica: replica.into(),
        }
    }

    /// The current value.
    #[must_use]
    pub fn value(&self) -> &T {
        &self.value
    }

    /// The timestamp the current value was stamped with.
    #[must_use]
    pub fn ts(&self) -> i64 {
        self.ts
    }

    /// The replica that wrote the current value.
    #[must_use]
    pub fn replica(&self) -> &str {
        &self.replica
    }

    /// A new register with `value` stamped at the current wall-clock time.
    #[must_use]
    pub fn set(&self, value: T, replica: impl Into<String>) -> Self
    where
        T: Clone,
    {
        let ts = chrono::Utc::now().timestamp_millis();
        Self {
            value,
            ts,
            replica: replica.into(),
        }
    }
}

impl<T: Default> Default for LwwRegister<T> {
    fn default() -> Self {
        Self {
            value: T::default(),
            ts: 0,
            replica: String::new(),
        }
    }
}

impl<T> Crdt for LwwRegister<T>
where
    T: Clone,
{
    /// Larger `ts` wins; exact ties broken by larger `replica`.
    fn merge(&self, other: &Self) -> Self {
        let self_wins = match self.ts.cmp(&other.ts) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => self.replica >= other.replica,
        };
        if self_wins {
            self.clone()
        } else {
            other.clone()
        }
    }
}
