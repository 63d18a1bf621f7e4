//! Conflict-free Replicated Data Types.
//!
//! Every type here is an immutable value: constructors and mutators all
//! return a new instance rather than mutating in place, and every type's
//! `merge` is commutative, associative, and idempotent — the three laws
//! that let a join-semilattice converge regardless of delivery order. The
//! `crdt` law test suite in each submodule exercises those laws directly;
//! see the crate root for the shared property-test harness.
//!
//! ## Types
//!
//! - [`lww::LwwRegister`] — Last-Writer-Wins register.
//! - [`gset::GSet`] — Grow-only set.
//! - [`two_phase_set::TwoPhaseSet`] — add/remove set where removal is final.
//! - [`tombstone_set::TombstoneSet`] — keyed set with dominance-pruning merge.
//! - [`ordered_set::OrderedSet`] — keyed set with permanent tombstones.
//! - [`or_map::OrMap`] — Observed-Remove map, timestamp-based visibility.
//! - [`pn_counter::PnCounter`] — Positive/Negative counter.
//! - [`rga::Rga`] — Replicated Growable Array (sequence CRDT).

pub mod gset;
pub mod lww;
pub mod or_map;
pub mod ordered_set;
pub mod pn_counter;
pub mod rga;
pub mod tombstone_set;
pub mod two_phase_set;

pub use gset::GSet;
pub use lww::LwwRegister;
pub use or_map::OrMap;
pub use ordered_set::OrderedSet;
pub use pn_counter::PnCounter;
pub use rga::Rga;
pub use tombstone_set::TombstoneSet;
pub use two_phase_set::TwoPhaseSet;

/// A value whose `merge` is commutative, associative, idempotent, and
/// monotone in the underlying join semilattice.
///
/// Unlike the single-server ancestor of this crate (which merged in place,
/// `fn merge(&mut self, other: &Self)`), every CRDT here is an immutable
/// value object per the data model: `merge` takes `&self` and returns a new
/// `Self`, matching "every mutator returns a new instance."
pub trait Crdt: Clone {
    /// Merge `other` into `self`, returning the joined value.
    #[must_use]
    fn merge(&self, other: &Self) -> Self;
}
