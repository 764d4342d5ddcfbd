//! C3: the fixed lock acquisition order over the nine named resources the
//! access manager guards.
//!
//! Each resource is a real `parking_lot::RwLock` guarding the actual
//! collection (not a placeholder semaphore), so the lock IS the data: there
//! is nothing to keep "in sync" between a lock and what it protects. What
//! this module fixes is the *order* operations acquire those locks in, so
//! that two operations needing overlapping resource sets can never deadlock
//! against each other.
//!
//! A sharded concurrent map (e.g. `DashMap`) was considered and rejected:
//! the access patterns here need multiple resources locked together for the
//! duration of one composite operation (an `AddUserToGroupMapping` touches
//! `users`, `groups`, and `userToGroupMap` as a unit), which a key-sharded
//! map cannot express, and the spec calls for named, inspectable locks
//! rather than opaque shard stripes.

/// The nine resources the core protects, in their fixed acquisition order.
/// Every operation that needs more than one of these must acquire them in
/// this order; [`LockSet::in_order`] is a debug-only sanity check callers can
/// run over the resources an operation declares it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockTarget {
    /// The `users` primary set.
    Users,
    /// The `groups` primary set.
    Groups,
    /// The `UserToGroup` mapping.
    UserToGroupMap,
    /// The `GroupToGroup` mapping.
    GroupToGroupMap,
    /// The `UserToComponent` mapping.
    UserToComponentMap,
    /// The `GroupToComponent` mapping.
    GroupToComponentMap,
    /// The entity-type -> entities store.
    Entities,
    /// The `UserToEntity` mapping.
    UserToEntityMap,
    /// The `GroupToEntity` mapping.
    GroupToEntityMap,
}

impl LockTarget {
    /// The fixed global acquisition order, lowest first.
    pub const ORDER: [LockTarget; 9] = [
        LockTarget::Users,
        LockTarget::Groups,
        LockTarget::UserToGroupMap,
        LockTarget::GroupToGroupMap,
        LockTarget::UserToComponentMap,
        LockTarget::GroupToComponentMap,
        LockTarget::Entities,
        LockTarget::UserToEntityMap,
        LockTarget::GroupToEntityMap,
    ];

    fn rank(self) -> usize {
        Self::ORDER.iter().position(|t| *t == self).expect("LockTarget::ORDER is exhaustive")
    }
}

/// Verify that `targets`, as listed, are non-decreasing in the fixed order.
/// Every `AccessManager` mutation method declares the locks it needs as a
/// `const` slice and asserts this in a `debug_assert!` before acquiring them,
/// so an accidental reordering during a future edit fails fast in tests
/// rather than deadlocking in production under contention.
pub fn in_order(targets: &[LockTarget]) -> bool {
    targets.windows(2).all(|pair| pair[0].rank() <= pair[1].rank())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_order_is_itself_in_order() {
        assert!(in_order(&LockTarget::ORDER));
    }

    #[test]
    fn reversed_pair_is_rejected() {
        assert!(!in_order(&[LockTarget::GroupToGroupMap, LockTarget::Users]));
    }
}
