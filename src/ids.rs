//! Identifier trait shared by the four type parameters of the access graph.
//!
//! The AccessManager is generic over `U` (user), `G` (group), `P` (application
//! component), and `A` (access level). All four play the same role: an opaque,
//! cloneable, orderable identifier. Rather than repeat the bound at every
//! `impl<U, G, P, A>` site we collect it into a single blanket trait.

use std::fmt::Display;
use std::hash::Hash;

/// Bound satisfied by every identifier type usable as U, G, P, or A.
///
/// Identifiers are stored by value (never by pointer) throughout the crate,
/// so `Clone` must be cheap; callers typically use `String`, `Arc<str>`, or a
/// small `Copy` newtype over `u64`/`Uuid`.
pub trait Identity: Clone + Eq + Ord + Hash + Display + Send + Sync + 'static {}

impl<T> Identity for T where T: Clone + Eq + Ord + Hash + Display + Send + Sync + 'static {}
