//! C1: indexed adjacency for the two graphs the access manager maintains —
//! the bipartite user→group membership graph and the general group→group
//! graph.
//!
//! Both use `BTreeMap`/`BTreeSet` rather than hash collections so that
//! neighbor enumeration and traversal order are deterministic: query results
//! that surface these orderings (e.g. `GetUserToGroupMappings`) are stable
//! across runs, which keeps the test suite and any golden-output comparison
//! honest without requiring the caller to sort.

mod bipartite;
mod homogeneous;
mod pair_index;

pub use bipartite::BipartiteIndex;
pub use homogeneous::{Direction, DirectedGraph, Visit};
pub use pair_index::PairIndex;
