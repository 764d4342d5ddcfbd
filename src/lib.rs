//! # access-graph-kernel
//!
//! A deterministic, in-memory authorization graph engine.
//!
//! ## Core Contract
//!
//! Users and groups form a bipartite membership graph; groups form an
//! acyclic group-to-group graph; users and groups each map to application
//! components (with an access level) and to entities (scoped by entity
//! type). A query asks whether a user — directly, or transitively through
//! its group memberships — has access to a component or an entity.
//!
//! ## Architecture
//!
//! ```text
//! AccessManagerBuilder → AccessManager<U, G, P, A>
//!                              ↓
//!            graph (C1) + tally + pluggable MetricLogger / EventProcessor / persister
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Every relation is backed by `BTreeMap`/`BTreeSet`, never a hash
//!   collection, so enumeration and traversal order are stable across runs.
//! - Mutations are applied event-at-a-time under a fixed global lock order,
//!   so concurrent callers never deadlock and never observe a partial
//!   mutation.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod canonical;
pub mod concurrency;
pub mod config;
pub mod core;
pub mod dependency_free;
pub mod error;
pub mod events;
pub mod graph;
pub mod ids;
pub mod metrics;
pub mod persistence;

#[cfg(feature = "distributed")]
pub mod coordinator;
#[cfg(feature = "distributed")]
pub mod splitter;

#[cfg(feature = "service")]
pub mod service;

pub use canonical::{canonical_hash, canonical_hash_hex, to_canonical_bytes};
pub use core::{AccessManager, AccessManagerBuilder, AccessManagerConfig, MutationOutcome, TallyCounts};
pub use dependency_free::{EventProcessor, NoOpEventProcessor, RemovalMode};
pub use error::{AccessManagerError, Result};
pub use events::{AccessManagerEvent, EventId, EventPosition, RecordedEvent, TransactionTime};
pub use ids::Identity;
pub use metrics::{MetricLogger, NoOpMetricLogger, TracingMetricLogger};
pub use persistence::{AccessManagerEventPersister, InMemoryEventPersister};

#[cfg(feature = "postgres")]
pub use persistence::{PostgresEventPersister, PostgresPersisterConfig};

#[cfg(feature = "distributed")]
pub use coordinator::{DistributedQueryCoordinator, HashRange, ShardClient, ShardRouter};
#[cfg(feature = "distributed")]
pub use splitter::{RetryBudget, ShardSplitter, SplitPhase, SplitSource, SplitTarget};

#[cfg(feature = "service")]
pub use service::{router, ServiceState, StringAccessManager};

/// Schema version for the wire event taxonomy.
/// Increment on breaking changes to any event type.
pub const ACCESS_MANAGER_SCHEMA_VERSION: &str = "1.0.0";
