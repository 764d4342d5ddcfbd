//! C5: the dependency-free event processing contract.
//!
//! In dependency-free mode a mapping-add event whose primary elements are
//! absent is not rejected: the missing `UserAdd`/`GroupAdd`/`EntityTypeAdd`/
//! `EntityAdd` events are synthesized first, applied, and forwarded to a
//! downstream [`EventProcessor`] before the mapping event itself proceeds.
//! A mapping-remove (or primary-remove cascade) against an absent element is
//! a silent no-op rather than a [`crate::error::AccessManagerError::NotFound`].
//!
//! This trait is the forwarding sink for those synthesized events — a
//! replication target, a secondary index, or (in the distributed
//! configuration) another shard's ingestion queue. It mirrors the donor's
//! plain `Send + Sync` service-boundary traits rather than requiring
//! `async_trait`: forwarding happens while the core's locks are held, so it
//! must be non-blocking-fast or frankly synchronous.

use crate::error::Result;
use crate::events::AccessManagerEvent;
use crate::ids::Identity;

/// Receives every event the core applies, including ones synthesized to
/// satisfy a dependency-free mapping add.
pub trait EventProcessor<U: Identity, G: Identity, P: Identity, A: Identity>: Send + Sync {
    /// Handle one event. An error here surfaces to the caller of the
    /// mutation that triggered it, but does not roll back the in-memory
    /// state the core already applied (matching the "retained on
    /// post-processing failure" rule used for the explicit post-processing
    /// action hook).
    fn process(&self, event: &AccessManagerEvent<U, G, P, A>) -> Result<()>;
}

/// Discards every event. The default when no downstream target is
/// configured.
#[derive(Debug, Default)]
pub struct NoOpEventProcessor;

impl<U: Identity, G: Identity, P: Identity, A: Identity> EventProcessor<U, G, P, A>
    for NoOpEventProcessor
{
    fn process(&self, _event: &AccessManagerEvent<U, G, P, A>) -> Result<()> {
        Ok(())
    }
}

/// Whether a primary element is implicitly creatable by a dependency-free
/// mapping add, or whether its absence should be treated as a strict error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalMode {
    /// `Remove*` against an absent element/mapping returns
    /// `AccessManagerError::NotFound` (or `AlreadyExists` for a redundant
    /// `Add*`, if `throw_idempotency_exceptions` is set).
    Strict,
    /// Missing primaries are synthesized on mapping add; absent-element
    /// removes are silent no-ops.
    DependencyFree,
}
