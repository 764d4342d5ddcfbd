//! Stable error taxonomy for the access graph engine.
//!
//! One enum is shared by the graph, the core, the decorators, the persister
//! contract, and the splitter, so that every layer can bubble errors with
//! `?` and the metric decorator can match on a single type to decide when to
//! emit `cancelBegin`.

use thiserror::Error;

/// Errors surfaced by any layer of the access graph engine.
#[derive(Debug, Error)]
pub enum AccessManagerError {
    /// Element or mapping absent where required.
    #[error("not found: {0}")]
    NotFound(String),

    /// A GroupToGroup edge add was rejected because it would close a cycle.
    #[error("cycle detected: adding {from} -> {to} would make the group graph cyclic")]
    CycleDetected {
        /// Source group of the rejected edge.
        from: String,
        /// Destination group of the rejected edge.
        to: String,
    },

    /// An `Add*` call found the element/edge already present and
    /// `throwIdempotencyExceptions` is enabled.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The persister refused a write because its transaction time did not
    /// advance relative to the last recorded transaction time.
    #[error("monotonicity violated: txTime {tx_time} < last txTime {last_tx_time}")]
    MonotonicityViolated {
        /// The rejected transaction time.
        tx_time: i64,
        /// The persister's previously recorded transaction time.
        last_tx_time: i64,
    },

    /// A post-processing action raised an error after the mutation had
    /// already taken effect. The in-memory state is retained.
    #[error("postprocessing failed after mutation took effect: {0}")]
    PostprocessingFailed(String),

    /// The splitter's drain/flush wait exhausted its retry budget.
    #[error("drain timeout: {0}")]
    DrainTimeout(String),

    /// The source writer failed to flush its in-memory event buffers.
    #[error("flush failed: {0}")]
    FlushFailed(String),

    /// `GetNextEventAfter` failed on the persister.
    #[error("next event retrieval failed for event {0}")]
    NextEventRetrievalFailed(String),

    /// A shard or persister is unreachable.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl AccessManagerError {
    /// True for errors that represent "nothing changed" outcomes rather than
    /// genuine failures — used by the dependency-free variant to decide
    /// whether an absent-element remove should be silently swallowed.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AccessManagerError>;
