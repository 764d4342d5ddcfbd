//! C6: durable, bi-temporally-closed event log behind a single trait, so the
//! core never depends on a concrete storage backend directly — the same
//! split the donor uses for `GraphStore`/`InMemoryGraphStore`/`PostgresStore`.

mod memory;
#[cfg(feature = "postgres")]
mod postgres;

pub use memory::InMemoryEventPersister;
#[cfg(feature = "postgres")]
pub use postgres::{PostgresEventPersister, PostgresPersisterConfig};

use crate::error::Result;
use crate::events::{AccessManagerEvent, EventId, EventPosition, RecordedEvent, TransactionTime};
use crate::ids::Identity;

/// Durable sink for every event the core applies.
///
/// `create_event` takes the caller-assigned `event_id`/`tx_time` rather than
/// generating them itself: the core is the only layer that knows the last
/// transaction time it handed out, so it is the core's job to enforce
/// monotonicity by construction and the persister's job to reject a
/// regression it is handed. A `tx_time` that does not strictly advance past
/// the persister's last recorded one is rejected with
/// [`crate::error::AccessManagerError::MonotonicityViolated`] rather than
/// silently bumped forward.
///
/// Implementations must be safe to call while the core holds its relation
/// locks: a blocking transport simply blocks the holding thread, as documented
/// in the concurrency model.
pub trait AccessManagerEventPersister<U: Identity, G: Identity, P: Identity, A: Identity>:
    Send + Sync
{
    /// Durably record `event` under the given `event_id`/`tx_time`, returning
    /// its assigned position (`tx_time` plus a sequence number unique within
    /// it). Fails with `MonotonicityViolated` if `tx_time` does not strictly
    /// advance past the last recorded transaction time.
    fn create_event(
        &self,
        event: AccessManagerEvent<U, G, P, A>,
        event_id: EventId,
        tx_time: TransactionTime,
    ) -> Result<EventPosition>;

    /// Close an existing row at `event_id` as of `valid_to`, used when a
    /// Remove supersedes an earlier Add of the same tuple.
    fn close_event(&self, event_id: &EventId, valid_to: crate::events::TransactionTime) -> Result<()>;

    /// Read back every event at or after `position`, in position order. Used
    /// by the shard splitter's `GetNextEventAfter` during a handover.
    fn events_after(&self, position: Option<EventPosition>) -> Result<Vec<RecordedEvent<U, G, P, A>>>;

    /// Total number of events currently recorded (open and closed rows).
    fn len(&self) -> usize;

    /// Whether the persister holds no events.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
