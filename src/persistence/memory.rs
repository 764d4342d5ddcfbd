//! Default, dependency-free persister: an append-only log guarded by a single
//! `parking_lot::Mutex`. This is the persister every `AccessManager` uses
//! unless the `postgres` feature is enabled and a backend is configured.

use parking_lot::Mutex;

use crate::error::{AccessManagerError, Result};
use crate::events::{
    AccessManagerEvent, EventId, EventPosition, RecordedEvent, TransactionTime,
};
use crate::ids::Identity;

use super::AccessManagerEventPersister;

struct Row<U, G, P, A> {
    recorded: RecordedEvent<U, G, P, A>,
    valid_to: Option<TransactionTime>,
}

/// In-memory event log. Preserves insertion order and assigns strictly
/// monotone `(txTime, sequence)` positions; a `create_event` call whose
/// `tx_time` regresses behind the last recorded one is rejected with
/// `MonotonicityViolated` rather than silently corrected.
pub struct InMemoryEventPersister<U, G, P, A> {
    rows: Mutex<Vec<Row<U, G, P, A>>>,
}

impl<U, G, P, A> InMemoryEventPersister<U, G, P, A> {
    /// An empty log.
    pub fn new() -> Self {
        Self { rows: Mutex::new(Vec::new()) }
    }
}

impl<U, G, P, A> Default for InMemoryEventPersister<U, G, P, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U: Identity, G: Identity, P: Identity, A: Identity> AccessManagerEventPersister<U, G, P, A>
    for InMemoryEventPersister<U, G, P, A>
{
    fn create_event(
        &self,
        event: AccessManagerEvent<U, G, P, A>,
        event_id: EventId,
        tx_time: TransactionTime,
    ) -> Result<EventPosition> {
        let mut rows = self.rows.lock();
        let last = rows.last().map(|r| r.recorded.position);
        if let Some(last) = last {
            if tx_time < last.tx_time {
                return Err(AccessManagerError::MonotonicityViolated {
                    tx_time: tx_time.as_micros(),
                    last_tx_time: last.tx_time.as_micros(),
                });
            }
        }
        let sequence = last.filter(|p| p.tx_time == tx_time).map(|p| p.sequence + 1).unwrap_or(0);
        let position = EventPosition { tx_time, sequence };
        let recorded = RecordedEvent { event_id, position, event };
        rows.push(Row { recorded, valid_to: None });
        Ok(position)
    }

    fn close_event(&self, event_id: &EventId, valid_to: TransactionTime) -> Result<()> {
        let mut rows = self.rows.lock();
        let row = rows
            .iter_mut()
            .find(|r| &r.recorded.event_id == event_id)
            .ok_or_else(|| AccessManagerError::NotFound(format!("event {event_id}")))?;
        row.valid_to = Some(valid_to);
        Ok(())
    }

    fn events_after(&self, position: Option<EventPosition>) -> Result<Vec<RecordedEvent<U, G, P, A>>> {
        let rows = self.rows.lock();
        Ok(rows
            .iter()
            .filter(|r| position.map(|p| r.recorded.position > p).unwrap_or(true))
            .map(|r| r.recorded.clone())
            .collect())
    }

    fn len(&self) -> usize {
        self.rows.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_are_strictly_monotone() {
        let p: InMemoryEventPersister<String, String, String, String> = InMemoryEventPersister::new();
        let a = p
            .create_event(AccessManagerEvent::UserAdd { user: "u1".into() }, EventId::generate(), TransactionTime::now())
            .unwrap();
        let b = p
            .create_event(AccessManagerEvent::UserAdd { user: "u2".into() }, EventId::generate(), TransactionTime::now())
            .unwrap();
        assert!(b > a);
    }

    #[test]
    fn events_after_excludes_the_given_position() {
        let p: InMemoryEventPersister<String, String, String, String> = InMemoryEventPersister::new();
        let a = p
            .create_event(AccessManagerEvent::UserAdd { user: "u1".into() }, EventId::generate(), TransactionTime::now())
            .unwrap();
        p.create_event(AccessManagerEvent::UserAdd { user: "u2".into() }, EventId::generate(), TransactionTime::now())
            .unwrap();
        assert_eq!(p.events_after(Some(a)).unwrap().len(), 1);
        assert_eq!(p.events_after(None).unwrap().len(), 2);
    }

    #[test]
    fn a_regressing_tx_time_is_rejected() {
        let p: InMemoryEventPersister<String, String, String, String> = InMemoryEventPersister::new();
        let now = TransactionTime::now();
        p.create_event(AccessManagerEvent::UserAdd { user: "u1".into() }, EventId::generate(), now).unwrap();
        let earlier = TransactionTime::from_micros(now.as_micros() - 1);
        let err = p
            .create_event(AccessManagerEvent::UserAdd { user: "u2".into() }, EventId::generate(), earlier)
            .unwrap_err();
        assert!(matches!(err, AccessManagerError::MonotonicityViolated { .. }));
    }
}
