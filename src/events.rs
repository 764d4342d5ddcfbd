//! Wire-level event taxonomy (§6): every mutation the core performs is
//! representable as one of these events, with a `uuid` event id and a
//! microsecond-resolution transaction time. The persister and any
//! replicator recognize these kinds.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ids::Identity;

/// Unique identifier for one durable event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    /// Wrap an existing UUID.
    pub fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Generate a fresh random event id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// The inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Microsecond-resolution transaction timestamp.
///
/// Wraps a plain `i64` (µs since epoch) rather than `chrono::DateTime`
/// directly so that ordering and arithmetic (`txTime - 1tick`) are trivial;
/// conversion to/from `chrono::DateTime<Utc>` is provided for callers that
/// need wall-clock display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransactionTime(i64);

impl TransactionTime {
    /// The temporal value used to mark an open (live) row.
    pub const MAX: TransactionTime = TransactionTime(i64::MAX);
    /// One tick, i.e. one microsecond.
    pub const TICK: i64 = 1;

    /// Wrap a raw microsecond timestamp.
    pub fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    /// The raw microsecond value.
    pub fn as_micros(&self) -> i64 {
        self.0
    }

    /// `self - 1 tick`, used to close a bi-temporal row on removal.
    pub fn minus_one_tick(&self) -> Self {
        Self(self.0 - Self::TICK)
    }

    /// Current wall-clock transaction time.
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_micros())
    }
}

impl std::fmt::Display for TransactionTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotone position of an event: `(transactionTime, sequence)`, compared
/// lexicographically. Sequence increments within an identical transaction
/// time; ties are broken by insertion order (the sequence itself).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventPosition {
    /// Transaction time of this event.
    pub tx_time: TransactionTime,
    /// Sequence number within `tx_time`.
    pub sequence: u64,
}

/// One durable event in the taxonomy of §6, generic over the four
/// identifier types the core uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "U: Identity, G: Identity, P: Identity, A: Identity")]
pub enum AccessManagerEvent<U, G, P, A> {
    /// `{user}`
    UserAdd { user: U },
    /// `{user}`
    UserRemove { user: U },
    /// `{group}`
    GroupAdd { group: G },
    /// `{group}`
    GroupRemove { group: G },
    /// `{user, group}`
    UserToGroupAdd { user: U, group: G },
    /// `{user, group}`
    UserToGroupRemove { user: U, group: G },
    /// `{fromGroup, toGroup}`
    GroupToGroupAdd { from_group: G, to_group: G },
    /// `{fromGroup, toGroup}`
    GroupToGroupRemove { from_group: G, to_group: G },
    /// `{user, component, access}`
    UserToComponentAdd { user: U, component: P, access: A },
    /// `{user, component, access}`
    UserToComponentRemove { user: U, component: P, access: A },
    /// `{group, component, access}`
    GroupToComponentAdd { group: G, component: P, access: A },
    /// `{group, component, access}`
    GroupToComponentRemove { group: G, component: P, access: A },
    /// `{entityType}`
    EntityTypeAdd { entity_type: String },
    /// `{entityType}`
    EntityTypeRemove { entity_type: String },
    /// `{entityType, entity}`
    EntityAdd { entity_type: String, entity: String },
    /// `{entityType, entity}`
    EntityRemove { entity_type: String, entity: String },
    /// `{user, entityType, entity}`
    UserToEntityAdd { user: U, entity_type: String, entity: String },
    /// `{user, entityType, entity}`
    UserToEntityRemove { user: U, entity_type: String, entity: String },
    /// `{group, entityType, entity}`
    GroupToEntityAdd { group: G, entity_type: String, entity: String },
    /// `{group, entityType, entity}`
    GroupToEntityRemove { group: G, entity_type: String, entity: String },
}

impl<U, G, P, A> AccessManagerEvent<U, G, P, A> {
    /// The wire `kind` string for this event, matching the table in §6.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UserAdd { .. } => "UserAdd",
            Self::UserRemove { .. } => "UserRemove",
            Self::GroupAdd { .. } => "GroupAdd",
            Self::GroupRemove { .. } => "GroupRemove",
            Self::UserToGroupAdd { .. } => "UserToGroupAdd",
            Self::UserToGroupRemove { .. } => "UserToGroupRemove",
            Self::GroupToGroupAdd { .. } => "GroupToGroupAdd",
            Self::GroupToGroupRemove { .. } => "GroupToGroupRemove",
            Self::UserToComponentAdd { .. } => "UserToComponentAdd",
            Self::UserToComponentRemove { .. } => "UserToComponentRemove",
            Self::GroupToComponentAdd { .. } => "GroupToComponentAdd",
            Self::GroupToComponentRemove { .. } => "GroupToComponentRemove",
            Self::EntityTypeAdd { .. } => "EntityTypeAdd",
            Self::EntityTypeRemove { .. } => "EntityTypeRemove",
            Self::EntityAdd { .. } => "EntityAdd",
            Self::EntityRemove { .. } => "EntityRemove",
            Self::UserToEntityAdd { .. } => "UserToEntityAdd",
            Self::UserToEntityRemove { .. } => "UserToEntityRemove",
            Self::GroupToEntityAdd { .. } => "GroupToEntityAdd",
            Self::GroupToEntityRemove { .. } => "GroupToEntityRemove",
        }
    }

    /// Whether this event kind is an "Add" (as opposed to a "Remove").
    pub fn is_add(&self) -> bool {
        self.kind().ends_with("Add")
    }
}

/// An event together with its durable identity and position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "U: Identity, G: Identity, P: Identity, A: Identity")]
pub struct RecordedEvent<U, G, P, A> {
    /// Unique event id.
    pub event_id: EventId,
    /// Monotone position assigned by the persister.
    pub position: EventPosition,
    /// The event payload.
    pub event: AccessManagerEvent<U, G, P, A>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minus_one_tick_decrements_by_one_micro() {
        let t = TransactionTime::from_micros(1_000);
        assert_eq!(t.minus_one_tick().as_micros(), 999);
    }

    #[test]
    fn event_kind_strings_match_wire_taxonomy() {
        let e: AccessManagerEvent<String, String, String, String> =
            AccessManagerEvent::UserToGroupAdd { user: "u1".into(), group: "g1".into() };
        assert_eq!(e.kind(), "UserToGroupAdd");
        assert!(e.is_add());
    }
}
