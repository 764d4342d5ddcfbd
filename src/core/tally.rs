//! Materialized tally counters the metric decorator emits via `set(kind,
//! count)`, plus per-principal entity/component-mapping frequency tables so
//! cascade removals can report the new count in O(1) instead of a full scan.
//!
//! Frequency tables are signed-delta updated and treat a zero delta as a
//! strict no-op: the donor's `IncidentMetrics`/IncidentType model showed the
//! same discipline is easy to get wrong (a `DecrementBy(0)` call reaching a
//! counter backend), so [`FrequencyTable::apply_delta`] short-circuits
//! before touching the map at all.

use std::collections::BTreeMap;

use crate::ids::Identity;

/// Per-relation cardinalities, mirroring `|R|` for each of the six mapping
/// relations plus the four primary sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TallyCounts {
    /// `|Users|`.
    pub users: usize,
    /// `|Groups|`.
    pub groups: usize,
    /// `|EntityTypes|`.
    pub entity_types: usize,
    /// `|Entities|` (sum over all entity types).
    pub entities: usize,
    /// `|UserToGroup|`.
    pub user_to_group: usize,
    /// `|GroupToGroup|`.
    pub group_to_group: usize,
    /// `|UserToComponent|`.
    pub user_to_component: usize,
    /// `|GroupToComponent|`.
    pub group_to_component: usize,
    /// `|UserToEntity|`.
    pub user_to_entity: usize,
    /// `|GroupToEntity|`.
    pub group_to_entity: usize,
}

/// A per-principal frequency table (e.g. "how many component mappings does
/// each user have"), used so primary removal can report the post-cascade
/// count without re-scanning the relation.
#[derive(Debug, Clone, Default)]
pub struct FrequencyTable<K> {
    counts: BTreeMap<K, u64>,
}

impl<K: Identity> FrequencyTable<K> {
    /// An empty table.
    pub fn new() -> Self {
        Self { counts: BTreeMap::new() }
    }

    /// Apply a signed delta to `key`'s frequency. A delta of `0` is a no-op
    /// and never touches the underlying map (so it never emits a spurious
    /// decrement-to-zero entry removal either).
    pub fn apply_delta(&mut self, key: &K, delta: i64) {
        if delta == 0 {
            return;
        }
        let entry = self.counts.entry(key.clone()).or_insert(0);
        if delta > 0 {
            *entry += delta as u64;
        } else {
            *entry = entry.saturating_sub((-delta) as u64);
        }
        if *entry == 0 {
            self.counts.remove(key);
        }
    }

    /// Current frequency for `key` (0 if absent).
    pub fn get(&self, key: &K) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Remove `key` entirely (used when the principal itself is removed).
    pub fn remove(&mut self, key: &K) {
        self.counts.remove(key);
    }

    /// Reset to empty.
    pub fn clear(&mut self) {
        self.counts.clear();
    }
}

/// All tally state the metric decorator reads to emit `set`/`increment`
/// calls: the ten cardinalities plus the four per-principal frequency
/// tables used to report a principal's post-cascade mapping count without a
/// full scan.
#[derive(Debug, Clone, Default)]
pub struct TallyState<U: Identity, G: Identity> {
    /// Current relation/primary-set cardinalities.
    pub counts: TallyCounts,
    /// Per-user `UserToComponent` row counts.
    pub user_component_freq: FrequencyTable<U>,
    /// Per-user `UserToEntity` row counts.
    pub user_entity_freq: FrequencyTable<U>,
    /// Per-group `GroupToComponent` row counts.
    pub group_component_freq: FrequencyTable<G>,
    /// Per-group `GroupToEntity` row counts.
    pub group_entity_freq: FrequencyTable<G>,
}

impl<U: Identity, G: Identity> TallyState<U, G> {
    /// All counters and frequency tables at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset every counter and frequency table to empty.
    pub fn clear(&mut self) {
        self.counts = TallyCounts::default();
        self.user_component_freq.clear();
        self.user_entity_freq.clear();
        self.group_component_freq.clear();
        self.group_entity_freq.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_delta_is_a_strict_no_op() {
        let mut t: FrequencyTable<String> = FrequencyTable::new();
        t.apply_delta(&"u1".to_string(), 3);
        assert_eq!(t.get(&"u1".to_string()), 3);
        t.apply_delta(&"u1".to_string(), 0);
        assert_eq!(t.get(&"u1".to_string()), 3);
    }

    #[test]
    fn decrement_to_zero_removes_entry() {
        let mut t: FrequencyTable<String> = FrequencyTable::new();
        t.apply_delta(&"u1".to_string(), 2);
        t.apply_delta(&"u1".to_string(), -2);
        assert_eq!(t.get(&"u1".to_string()), 0);
    }
}
