//! Forward/reverse index from a single key to a `(X, Y)` pair, used for the
//! three-column relations (UserToComponent, GroupToComponent, UserToEntity,
//! GroupToEntity), where the mapping is `K -> {(X, Y)}`.

use std::collections::{BTreeMap, BTreeSet};

use crate::ids::Identity;

/// `K -> {(X, Y)}` index with a reverse `(X, Y) -> {K}` side, plus a partial
/// reverse keyed on `X` alone so a whole-`X` cascade (e.g. removing an
/// EntityType drops every `UserToEntity`/`GroupToEntity` row under it,
/// regardless of which entity) can be done without a full scan.
#[derive(Debug, Clone, Default)]
pub struct PairIndex<K, X, Y> {
    forward: BTreeMap<K, BTreeSet<(X, Y)>>,
    reverse: BTreeMap<(X, Y), BTreeSet<K>>,
    by_x: BTreeMap<X, BTreeSet<(K, Y)>>,
}

impl<K: Identity, X: Identity, Y: Identity> PairIndex<K, X, Y> {
    /// Create an empty index.
    pub fn new() -> Self {
        Self {
            forward: BTreeMap::new(),
            reverse: BTreeMap::new(),
            by_x: BTreeMap::new(),
        }
    }

    /// Insert `k -> (x, y)`. Returns `true` if it was not already present.
    pub fn insert(&mut self, k: K, x: X, y: Y) -> bool {
        let was_new = self
            .forward
            .entry(k.clone())
            .or_default()
            .insert((x.clone(), y.clone()));
        if was_new {
            self.reverse.entry((x.clone(), y.clone())).or_default().insert(k.clone());
            self.by_x.entry(x).or_default().insert((k, y));
        }
        was_new
    }

    /// Remove `k -> (x, y)`. Returns `true` if it was present.
    pub fn remove(&mut self, k: &K, x: &X, y: &Y) -> bool {
        let removed = self
            .forward
            .get_mut(k)
            .map(|set| set.remove(&(x.clone(), y.clone())))
            .unwrap_or(false);
        if removed {
            if let Some(set) = self.forward.get_mut(k) {
                if set.is_empty() {
                    self.forward.remove(k);
                }
            }
            if let Some(set) = self.reverse.get_mut(&(x.clone(), y.clone())) {
                set.remove(k);
                if set.is_empty() {
                    self.reverse.remove(&(x.clone(), y.clone()));
                }
            }
            if let Some(set) = self.by_x.get_mut(x) {
                set.remove(&(k.clone(), y.clone()));
                if set.is_empty() {
                    self.by_x.remove(x);
                }
            }
        }
        removed
    }

    /// Whether `k -> (x, y)` is present.
    pub fn contains(&self, k: &K, x: &X, y: &Y) -> bool {
        self.forward
            .get(k)
            .map(|set| set.contains(&(x.clone(), y.clone())))
            .unwrap_or(false)
    }

    /// All `(x, y)` pairs mapped from `k`, sorted.
    pub fn forward_of(&self, k: &K) -> Vec<(X, Y)> {
        self.forward.get(k).map(|set| set.iter().cloned().collect()).unwrap_or_default()
    }

    /// All `k`s mapped to `(x, y)`, sorted.
    pub fn reverse_of(&self, x: &X, y: &Y) -> Vec<K> {
        self.reverse
            .get(&(x.clone(), y.clone()))
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Remove every tuple keyed on `k`, returning the removed `(x, y)` pairs.
    pub fn remove_all_for_key(&mut self, k: &K) -> Vec<(X, Y)> {
        let pairs = self.forward.remove(k).unwrap_or_default();
        for (x, y) in &pairs {
            if let Some(set) = self.reverse.get_mut(&(x.clone(), y.clone())) {
                set.remove(k);
                if set.is_empty() {
                    self.reverse.remove(&(x.clone(), y.clone()));
                }
            }
            if let Some(set) = self.by_x.get_mut(x) {
                set.remove(&(k.clone(), y.clone()));
                if set.is_empty() {
                    self.by_x.remove(x);
                }
            }
        }
        pairs.into_iter().collect()
    }

    /// Remove every tuple whose pair is exactly `(x, y)`, returning the `k`s
    /// that had it (used when a single Entity is removed).
    pub fn remove_all_for_pair(&mut self, x: &X, y: &Y) -> Vec<K> {
        let ks = self.reverse.remove(&(x.clone(), y.clone())).unwrap_or_default();
        for k in &ks {
            if let Some(set) = self.forward.get_mut(k) {
                set.remove(&(x.clone(), y.clone()));
                if set.is_empty() {
                    self.forward.remove(k);
                }
            }
            if let Some(set) = self.by_x.get_mut(x) {
                set.remove(&(k.clone(), y.clone()));
                if set.is_empty() {
                    self.by_x.remove(x);
                }
            }
        }
        ks.into_iter().collect()
    }

    /// Remove every tuple whose first pair component is `x`, regardless of
    /// `y` (used when an EntityType is removed, cascading over every entity
    /// under it). Returns the `(k, y)` pairs that were removed.
    pub fn remove_all_for_x(&mut self, x: &X) -> Vec<(K, Y)> {
        let entries = self.by_x.remove(x).unwrap_or_default();
        for (k, y) in &entries {
            if let Some(set) = self.forward.get_mut(k) {
                set.remove(&(x.clone(), y.clone()));
                if set.is_empty() {
                    self.forward.remove(k);
                }
            }
            if let Some(set) = self.reverse.get_mut(&(x.clone(), y.clone())) {
                set.remove(k);
                if set.is_empty() {
                    self.reverse.remove(&(x.clone(), y.clone()));
                }
            }
        }
        entries.into_iter().collect()
    }

    /// Total number of tuples.
    pub fn len(&self) -> usize {
        self.forward.values().map(|set| set.len()).sum()
    }

    /// Whether the index holds no tuples.
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_is_idempotent_and_counts_correctly() {
        let mut idx: PairIndex<String, String, String> = PairIndex::new();
        assert!(idx.insert("u1".into(), "Order".into(), "View".into()));
        assert!(!idx.insert("u1".into(), "Order".into(), "View".into()));
        assert_eq!(idx.len(), 1);
    }

    #[test]
    fn remove_all_for_x_cascades_whole_type() {
        let mut idx: PairIndex<String, String, String> = PairIndex::new();
        idx.insert("u1".into(), "ClientAccount".into(), "CompanyA".into());
        idx.insert("u2".into(), "ClientAccount".into(), "CompanyB".into());
        idx.insert("u1".into(), "Other".into(), "X".into());

        let removed = idx.remove_all_for_x(&"ClientAccount".to_string());
        assert_eq!(removed.len(), 2);
        assert_eq!(idx.len(), 1);
        assert!(idx.contains(&"u1".to_string(), &"Other".to_string(), &"X".to_string()));
    }

    #[test]
    fn remove_all_for_key_cleans_up_reverse_and_by_x() {
        let mut idx: PairIndex<String, String, String> = PairIndex::new();
        idx.insert("u1".into(), "Order".into(), "View".into());
        idx.insert("u1".into(), "Order".into(), "Modify".into());

        let removed = idx.remove_all_for_key(&"u1".to_string());
        assert_eq!(removed.len(), 2);
        assert!(idx.reverse_of(&"Order".to_string(), &"View".to_string()).is_empty());
        assert!(idx.remove_all_for_x(&"Order".to_string()).is_empty());
    }
}
