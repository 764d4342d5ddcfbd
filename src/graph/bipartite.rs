//! Bipartite forward/reverse index, used for the UserToGroup relation.

use std::collections::{BTreeMap, BTreeSet};

use crate::ids::Identity;

/// A bipartite edge index between a `K` side and a `V` side, with both a
/// forward (`K -> {V}`) and reverse (`V -> {K}`) adjacency map kept in sync.
///
/// Used by the core for the UserToGroup relation (`K = U`, `V = G`); the
/// GroupToGroup relation instead uses [`crate::graph::DirectedGraph`] since
/// both endpoints share a type and must support cycle detection.
#[derive(Debug, Clone, Default)]
pub struct BipartiteIndex<K, V> {
    forward: BTreeMap<K, BTreeSet<V>>,
    reverse: BTreeMap<V, BTreeSet<K>>,
}

impl<K: Identity, V: Identity> BipartiteIndex<K, V> {
    /// Create an empty index.
    pub fn new() -> Self {
        Self {
            forward: BTreeMap::new(),
            reverse: BTreeMap::new(),
        }
    }

    /// Insert the edge `(k, v)`. Returns `true` if it was not already present.
    pub fn insert(&mut self, k: K, v: V) -> bool {
        let was_new = self.forward.entry(k.clone()).or_default().insert(v.clone());
        self.reverse.entry(v).or_default().insert(k);
        was_new
    }

    /// Remove the edge `(k, v)`. Returns `true` if it was present.
    pub fn remove(&mut self, k: &K, v: &V) -> bool {
        let removed = self
            .forward
            .get_mut(k)
            .map(|set| set.remove(v))
            .unwrap_or(false);
        if removed {
            if let Some(set) = self.forward.get_mut(k) {
                if set.is_empty() {
                    self.forward.remove(k);
                }
            }
            if let Some(set) = self.reverse.get_mut(v) {
                set.remove(k);
                if set.is_empty() {
                    self.reverse.remove(v);
                }
            }
        }
        removed
    }

    /// Whether `(k, v)` is present.
    pub fn contains(&self, k: &K, v: &V) -> bool {
        self.forward.get(k).map(|set| set.contains(v)).unwrap_or(false)
    }

    /// All `V`s reachable from `k` in one hop, in sorted order.
    pub fn forward_neighbors(&self, k: &K) -> Vec<V> {
        self.forward
            .get(k)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// All `K`s that map to `v` in one hop, in sorted order.
    pub fn reverse_neighbors(&self, v: &V) -> Vec<K> {
        self.reverse
            .get(v)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop every edge incident to `k` on the forward side, returning the
    /// `V`s that were removed (for cascade bookkeeping).
    pub fn remove_all_for_key(&mut self, k: &K) -> Vec<V> {
        let vs = self.forward.remove(k).unwrap_or_default();
        for v in &vs {
            if let Some(set) = self.reverse.get_mut(v) {
                set.remove(k);
                if set.is_empty() {
                    self.reverse.remove(v);
                }
            }
        }
        vs.into_iter().collect()
    }

    /// Drop every edge incident to `v` on the reverse side, returning the
    /// `K`s that were removed (for cascade bookkeeping).
    pub fn remove_all_for_value(&mut self, v: &V) -> Vec<K> {
        let ks = self.reverse.remove(v).unwrap_or_default();
        for k in &ks {
            if let Some(set) = self.forward.get_mut(k) {
                set.remove(v);
                if set.is_empty() {
                    self.forward.remove(k);
                }
            }
        }
        ks.into_iter().collect()
    }

    /// Total number of edges.
    pub fn len(&self) -> usize {
        self.forward.values().map(|set| set.len()).sum()
    }

    /// Whether the index holds no edges.
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_is_idempotent() {
        let mut idx: BipartiteIndex<String, String> = BipartiteIndex::new();
        assert!(idx.insert("u1".into(), "g1".into()));
        assert!(!idx.insert("u1".into(), "g1".into()));
        assert_eq!(idx.len(), 1);
    }

    #[test]
    fn remove_all_for_key_cleans_reverse_index() {
        let mut idx: BipartiteIndex<String, String> = BipartiteIndex::new();
        idx.insert("u1".into(), "g1".into());
        idx.insert("u1".into(), "g2".into());
        idx.insert("u2".into(), "g1".into());

        let removed = idx.remove_all_for_key(&"u1".to_string());
        assert_eq!(removed, vec!["g1".to_string(), "g2".to_string()]);
        assert!(idx.forward_neighbors(&"u1".to_string()).is_empty());
        assert_eq!(idx.reverse_neighbors(&"g1".to_string()), vec!["u2".to_string()]);
    }

    #[test]
    fn remove_all_for_value_cleans_forward_index() {
        let mut idx: BipartiteIndex<String, String> = BipartiteIndex::new();
        idx.insert("u1".into(), "g1".into());
        idx.insert("u2".into(), "g1".into());

        let removed = idx.remove_all_for_value(&"g1".to_string());
        assert_eq!(removed, vec!["u1".to_string(), "u2".to_string()]);
        assert!(idx.reverse_neighbors(&"g1".to_string()).is_empty());
    }
}
