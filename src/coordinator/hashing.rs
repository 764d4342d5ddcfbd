//! Hash-range shard routing.

use crate::canonical::canonical_hash;
use crate::ids::Identity;

/// One shard's `[start, end)` slice of the `u64` hash ring. The last shard's
/// range is closed (`end == u64::MAX`, inclusive) so every hash value has a
/// home.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashRange {
    /// Inclusive start of the range.
    pub start: u64,
    /// Exclusive end of the range, except for the final shard where it is
    /// inclusive of `u64::MAX`.
    pub end: u64,
}

impl HashRange {
    fn contains(&self, hash: u64, is_last: bool) -> bool {
        if is_last {
            hash >= self.start
        } else {
            hash >= self.start && hash < self.end
        }
    }
}

/// Splits the `u64` hash ring into `n` equal-width contiguous ranges and
/// routes a key to a range by hashing it with
/// [`crate::canonical::canonical_hash`].
#[derive(Debug, Clone)]
pub struct ShardRouter {
    ranges: Vec<HashRange>,
}

impl ShardRouter {
    /// Build a router with `shard_count` equal-width ranges over the hash
    /// ring. `shard_count` must be at least 1.
    pub fn new(shard_count: usize) -> Self {
        assert!(shard_count >= 1, "ShardRouter requires at least one shard");
        let width = u64::MAX / shard_count as u64;
        let ranges = (0..shard_count)
            .map(|i| HashRange { start: width * i as u64, end: width * (i as u64 + 1) })
            .collect();
        Self { ranges }
    }

    /// Number of shards this router addresses.
    pub fn shard_count(&self) -> usize {
        self.ranges.len()
    }

    /// The range assigned to shard `index`.
    pub fn range_for(&self, index: usize) -> HashRange {
        self.ranges[index]
    }

    /// Index of the shard that owns `key`.
    pub fn shard_index_for<K: Identity>(&self, key: &K) -> usize {
        let hash = canonical_hash(&key.to_string());
        let last = self.ranges.len() - 1;
        self.ranges
            .iter()
            .enumerate()
            .find(|(i, r)| r.contains(hash, *i == last))
            .map(|(i, _)| i)
            .unwrap_or(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_shard_index_is_routable() {
        let router = ShardRouter::new(4);
        for i in 0..10_000u64 {
            let idx = router.shard_index_for(&i.to_string());
            assert!(idx < 4);
        }
    }

    #[test]
    fn routing_is_stable_for_the_same_key() {
        let router = ShardRouter::new(8);
        let a = router.shard_index_for(&"user-42".to_string());
        let b = router.shard_index_for(&"user-42".to_string());
        assert_eq!(a, b);
    }
}
