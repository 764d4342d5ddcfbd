//! Async boundary between the coordinator and a single shard. A production
//! deployment implements this over whatever RPC transport fronts each
//! shard's `AccessManager`; tests can implement it directly over a local
//! `Arc<AccessManager<..>>` with a thin sync-to-async bridge.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::Result;
use crate::ids::Identity;

/// One shard's query surface, as seen by the [`super::DistributedQueryCoordinator`].
#[async_trait]
pub trait ShardClient<U: Identity, G: Identity, P: Identity, A: Identity>: Send + Sync {
    /// Groups `user` is directly mapped to on this shard (empty if this
    /// shard does not own `user`).
    async fn direct_groups_for_user(&self, user: &U) -> Result<BTreeSet<G>>;

    /// Whether any group in `reach*(groups)`, as seen from this shard, grants
    /// `(component, access)`.
    async fn has_access_via_groups(&self, groups: &BTreeSet<G>, component: &P, access: &A) -> Result<bool>;

    /// `(entityType, entity)` pairs reachable from `reach*(groups)` on this
    /// shard, optionally filtered to a single `entity_type`.
    async fn entities_via_groups(&self, groups: &BTreeSet<G>, entity_type: Option<&str>) -> Result<BTreeSet<(String, String)>>;
}
