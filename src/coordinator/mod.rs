//! C7: routes a query across shards by hashing the principal's identifier
//! into a fixed hash-ring range, fanning out only when a query is genuinely
//! global (e.g. "all users with access to entity X").
//!
//! Hashing reuses [`crate::canonical::canonical_hash`] (`xxhash-rust`'s
//! xxh64 over the canonical JSON encoding of the key), so a client and every
//! shard agree on the same route for the same key without needing a shared
//! consistent-hashing library. Fan-out is async and must never be issued
//! while a shard's own `AccessManager` locks are held — callers drive this
//! from outside the core, via the [`ShardClient`] trait.

mod hashing;
mod shard_client;

pub use hashing::{HashRange, ShardRouter};
pub use shard_client::ShardClient;

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::{AccessManagerError, Result};
use crate::ids::Identity;
use crate::metrics::MetricLogger;

/// Fans queries out across a fixed set of shards addressed by [`ShardRouter`].
pub struct DistributedQueryCoordinator<U, G, P, A, C> {
    router: ShardRouter,
    shards: Vec<Arc<C>>,
    metric_logger: Arc<dyn MetricLogger>,
    _marker: std::marker::PhantomData<(U, G, P, A)>,
}

impl<U, G, P, A, C> DistributedQueryCoordinator<U, G, P, A, C>
where
    U: Identity,
    G: Identity,
    P: Identity,
    A: Identity,
    C: ShardClient<U, G, P, A>,
{
    /// Build a coordinator over `shards`, indexed in router order (shard `i`
    /// owns [`ShardRouter::range_for`]`(i)`).
    pub fn new(router: ShardRouter, shards: Vec<Arc<C>>, metric_logger: Arc<dyn MetricLogger>) -> Result<Self> {
        if shards.len() != router.shard_count() {
            return Err(AccessManagerError::Unavailable(format!(
                "router has {} shards but {} clients were given",
                router.shard_count(),
                shards.len()
            )));
        }
        Ok(Self { router, shards, metric_logger, _marker: std::marker::PhantomData })
    }

    fn shard_for(&self, user: &U) -> &Arc<C> {
        let index = self.router.shard_index_for(user);
        &self.shards[index]
    }

    /// The distinct shard indices that own at least one group in
    /// `groups`, per [`ShardRouter::shard_index_for`]. Only these shards are
    /// asked to resolve `reach*(groups)` — a shard that owns none of the
    /// directly-mapped groups cannot contribute a transitively-reached one
    /// either, since group nesting only widens reachability through edges
    /// the owning shard itself holds.
    fn group_shards_for(&self, groups: &BTreeSet<G>) -> BTreeSet<usize> {
        groups.iter().map(|g| self.router.shard_index_for(g)).collect()
    }

    fn record_fan_out(&self, groups_mapped: usize, shards_queried: usize) {
        self.metric_logger.set("DistributedQueryGroupsMappedToUser", groups_mapped as u64);
        self.metric_logger.set("DistributedQueryGroupShardsQueried", shards_queried as u64);
    }

    /// `HasAccessToApplicationComponent`, resolved in two phases: the owning
    /// shard resolves `user`'s direct groups, then only the shards that own
    /// one of those groups are asked whether `reach*(groups)` grants
    /// `(component, access)`. The two phases are necessary because group
    /// membership can span shards once a split has happened.
    pub async fn has_access_to_application_component(&self, user: &U, component: &P, access: &A) -> Result<bool> {
        let home = self.shard_for(user);
        let direct_groups = home.direct_groups_for_user(user).await?;
        let shard_indices = self.group_shards_for(&direct_groups);
        self.record_fan_out(direct_groups.len(), shard_indices.len());

        let mut checks = Vec::with_capacity(shard_indices.len());
        for index in &shard_indices {
            let groups = direct_groups.clone();
            let component = component.clone();
            let access = access.clone();
            let shard = Arc::clone(&self.shards[*index]);
            checks.push(async move { shard.has_access_via_groups(&groups, &component, &access).await });
        }
        let results = futures::future::join_all(checks).await;
        for r in results {
            if r? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// `GetEntitiesAccessibleByUser`, unioned across only the shards that own
    /// one of `user`'s directly-mapped groups.
    pub async fn entities_accessible_by_user(&self, user: &U, entity_type: Option<&str>) -> Result<BTreeSet<(String, String)>> {
        let home = self.shard_for(user);
        let direct_groups = home.direct_groups_for_user(user).await?;
        let shard_indices = self.group_shards_for(&direct_groups);
        self.record_fan_out(direct_groups.len(), shard_indices.len());

        let mut calls = Vec::with_capacity(shard_indices.len());
        for index in &shard_indices {
            let groups = direct_groups.clone();
            let entity_type = entity_type.map(|s| s.to_string());
            let shard = Arc::clone(&self.shards[*index]);
            calls.push(async move { shard.entities_via_groups(&groups, entity_type.as_deref()).await });
        }
        let results = futures::future::join_all(calls).await;
        let mut out = BTreeSet::new();
        for r in results {
            out.extend(r?);
        }
        Ok(out)
    }

    /// Number of shards this coordinator routes across.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }
}
