//! C2: the access graph engine.
//!
//! This single type composes what the specification describes as five
//! layered components (the raw mapping-relation store, the fixed-order
//! concurrency guard, the metric-logging decorator, the dependency-free
//! event processor, and the persister) into one struct with pluggable
//! strategies ([`MetricLogger`], [`EventProcessor`], [`AccessManagerEventPersister`])
//! injected at construction time, rather than as a chain of independently
//! locking wrapper structs.
//!
//! The reason is concurrency correctness, not convenience: a dependency-free
//! `AddUserToGroupMapping` must synthesize missing `UserAdd`/`GroupAdd`
//! events, begin/end its own metrics, and run a caller-supplied
//! post-processing action, all under the *same* `users`/`groups`/
//! `userToGroupMap` lock set the outer mapping-add needs. A
//! `MetricLoggingAccessManager` wrapping a `DependencyFreeAccessManager`
//! wrapping a plain `AccessManagerCore` — each acquiring its own locks on
//! each method call — cannot give that guarantee without either reentrant
//! locks (which `parking_lot::RwLock` refuses) or releasing and
//! reacquiring mid-operation (which reopens the race the lock existed to
//! close). Folding the layers into one type that acquires its locks once per
//! public call and drives prerequisite synthesis, metrics, mutation, and
//! post-processing through private helpers that take the already-held
//! guards is the idiomatic way to keep the composition the spec describes
//! while keeping the locking actually correct.

mod mutations;
mod queries;
mod tally;

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use parking_lot::RwLock;

use crate::dependency_free::{EventProcessor, NoOpEventProcessor, RemovalMode};
use crate::error::Result;
use crate::graph::{BipartiteIndex, DirectedGraph, PairIndex};
use crate::ids::Identity;
use crate::metrics::{MetricLogger, NoOpMetricLogger};
use crate::persistence::{AccessManagerEventPersister, InMemoryEventPersister};

pub use tally::{FrequencyTable, TallyCounts, TallyState};

/// Action run once a mutation has taken effect, still under the
/// operation's full lock set. An error here is reported as
/// [`crate::error::AccessManagerError::PostprocessingFailed`]; the mutation
/// is **not** rolled back, matching the "retained on post-processing
/// failure" rule.
pub type PostProcessingAction<'a> = Box<dyn FnOnce() -> Result<()> + 'a>;

/// Outcome of a mutation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationOutcome {
    /// `false` if the call was an idempotent no-op: the element or mapping
    /// was already in the requested state and
    /// [`AccessManagerConfig::throw_idempotency_exceptions`] is unset.
    pub changed: bool,
}

impl MutationOutcome {
    pub(crate) const NO_OP: Self = Self { changed: false };
    pub(crate) const APPLIED: Self = Self { changed: true };
}

/// Behavioral configuration for one [`AccessManager`] instance.
#[derive(Debug, Clone)]
pub struct AccessManagerConfig {
    /// If `true`, an `Add*` call on an already-present element/mapping
    /// returns `AccessManagerError::AlreadyExists` instead of silently
    /// succeeding as a no-op; likewise a `Remove*` on an absent one returns
    /// `NotFound` (subject to [`Self::removal_mode`]).
    pub throw_idempotency_exceptions: bool,
    /// Strict or dependency-free removal/mapping-add semantics.
    pub removal_mode: RemovalMode,
    /// Whether metric logging is active. Can be toggled at runtime via
    /// [`AccessManager::set_metrics_enabled`].
    pub metrics_enabled: bool,
}

impl Default for AccessManagerConfig {
    fn default() -> Self {
        Self {
            throw_idempotency_exceptions: false,
            removal_mode: RemovalMode::Strict,
            metrics_enabled: true,
        }
    }
}

/// The access graph engine, generic over user (`U`), group (`G`),
/// application component (`P`), and access level (`A`) identifier types.
pub struct AccessManager<U: Identity, G: Identity, P: Identity, A: Identity> {
    config: AccessManagerConfig,

    users: RwLock<BTreeSet<U>>,
    groups: RwLock<BTreeSet<G>>,
    user_to_group: RwLock<BipartiteIndex<U, G>>,
    group_to_group: RwLock<DirectedGraph<G>>,
    user_to_component: RwLock<PairIndex<U, P, A>>,
    group_to_component: RwLock<PairIndex<G, P, A>>,
    entities: RwLock<BTreeMap<String, BTreeSet<String>>>,
    user_to_entity: RwLock<PairIndex<U, String, String>>,
    group_to_entity: RwLock<PairIndex<G, String, String>>,

    tally: RwLock<TallyState<U, G>>,

    metric_logger: Box<dyn MetricLogger>,
    event_processor: Box<dyn EventProcessor<U, G, P, A>>,
    persister: Box<dyn AccessManagerEventPersister<U, G, P, A>>,
}

impl<U: Identity, G: Identity, P: Identity, A: Identity> AccessManager<U, G, P, A> {
    /// A strict-mode engine with no-op metrics, no downstream event
    /// forwarding, and an in-memory persister. The usual starting point for
    /// tests; production callers should use [`AccessManagerBuilder`].
    pub fn new() -> Self {
        AccessManagerBuilder::new().build()
    }

    /// Current configuration.
    pub fn config(&self) -> &AccessManagerConfig {
        &self.config
    }

    /// Enable or disable metric logging at runtime.
    pub fn set_metrics_enabled(&mut self, enabled: bool) {
        self.config.metrics_enabled = enabled;
    }

    /// Snapshot of the current relation/primary-set cardinalities.
    pub fn tally_counts(&self) -> TallyCounts {
        self.tally.read().counts.clone()
    }

    /// Remove every user, group, entity type, entity, and mapping, resetting
    /// the engine to its initial empty state. Does not reset tally-table
    /// frequency bookkeeping beyond zeroing it, and does not touch the
    /// persister's durable log (a `Clear` is itself not currently part of
    /// the wire event taxonomy; callers that need it logged should record it
    /// through their own event processor).
    pub fn clear(&self) {
        self.users.write().clear();
        self.groups.write().clear();
        *self.user_to_group.write() = BipartiteIndex::new();
        *self.group_to_group.write() = DirectedGraph::new();
        *self.user_to_component.write() = PairIndex::new();
        *self.group_to_component.write() = PairIndex::new();
        self.entities.write().clear();
        *self.user_to_entity.write() = PairIndex::new();
        *self.group_to_entity.write() = PairIndex::new();
        self.tally.write().clear();
    }

    /// Whether `user` is a known user.
    pub fn contains_user(&self, user: &U) -> bool {
        self.users.read().contains(user)
    }

    /// Whether `group` is a known group.
    pub fn contains_group(&self, group: &G) -> bool {
        self.groups.read().contains(group)
    }

    /// Whether `entity_type` is known.
    pub fn contains_entity_type(&self, entity_type: &str) -> bool {
        self.entities.read().contains_key(entity_type)
    }

    /// Whether `entity` is known under `entity_type`.
    pub fn contains_entity(&self, entity_type: &str, entity: &str) -> bool {
        self.entities
            .read()
            .get(entity_type)
            .map(|set| set.contains(entity))
            .unwrap_or(false)
    }

    /// All known users, sorted.
    pub fn users(&self) -> Vec<U> {
        self.users.read().iter().cloned().collect()
    }

    /// All known groups, sorted.
    pub fn groups(&self) -> Vec<G> {
        self.groups.read().iter().cloned().collect()
    }

    /// All known entity types, sorted.
    pub fn entity_types(&self) -> Vec<String> {
        self.entities.read().keys().cloned().collect()
    }

    /// All known entities under `entity_type`, sorted.
    pub fn entities(&self, entity_type: &str) -> Vec<String> {
        self.entities
            .read()
            .get(entity_type)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn begin(&self, kind: &'static str) -> Option<crate::metrics::MetricEventId> {
        self.config.metrics_enabled.then(|| self.metric_logger.begin(kind))
    }

    fn end(&self, id: Option<crate::metrics::MetricEventId>, kind: &'static str) {
        if let Some(id) = id {
            self.metric_logger.end(id, kind);
        }
    }

    fn cancel(&self, id: Option<crate::metrics::MetricEventId>, kind: &'static str) {
        if let Some(id) = id {
            self.metric_logger.cancel_begin(id, kind);
        }
    }

    fn increment(&self, kind: &'static str, delta: i64) {
        if self.config.metrics_enabled {
            self.metric_logger.increment(kind, delta);
        }
    }

    fn set_gauge(&self, kind: &'static str, value: u64) {
        if self.config.metrics_enabled {
            self.metric_logger.set(kind, value);
        }
    }

    fn reach_star_from_groups(&self, start: &BTreeSet<G>) -> BTreeSet<G> {
        let graph = self.group_to_group.read();
        let mut out = start.clone();
        for g in start {
            out.extend(graph.reachable(g));
        }
        out
    }

    fn reach_star_from_user(&self, user: &U) -> BTreeSet<G> {
        let direct: BTreeSet<G> = self.user_to_group.read().forward_neighbors(user).into_iter().collect();
        self.reach_star_from_groups(&direct)
    }

    fn reach_star_reverse_from_group(&self, group: &G) -> BTreeSet<G> {
        // Groups that (directly or transitively) map to `group`, i.e. the
        // reverse closure, used by `GetGroupToGroupReverseMappings`.
        let graph = self.group_to_group.read();
        let mut out = BTreeSet::new();
        graph.traverse(group, crate::graph::Direction::Reverse, |n| {
            out.insert(n.clone());
            crate::graph::Visit::Continue
        });
        out
    }
}

impl<U: Identity, G: Identity, P: Identity, A: Identity> Default for AccessManager<U, G, P, A> {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`AccessManager`], the composition point for its pluggable
/// strategies.
pub struct AccessManagerBuilder<U, G, P, A> {
    config: AccessManagerConfig,
    metric_logger: Box<dyn MetricLogger>,
    event_processor: Box<dyn EventProcessor<U, G, P, A>>,
    persister: Box<dyn AccessManagerEventPersister<U, G, P, A>>,
}

impl<U: Identity, G: Identity, P: Identity, A: Identity> AccessManagerBuilder<U, G, P, A> {
    /// Defaults: strict removal mode, no-op metrics, no downstream event
    /// forwarding, in-memory persister.
    pub fn new() -> Self {
        Self {
            config: AccessManagerConfig::default(),
            metric_logger: Box::new(NoOpMetricLogger),
            event_processor: Box::new(NoOpEventProcessor),
            persister: Box::new(InMemoryEventPersister::new()),
        }
    }

    /// Override the full configuration.
    pub fn config(mut self, config: AccessManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Whether idempotent `Add*`/`Remove*` calls raise an error instead of
    /// silently no-opping.
    pub fn throw_idempotency_exceptions(mut self, throw: bool) -> Self {
        self.config.throw_idempotency_exceptions = throw;
        self
    }

    /// Strict or dependency-free mode.
    pub fn removal_mode(mut self, mode: RemovalMode) -> Self {
        self.config.removal_mode = mode;
        self
    }

    /// Install a metric logger (e.g. [`crate::metrics::TracingMetricLogger`]).
    pub fn metric_logger(mut self, logger: impl MetricLogger + 'static) -> Self {
        self.metric_logger = Box::new(logger);
        self
    }

    /// Install a downstream event processor for dependency-free prerequisite
    /// synthesis (and, in general, every applied event) to forward to.
    pub fn event_processor(mut self, processor: impl EventProcessor<U, G, P, A> + 'static) -> Self {
        self.event_processor = Box::new(processor);
        self
    }

    /// Install a durable event persister.
    pub fn persister(mut self, persister: impl AccessManagerEventPersister<U, G, P, A> + 'static) -> Self {
        self.persister = Box::new(persister);
        self
    }

    /// Build the engine.
    pub fn build(self) -> AccessManager<U, G, P, A> {
        AccessManager {
            config: self.config,
            users: RwLock::new(BTreeSet::new()),
            groups: RwLock::new(BTreeSet::new()),
            user_to_group: RwLock::new(BipartiteIndex::new()),
            group_to_group: RwLock::new(DirectedGraph::new()),
            user_to_component: RwLock::new(PairIndex::new()),
            group_to_component: RwLock::new(PairIndex::new()),
            entities: RwLock::new(BTreeMap::new()),
            user_to_entity: RwLock::new(PairIndex::new()),
            group_to_entity: RwLock::new(PairIndex::new()),
            tally: RwLock::new(TallyState::new()),
            metric_logger: self.metric_logger,
            event_processor: self.event_processor,
            persister: self.persister,
        }
    }
}

impl<U: Identity, G: Identity, P: Identity, A: Identity> Default for AccessManagerBuilder<U, G, P, A> {
    fn default() -> Self {
        Self::new()
    }
}
