//! Query API: direct and transitive (indirect) reachability, plus the two
//! "effective access" convenience queries used by callers that just want a
//! yes/no answer or the full accessible set.
//!
//! "Transitive" queries always include the direct mapping plus everything
//! reachable through `GroupToGroup` edges — `reach*(start)` in the spec's
//! notation is the reflexive-transitive closure over the directly mapped
//! groups, not just the edges beyond them.

use std::collections::BTreeSet;

use crate::graph::Direction;
use crate::ids::Identity;

use super::AccessManager;

impl<U: Identity, G: Identity, P: Identity, A: Identity> AccessManager<U, G, P, A> {
    // ---- UserToGroup / GroupToGroup ---------------------------------------

    /// Groups `user` maps to. With `include_indirect`, also includes every
    /// group transitively reachable through `GroupToGroup` edges.
    pub fn get_user_to_group_mappings(&self, user: &U, include_indirect: bool) -> Vec<G> {
        if include_indirect {
            self.reach_star_from_user(user).into_iter().collect()
        } else {
            self.user_to_group.read().forward_neighbors(user)
        }
    }

    /// Users mapped to `group` (the reverse of [`Self::get_user_to_group_mappings`]).
    /// With `include_indirect`, also includes users mapped to any group that
    /// transitively reaches `group`.
    pub fn get_group_to_user_mappings(&self, group: &G, include_indirect: bool) -> Vec<U> {
        if !include_indirect {
            return self.user_to_group.read().reverse_neighbors(group);
        }
        let ancestor_groups = self.reach_star_reverse_from_group(group);
        let mut out: BTreeSet<U> = self.user_to_group.read().reverse_neighbors(group).into_iter().collect();
        let index = self.user_to_group.read();
        for g in &ancestor_groups {
            out.extend(index.reverse_neighbors(g));
        }
        out.into_iter().collect()
    }

    /// Groups that `group` directly maps to, or (with `include_indirect`)
    /// everything transitively reachable from it.
    pub fn get_group_to_group_mappings(&self, group: &G, include_indirect: bool) -> Vec<G> {
        let graph = self.group_to_group.read();
        if include_indirect {
            graph.reachable(group).into_iter().collect()
        } else {
            graph.neighbors(group, Direction::Forward)
        }
    }

    /// Groups that directly map to `group`, or (with `include_indirect`)
    /// every ancestor that transitively maps to it.
    pub fn get_group_to_group_reverse_mappings(&self, group: &G, include_indirect: bool) -> Vec<G> {
        if include_indirect {
            self.reach_star_reverse_from_group(group).into_iter().collect()
        } else {
            self.group_to_group.read().neighbors(group, Direction::Reverse)
        }
    }

    // ---- component mappings ------------------------------------------------

    /// `(component, access)` pairs `user` is directly mapped to.
    pub fn get_user_to_component_mappings(&self, user: &U) -> Vec<(P, A)> {
        self.user_to_component.read().forward_of(user)
    }

    /// Users directly mapped to `(component, access)`.
    pub fn get_component_to_user_mappings(&self, component: &P, access: &A) -> Vec<U> {
        self.user_to_component.read().reverse_of(component, access)
    }

    /// `(component, access)` pairs `group` is directly mapped to.
    pub fn get_group_to_component_mappings(&self, group: &G) -> Vec<(P, A)> {
        self.group_to_component.read().forward_of(group)
    }

    /// Groups directly mapped to `(component, access)`.
    pub fn get_component_to_group_mappings(&self, component: &P, access: &A) -> Vec<G> {
        self.group_to_component.read().reverse_of(component, access)
    }

    // ---- entity mappings ----------------------------------------------------

    /// `(entityType, entity)` pairs `user` is directly mapped to, optionally
    /// filtered to a single `entity_type`.
    pub fn get_user_to_entity_mappings(&self, user: &U, entity_type: Option<&str>) -> Vec<(String, String)> {
        let pairs = self.user_to_entity.read().forward_of(user);
        match entity_type {
            Some(t) => pairs.into_iter().filter(|(et, _)| et == t).collect(),
            None => pairs,
        }
    }

    /// Users directly mapped to `(entity_type, entity)`.
    pub fn get_entity_to_user_mappings(&self, entity_type: &str, entity: &str) -> Vec<U> {
        self.user_to_entity.read().reverse_of(&entity_type.to_string(), &entity.to_string())
    }

    /// `(entityType, entity)` pairs `group` is directly mapped to, optionally
    /// filtered to a single `entity_type`.
    pub fn get_group_to_entity_mappings(&self, group: &G, entity_type: Option<&str>) -> Vec<(String, String)> {
        let pairs = self.group_to_entity.read().forward_of(group);
        match entity_type {
            Some(t) => pairs.into_iter().filter(|(et, _)| et == t).collect(),
            None => pairs,
        }
    }

    /// Groups directly mapped to `(entity_type, entity)`.
    pub fn get_entity_to_group_mappings(&self, entity_type: &str, entity: &str) -> Vec<G> {
        self.group_to_entity.read().reverse_of(&entity_type.to_string(), &entity.to_string())
    }

    // ---- effective access ---------------------------------------------------

    /// Whether `user` can reach `(component, access)`, directly or through
    /// any group in `reach*(user)`.
    pub fn has_access_to_application_component(&self, user: &U, component: &P, access: &A) -> bool {
        if self.user_to_component.read().contains(user, component, access) {
            return true;
        }
        let groups = self.reach_star_from_user(user);
        self.has_access_to_application_component_via_groups(&groups, component, access)
    }

    /// Group-set-parameterized overload: whether any group in `groups`
    /// (after taking `reach*` over each) can reach `(component, access)`.
    /// Used by the distributed coordinator, which resolves a user's direct
    /// groups on the owning shard and fans the transitive check out to every
    /// shard that owns one of those groups.
    pub fn has_access_to_application_component_via_groups(&self, groups: &BTreeSet<G>, component: &P, access: &A) -> bool {
        let closure = self.reach_star_from_groups(groups);
        let index = self.group_to_component.read();
        closure.iter().any(|g| index.contains(g, component, access))
    }

    /// Whether `user` can reach `(entity_type, entity)`, directly or through
    /// any group in `reach*(user)`.
    pub fn has_access_to_entity(&self, user: &U, entity_type: &str, entity: &str) -> bool {
        let et = entity_type.to_string();
        let en = entity.to_string();
        if self.user_to_entity.read().contains(user, &et, &en) {
            return true;
        }
        let groups = self.reach_star_from_user(user);
        self.has_access_to_entity_via_groups(&groups, entity_type, entity)
    }

    /// Group-set-parameterized overload of [`Self::has_access_to_entity`].
    pub fn has_access_to_entity_via_groups(&self, groups: &BTreeSet<G>, entity_type: &str, entity: &str) -> bool {
        let et = entity_type.to_string();
        let en = entity.to_string();
        let closure = self.reach_star_from_groups(groups);
        let index = self.group_to_entity.read();
        closure.iter().any(|g| index.contains(g, &et, &en))
    }

    /// Every `(component, access)` pair `user` can reach, directly or via
    /// `reach*(user)`.
    pub fn get_application_components_accessible_by_user(&self, user: &U) -> BTreeSet<(P, A)> {
        let mut out: BTreeSet<(P, A)> =
            self.user_to_component.read().forward_of(user).into_iter().collect();
        let groups = self.reach_star_from_user(user);
        out.extend(self.get_application_components_accessible_by_groups(&groups));
        out
    }

    /// Group-set-parameterized overload of
    /// [`Self::get_application_components_accessible_by_user`].
    pub fn get_application_components_accessible_by_groups(&self, groups: &BTreeSet<G>) -> BTreeSet<(P, A)> {
        let closure = self.reach_star_from_groups(groups);
        let index = self.group_to_component.read();
        closure.iter().flat_map(|g| index.forward_of(g)).collect()
    }

    /// Every `(entityType, entity)` pair `user` can reach, directly or via
    /// `reach*(user)`, optionally filtered to a single `entity_type`.
    pub fn get_entities_accessible_by_user(&self, user: &U, entity_type: Option<&str>) -> BTreeSet<(String, String)> {
        let mut out: BTreeSet<(String, String)> =
            self.get_user_to_entity_mappings(user, entity_type).into_iter().collect();
        let groups = self.reach_star_from_user(user);
        out.extend(self.get_entities_accessible_by_groups(&groups, entity_type));
        out
    }

    /// Group-set-parameterized overload of
    /// [`Self::get_entities_accessible_by_user`].
    pub fn get_entities_accessible_by_groups(&self, groups: &BTreeSet<G>, entity_type: Option<&str>) -> BTreeSet<(String, String)> {
        let closure = self.reach_star_from_groups(groups);
        let index = self.group_to_entity.read();
        closure
            .iter()
            .flat_map(|g| index.forward_of(g))
            .filter(|(et, _)| entity_type.map(|t| et == t).unwrap_or(true))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::core::AccessManager;

    fn fixture() -> AccessManager<String, String, String, String> {
        let mgr: AccessManager<String, String, String, String> = AccessManager::new();
        mgr.add_user("u1".into(), None).unwrap();
        for g in ["g1", "g2", "g3"] {
            mgr.add_group(g.to_string(), None).unwrap();
        }
        mgr.add_user_to_group_mapping("u1".into(), "g1".into(), None).unwrap();
        mgr.add_group_to_group_mapping("g1".into(), "g2".into(), None).unwrap();
        mgr.add_group_to_group_mapping("g2".into(), "g3".into(), None).unwrap();
        mgr.add_group_to_component_mapping("g3".into(), "Order".into(), "View".into(), None).unwrap();
        mgr
    }

    #[test]
    fn indirect_group_mappings_include_the_whole_chain() {
        let mgr = fixture();
        let groups = mgr.get_user_to_group_mappings(&"u1".to_string(), true);
        assert_eq!(groups, vec!["g1".to_string(), "g2".to_string(), "g3".to_string()]);
    }

    #[test]
    fn direct_group_mappings_exclude_transitive_groups() {
        let mgr = fixture();
        let groups = mgr.get_user_to_group_mappings(&"u1".to_string(), false);
        assert_eq!(groups, vec!["g1".to_string()]);
    }

    #[test]
    fn access_reaches_through_the_whole_group_chain() {
        let mgr = fixture();
        assert!(mgr.has_access_to_application_component(&"u1".to_string(), &"Order".to_string(), &"View".to_string()));
    }

    #[test]
    fn reverse_group_mappings_find_ancestors() {
        let mgr = fixture();
        let ancestors = mgr.get_group_to_group_reverse_mappings(&"g3".to_string(), true);
        assert_eq!(ancestors, vec!["g1".to_string(), "g2".to_string()]);
    }
}
