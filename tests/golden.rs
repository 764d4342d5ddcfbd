//! End-to-end tests against the public `AccessManager` API: access
//! derivation through group membership, cycle rejection, cascading removal
//! and its tally bookkeeping, the idempotent-add metric sequence, and
//! dependency-free mapping adds.

use std::sync::Arc;

use access_graph_kernel::{AccessManager, AccessManagerBuilder, RemovalMode};
use access_graph_kernel::metrics::TestMetricLogger;

fn engine() -> AccessManager<String, String, String, String> {
    AccessManager::new()
}

#[test]
fn direct_user_to_component_access() {
    let mgr = engine();
    mgr.add_user("alice".to_string(), None).unwrap();
    mgr.add_user_to_component_mapping("alice".to_string(), "billing".to_string(), "read".to_string(), None)
        .unwrap();

    assert!(mgr.has_access_to_application_component(&"alice".to_string(), &"billing".to_string(), &"read".to_string()));
    assert!(!mgr.has_access_to_application_component(&"alice".to_string(), &"billing".to_string(), &"write".to_string()));
}

#[test]
fn indirect_access_through_nested_groups() {
    let mgr = engine();
    mgr.add_user("alice".to_string(), None).unwrap();
    mgr.add_group("engineers".to_string(), None).unwrap();
    mgr.add_group("staff".to_string(), None).unwrap();

    mgr.add_user_to_group_mapping("alice".to_string(), "engineers".to_string(), None).unwrap();
    mgr.add_group_to_group_mapping("engineers".to_string(), "staff".to_string(), None).unwrap();
    mgr.add_group_to_component_mapping("staff".to_string(), "vpn".to_string(), "connect".to_string(), None)
        .unwrap();

    let groups = mgr.get_user_to_group_mappings(&"alice".to_string(), true);
    assert!(groups.contains(&"engineers".to_string()));
    assert!(groups.contains(&"staff".to_string()));

    let components = mgr.get_application_components_accessible_by_user(&"alice".to_string());
    assert!(components.contains(&("vpn".to_string(), "connect".to_string())));
}

#[test]
fn group_to_group_cycle_is_rejected() {
    let mgr = engine();
    mgr.add_group("a".to_string(), None).unwrap();
    mgr.add_group("b".to_string(), None).unwrap();
    mgr.add_group("c".to_string(), None).unwrap();

    mgr.add_group_to_group_mapping("a".to_string(), "b".to_string(), None).unwrap();
    mgr.add_group_to_group_mapping("b".to_string(), "c".to_string(), None).unwrap();

    let err = mgr.add_group_to_group_mapping("c".to_string(), "a".to_string(), None).unwrap_err();
    assert!(matches!(err, access_graph_kernel::AccessManagerError::CycleDetected { .. }));
}

#[test]
fn removing_a_group_cascades_every_relation_it_participates_in() {
    let mgr = engine();
    mgr.add_user("alice".to_string(), None).unwrap();
    mgr.add_group("engineers".to_string(), None).unwrap();
    mgr.add_group("staff".to_string(), None).unwrap();

    mgr.add_user_to_group_mapping("alice".to_string(), "engineers".to_string(), None).unwrap();
    mgr.add_group_to_group_mapping("engineers".to_string(), "staff".to_string(), None).unwrap();
    mgr.add_group_to_component_mapping("engineers".to_string(), "vpn".to_string(), "connect".to_string(), None)
        .unwrap();

    mgr.remove_group(&"engineers".to_string(), None).unwrap();

    assert!(!mgr.contains_group(&"engineers".to_string()));
    assert!(mgr.get_user_to_group_mappings(&"alice".to_string(), true).is_empty());
    assert!(mgr
        .get_application_components_accessible_by_user(&"alice".to_string())
        .is_empty());
}

#[test]
fn removing_a_user_drops_the_tally_by_exactly_its_own_mappings() {
    let mgr = engine();
    for u in ["u1", "u2", "u3"] {
        mgr.add_user(u.to_string(), None).unwrap();
    }
    for g in ["g1", "g2", "g3", "g4"] {
        mgr.add_group(g.to_string(), None).unwrap();
    }
    for (user, group) in [
        ("u1", "g1"), ("u1", "g2"), ("u1", "g3"), ("u1", "g4"),
        ("u2", "g2"), ("u2", "g3"), ("u2", "g4"),
        ("u3", "g3"), ("u3", "g4"),
    ] {
        mgr.add_user_to_group_mapping(user.to_string(), group.to_string(), None).unwrap();
    }
    mgr.add_entity_type("ClientAccount".to_string(), None).unwrap();
    mgr.add_entity("ClientAccount", "CompanyA".to_string(), None).unwrap();
    for access in ["View", "Modify", "Create"] {
        mgr.add_user_to_component_mapping("u1".to_string(), "Order".to_string(), access.to_string(), None).unwrap();
    }
    mgr.add_user_to_entity_mapping("u1".to_string(), "ClientAccount".to_string(), "CompanyA".to_string(), None)
        .unwrap();

    mgr.remove_user(&"u1".to_string(), None).unwrap();

    let tally = mgr.tally_counts();
    assert_eq!(tally.users, 2);
    assert_eq!(tally.user_to_group, 5);
    assert_eq!(tally.user_to_component, 0);
    assert_eq!(tally.user_to_entity, 0);
}

#[test]
fn idempotent_add_emits_the_documented_metric_sequence() {
    let logger = Arc::new(TestMetricLogger::new());
    let mgr = AccessManagerBuilder::new().metric_logger(Arc::clone(&logger)).build();

    mgr.add_user("u1".to_string(), None).unwrap();
    mgr.add_user("u1".to_string(), None).unwrap();

    assert_eq!(logger.begin_count("UserAdd"), 2);
    assert_eq!(logger.end_count("UserAdd"), 1);
    assert_eq!(logger.cancel_count("UserAdd"), 1);
    assert_eq!(logger.increment_total("UserAdd"), 1);
    assert_eq!(logger.gauge("UserAdd"), Some(1));
}

#[test]
fn dependency_free_mapping_add_synthesizes_missing_primaries() {
    let mgr = AccessManagerBuilder::new().removal_mode(RemovalMode::DependencyFree).build();

    let outcome = mgr
        .add_user_to_group_mapping("ghost".to_string(), "phantom".to_string(), None)
        .unwrap();

    assert!(outcome.changed);
    assert!(mgr.contains_user(&"ghost".to_string()));
    assert!(mgr.contains_group(&"phantom".to_string()));
    assert!(mgr.get_user_to_group_mappings(&"ghost".to_string(), false).contains(&"phantom".to_string()));
}

#[test]
fn dependency_free_remove_of_a_missing_mapping_is_a_reported_no_op() {
    let logger = Arc::new(TestMetricLogger::new());
    let mgr = AccessManagerBuilder::new()
        .removal_mode(RemovalMode::DependencyFree)
        .metric_logger(Arc::clone(&logger))
        .build();

    mgr.add_user("u1".to_string(), None).unwrap();
    mgr.add_group("g1".to_string(), None).unwrap();

    let outcome = mgr.remove_user_to_group_mapping(&"u1".to_string(), &"g1".to_string(), None).unwrap();

    assert!(!outcome.changed);
    assert_eq!(logger.cancel_count("UserToGroupRemove"), 1);
}
