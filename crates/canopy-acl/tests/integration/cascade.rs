//! Partial failure during a multi-resource sync.

use canopy_acl::{Error, PermissionSync, SafetyGate};
use canopy_core::{ContainerId, ResourceId};

use crate::common::{FailOn, chain, rule_bits, stores_with_rules};

fn r(id: &str) -> ResourceId {
    ResourceId::new(id)
}

#[test]
fn test_failure_mid_cascade_reports_committed_prefix() {
    let store = chain();
    let failing = FailOn::new(&store, "r3");
    let sync = PermissionSync::new(stores_with_rules(&store, &failing));

    let err = sync
        .apply_edit(&r("r1"), &SafetyGate::disabled())
        .unwrap_err();

    match &err {
        Error::CascadeInterrupted {
            committed, failed, ..
        } => {
            assert_eq!(committed, &vec![r("r1"), r("r2")]);
            assert_eq!(failed, &r("r3"));
        }
        other => unreachable!("expected CascadeInterrupted, got {other:?}"),
    }
    assert!(err.is_recoverable());
    assert!(!rule_bits(&store, "r1").is_empty());
    assert!(!rule_bits(&store, "r2").is_empty());
    assert!(rule_bits(&store, "r3").is_empty());
}

#[test]
fn test_rerun_after_interruption_completes() {
    let store = chain();
    let failing = FailOn::new(&store, "r3");
    assert!(
        PermissionSync::new(stores_with_rules(&store, &failing))
            .apply_edit(&r("r1"), &SafetyGate::disabled())
            .is_err()
    );

    let report = PermissionSync::new(stores_with_rules(&store, &store))
        .apply_edit(&r("r1"), &SafetyGate::disabled())
        .unwrap();

    let changed: Vec<_> = report
        .resources
        .iter()
        .filter(|s| !s.is_noop())
        .map(|s| s.resource_id.clone())
        .collect();
    assert_eq!(changed, vec![r("r3")]);
    assert_eq!(rule_bits(&store, "r3").get("user:u3"), Some(&15));
}

#[test]
fn test_failure_on_first_resource_is_returned_unwrapped() {
    let store = chain();
    let failing = FailOn::new(&store, "r1");
    let sync = PermissionSync::new(stores_with_rules(&store, &failing));

    let err = sync
        .apply_edit(&r("r1"), &SafetyGate::disabled())
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Core(canopy_core::Error::Store { .. })
    ));
    assert!(store.all_rules().is_empty());
}

#[test]
fn test_resync_stops_at_failed_resource() {
    let store = chain();
    let failing = FailOn::new(&store, "r2");
    let sync = PermissionSync::new(stores_with_rules(&store, &failing));

    assert!(
        sync.resync_container(&ContainerId::new("c1"))
            .is_err()
    );
    assert!(!rule_bits(&store, "r1").is_empty());
    assert!(rule_bits(&store, "r2").is_empty());
    assert!(rule_bits(&store, "r3").is_empty());
}
