//! End-to-end sync scenarios on small trees.

use canopy_acl::{Error, PermissionSync, SafetyGate};
use canopy_core::{
    Container, ContainerId, MemberLevel, Permissions, Principal, PrincipalRef, Resource,
    ResourceId, ResourceMember, Stores,
};
use canopy_storage::MemoryStore;

use crate::common::{RU, bits, denied, rule_bits, scenario_a};

fn r(id: &str) -> ResourceId {
    ResourceId::new(id)
}

/// Like scenario A, but nobody holds any membership yet.
fn ungranted() -> MemoryStore {
    MemoryStore::new()
        .with_container(Container::new("c1"))
        .with_resource(Resource::folder("r1", "c1").with_masks(
            RU,
            Permissions::NONE,
            Permissions::READ,
        ))
        .with_resource(Resource::folder("r2", "c1").with_parent("r1"))
        .with_principal(Principal::new(PrincipalRef::group("staff")))
        .with_group_size("staff", 5000)
}

#[test]
fn test_scenario_a_inherited_and_direct_grants() {
    let store = scenario_a();
    let sync = PermissionSync::new(Stores::uniform(&store));

    let report = sync.apply_edit(&r("r1"), &SafetyGate::disabled()).unwrap();

    assert_eq!(report.edited, Some(r("r1")));
    assert_eq!(report.resources.len(), 2);
    assert_eq!(
        rule_bits(&store, "r1"),
        bits(&[("everyone:everyone", 0), ("group:staff", 3)])
    );
    assert_eq!(
        rule_bits(&store, "r2"),
        bits(&[
            ("everyone:everyone", 0),
            ("group:staff", 1),
            ("group:staff-sub", 1),
        ])
    );
}

#[test]
fn test_scenario_b_inactive_root_denies_subtree() {
    let store = scenario_a();
    store
        .update_resource(&r("r1"), |r| r.active = false)
        .unwrap();
    let sync = PermissionSync::new(Stores::uniform(&store));

    sync.apply_edit(&r("r1"), &SafetyGate::disabled()).unwrap();

    assert_eq!(rule_bits(&store, "r1"), denied());
    assert_eq!(rule_bits(&store, "r2"), denied());
}

#[test]
fn test_scenario_c_gate_blocks_large_grant() {
    let store = ungranted();
    let sync = PermissionSync::new(Stores::uniform(&store));
    sync.resync_container(&ContainerId::new("c1")).unwrap();
    let before = store.all_rules();

    store.add_resource_member(ResourceMember::new(
        "r1",
        PrincipalRef::group("staff"),
        MemberLevel::Member,
    ));
    let err = sync
        .apply_edit(&r("r1"), &SafetyGate::with_threshold(100))
        .unwrap_err();

    assert!(matches!(
        &err,
        Error::ChangeTooLarge { resource, threshold: 100, .. } if resource == &r("r1")
    ));
    assert_eq!(err.change_counts(), Some((5000, 0)));
    assert!(err.is_recoverable());
    assert_eq!(store.all_rules(), before);
}

#[test]
fn test_gate_override_after_rejection() {
    let store = ungranted();
    let sync = PermissionSync::new(Stores::uniform(&store));
    store.add_resource_member(ResourceMember::new(
        "r1",
        PrincipalRef::group("staff"),
        MemberLevel::Member,
    ));

    assert!(
        sync.apply_edit(&r("r1"), &SafetyGate::with_threshold(100))
            .is_err()
    );
    let report = sync.apply_edit(&r("r1"), &SafetyGate::disabled()).unwrap();

    assert_eq!(report.impact.unwrap().users_added, 5000);
    assert_eq!(
        rule_bits(&store, "r1"),
        bits(&[("everyone:everyone", 0), ("group:staff", 3)])
    );
    assert_eq!(
        rule_bits(&store, "r2"),
        bits(&[("everyone:everyone", 0), ("group:staff", 1)])
    );
}

#[test]
fn test_gate_counts_removals() {
    let store = ungranted();
    let sync = PermissionSync::new(Stores::uniform(&store));
    store.add_resource_member(ResourceMember::new(
        "r1",
        PrincipalRef::group("staff"),
        MemberLevel::Member,
    ));
    sync.apply_edit(&r("r1"), &SafetyGate::disabled()).unwrap();

    store.remove_resource_member(&r("r1"), &PrincipalRef::group("staff"));
    let err = sync
        .apply_edit(&r("r1"), &SafetyGate::with_threshold(100))
        .unwrap_err();

    assert_eq!(err.change_counts(), Some((0, 5000)));
}

#[test]
fn test_only_edited_resource_is_gated() {
    let store = ungranted();
    let sync = PermissionSync::new(Stores::uniform(&store));
    sync.resync_container(&ContainerId::new("c1")).unwrap();

    // A direct grant on r2 is too large when r2 itself is edited.
    store.add_resource_member(ResourceMember::new(
        "r2",
        PrincipalRef::group("staff"),
        MemberLevel::Member,
    ));
    assert!(
        sync.apply_edit(&r("r2"), &SafetyGate::with_threshold(100))
            .is_err()
    );

    // Editing r1 instead leaves r1's rules alone, so the cascade to r2 goes
    // through unchecked.
    let report = sync
        .apply_edit(&r("r1"), &SafetyGate::with_threshold(100))
        .unwrap();
    assert_eq!(report.impact.unwrap().total_users(), 0);
    assert_eq!(rule_bits(&store, "r2").get("group:staff"), Some(&15));
}

#[test]
fn test_second_sync_is_a_noop() {
    let store = scenario_a();
    let sync = PermissionSync::new(Stores::uniform(&store));
    sync.apply_edit(&r("r1"), &SafetyGate::disabled()).unwrap();

    let again = sync.apply_edit(&r("r1"), &SafetyGate::disabled()).unwrap();

    assert_eq!(again.total_changes(), 0);
    assert!(again.resources.iter().all(|s| s.is_noop()));
    assert_eq!(again.impact.unwrap().rule_changes, 0);
}

#[test]
fn test_dry_run_preview_writes_nothing() {
    let store = scenario_a();
    let sync = PermissionSync::new(Stores::uniform(&store));

    let plan = sync.plan_edit(&r("r1")).unwrap();
    let preview = plan.preview().unwrap();

    assert_eq!(preview.resources.len(), 2);
    assert_eq!(preview.resources[0].created, 2);
    assert_eq!(preview.resources[1].created, 3);
    let impact = preview.impact.unwrap();
    assert_eq!(impact.users_added, 5000);
    assert!(!SafetyGate::with_threshold(100).allows(&impact));
    assert!(store.all_rules().is_empty());

    // The same plan can still be committed.
    plan.commit(&SafetyGate::disabled()).unwrap();
    assert_eq!(store.all_rules().len(), 5);
}

#[test]
fn test_edit_on_unknown_resource() {
    let store = scenario_a();
    let sync = PermissionSync::new(Stores::uniform(&store));

    let err = sync
        .apply_edit(&r("missing"), &SafetyGate::disabled())
        .unwrap_err();
    assert!(err.to_string().contains("resource not found: missing"));
}

#[test]
fn test_stale_rules_are_removed() {
    let store = scenario_a().with_rule(canopy_core::Rule::absolute(
        canopy_core::Mapping::user("departed"),
        r("r2"),
        Permissions::ALL,
    ));
    let sync = PermissionSync::new(Stores::uniform(&store));

    let report = sync.apply_edit(&r("r1"), &SafetyGate::disabled()).unwrap();

    assert_eq!(report.resources[1].removed, 1);
    assert!(!rule_bits(&store, "r2").contains_key("user:departed"));
}
