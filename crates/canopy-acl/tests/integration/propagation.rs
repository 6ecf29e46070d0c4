//! Propagation rules observed through full syncs.

use canopy_acl::{
    ContributionKind, Error, GrantOrigin, InheritanceResolver, PermissionSync, SafetyGate,
};
use canopy_core::{
    Container, ContainerId, ContainerLevel, ContainerMember, MemberLevel, Permissions, Principal,
    PrincipalRef, Resource, ResourceId, ResourceKind, ResourceMember, Stores,
};
use canopy_storage::MemoryStore;

use crate::common::{bits, chain, denied, rule_bits, scenario_a};

fn r(id: &str) -> ResourceId {
    ResourceId::new(id)
}

fn sync_all(store: &MemoryStore) {
    PermissionSync::new(Stores::uniform(store))
        .resync_container(&ContainerId::new("c1"))
        .unwrap();
}

/// Container manager `alice` over `r1 -> r2 -> r3`, default masks.
fn managed(inherit_managers: bool) -> MemoryStore {
    MemoryStore::new()
        .with_container(Container::new("c1"))
        .with_container_member(ContainerMember::new(
            "c1",
            PrincipalRef::user("alice"),
            ContainerLevel::Admin,
        ))
        .with_resource(Resource::folder("r1", "c1").with_inherit_managers(inherit_managers))
        .with_resource(Resource::folder("r2", "c1").with_parent("r1"))
        .with_resource(Resource::folder("r3", "c1").with_parent("r2"))
        .with_principal(Principal::new(PrincipalRef::user("alice")))
}

#[test]
fn test_deactivation_zeroes_subtree_and_reactivation_restores() {
    let store = chain();
    let sync = PermissionSync::new(Stores::uniform(&store));
    sync.apply_edit(&r("r1"), &SafetyGate::disabled()).unwrap();
    let original = store.all_rules();

    store.update_resource(&r("r2"), |r| r.active = false).unwrap();
    sync.apply_edit(&r("r2"), &SafetyGate::disabled()).unwrap();
    assert_ne!(rule_bits(&store, "r1"), denied());
    assert_eq!(rule_bits(&store, "r2"), denied());
    assert_eq!(rule_bits(&store, "r3"), denied());

    store.update_resource(&r("r2"), |r| r.active = true).unwrap();
    sync.apply_edit(&r("r2"), &SafetyGate::disabled()).unwrap();
    assert_eq!(store.all_rules(), original);
}

#[test]
fn test_chain_members_inherit_read() {
    let store = chain();
    sync_all(&store);

    assert_eq!(
        rule_bits(&store, "r3"),
        bits(&[
            ("everyone:everyone", 0),
            ("user:u1", 1),
            ("user:u2", 1),
            ("user:u3", 15),
        ])
    );
}

#[test]
fn test_zero_inherited_mask_stops_member_propagation() {
    let store = chain();
    store
        .update_resource(&r("r2"), |r| r.inherited_permissions = Permissions::NONE)
        .unwrap();
    sync_all(&store);

    assert_eq!(
        rule_bits(&store, "r2"),
        bits(&[("everyone:everyone", 0), ("user:u2", 15)])
    );
    assert_eq!(
        rule_bits(&store, "r3"),
        bits(&[("everyone:everyone", 0), ("user:u3", 15)])
    );
}

#[test]
fn test_inherited_managers_keep_full_grant() {
    let store = managed(true);
    sync_all(&store);

    for id in ["r1", "r2", "r3"] {
        assert_eq!(rule_bits(&store, id).get("user:alice"), Some(&31), "{id}");
    }
}

#[test]
fn test_inherit_managers_off_demotes_to_member_below() {
    let store = managed(false);
    sync_all(&store);

    assert_eq!(rule_bits(&store, "r1").get("user:alice"), Some(&31));
    assert_eq!(rule_bits(&store, "r2").get("user:alice"), Some(&1));
    assert_eq!(rule_bits(&store, "r3").get("user:alice"), Some(&1));
}

#[test]
fn test_direct_manager_below_non_inheriting_resource() {
    let store = managed(false).with_resource_member(ResourceMember::new(
        "r2",
        PrincipalRef::user("bob"),
        MemberLevel::Manager,
    ));
    store.upsert_principal(Principal::new(PrincipalRef::user("bob")));
    sync_all(&store);

    assert_eq!(rule_bits(&store, "r2").get("user:bob"), Some(&31));
    assert_eq!(rule_bits(&store, "r3").get("user:bob"), Some(&31));
    assert!(!rule_bits(&store, "r1").contains_key("user:bob"));
}

#[test]
fn test_organization_seeds_top_level_members() {
    let store = MemoryStore::new()
        .with_container(Container::new("c1").with_organization("acme"))
        .with_resource(Resource::folder("r1", "c1"))
        .with_resource(Resource::folder("r2", "c1").with_parent("r1"))
        .with_principal(
            Principal::new(PrincipalRef::org_member("acme")).with_backing_group("acme-all"),
        );
    sync_all(&store);

    assert_eq!(rule_bits(&store, "r1").get("group:acme-all"), Some(&15));
    assert_eq!(rule_bits(&store, "r2").get("group:acme-all"), Some(&1));
}

#[test]
fn test_invalid_and_unknown_principals_are_skipped() {
    let store = chain();
    store.upsert_principal(Principal::new(PrincipalRef::user("u2")).invalidated());
    store.add_resource_member(ResourceMember::new(
        "r3",
        PrincipalRef::user("nobody"),
        MemberLevel::Member,
    ));
    sync_all(&store);

    let r3 = rule_bits(&store, "r3");
    assert!(!r3.contains_key("user:u2"));
    assert!(!r3.contains_key("user:nobody"));
    assert_eq!(r3.get("user:u3"), Some(&15));
}

#[test]
fn test_non_folder_resources_propagate_without_rules() {
    let store = chain();
    store
        .update_resource(&r("r2"), |r| {
            r.kind = ResourceKind::Custom("board".to_string())
        })
        .unwrap();
    let sync = PermissionSync::new(Stores::uniform(&store));

    let report = sync.apply_edit(&r("r1"), &SafetyGate::disabled()).unwrap();

    let touched: Vec<_> = report.resources.iter().map(|s| s.resource_id.clone()).collect();
    assert_eq!(touched, vec![r("r1"), r("r3")]);
    assert!(rule_bits(&store, "r2").is_empty());
    assert_eq!(rule_bits(&store, "r3").get("user:u2"), Some(&1));
}

#[test]
fn test_editing_non_folder_resource_is_a_configuration_error() {
    let store = chain();
    store
        .update_resource(&r("r2"), |r| {
            r.kind = ResourceKind::Custom("board".to_string())
        })
        .unwrap();
    let sync = PermissionSync::new(Stores::uniform(&store));

    let err = sync
        .apply_edit(&r("r2"), &SafetyGate::disabled())
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Core(canopy_core::Error::UnsupportedResourceKind { .. })
    ));
    assert!(!err.is_recoverable());
    assert!(store.all_rules().is_empty());
}

#[test]
fn test_tracing_records_where_grants_came_from() {
    let store = scenario_a();
    let resolver = InheritanceResolver::new(Stores::uniform(&store)).with_tracing(true);

    let r2 = resolver
        .resolve_along_ancestor_path(&r("r2"))
        .last()
        .unwrap()
        .unwrap();

    let staff = r2.grants.get(&PrincipalRef::group("staff")).unwrap();
    let origins = staff.origins.as_ref().unwrap();
    assert_eq!(origins.len(), 1);
    assert_eq!(origins[0].kind, ContributionKind::InheritedMember);
    assert_eq!(
        origins[0].inherited_from,
        Some(GrantOrigin::Container(ContainerId::new("c1")))
    );

    let sub = r2.grants.get(&PrincipalRef::group("staff-sub")).unwrap();
    let origins = sub.origins.as_ref().unwrap();
    assert_eq!(origins[0].kind, ContributionKind::DirectMember);
    assert!(origins[0].inherited_from.is_none());
}
