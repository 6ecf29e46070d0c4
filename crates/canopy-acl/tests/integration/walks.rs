//! Resolver walk order, scoping, and restartability.

use canopy_acl::InheritanceResolver;
use canopy_core::{
    Container, ContainerId, MemberLevel, Principal, PrincipalRef, Resource, ResourceId,
    ResourceMember, Stores,
};
use canopy_storage::MemoryStore;

use crate::common::chain;

/// `a(a1(a11), a2)`, `b` in `c1`, plus `x` in `c2`.
fn forest() -> MemoryStore {
    MemoryStore::new()
        .with_container(Container::new("c1"))
        .with_container(Container::new("c2"))
        .with_resource(Resource::folder("b", "c1"))
        .with_resource(Resource::folder("a", "c1"))
        .with_resource(Resource::folder("a2", "c1").with_parent("a"))
        .with_resource(Resource::folder("a1", "c1").with_parent("a"))
        .with_resource(Resource::folder("a11", "c1").with_parent("a1"))
        .with_resource(Resource::folder("x", "c2"))
}

fn ids(walk: impl Iterator<Item = canopy_acl::Result<canopy_acl::ResourceGrants>>) -> Vec<String> {
    walk.map(|step| step.unwrap().resource.id.as_str().to_string())
        .collect()
}

#[test]
fn test_entire_container_is_pre_order() {
    let store = forest();
    let resolver = InheritanceResolver::new(Stores::uniform(&store));

    let order = ids(resolver.resolve_entire_container(&ContainerId::new("c1")));
    assert_eq!(order, vec!["a", "a1", "a11", "a2", "b"]);
}

#[test]
fn test_ancestor_path_stops_at_target() {
    let store = forest();
    let resolver = InheritanceResolver::new(Stores::uniform(&store));

    let order = ids(resolver.resolve_along_ancestor_path(&ResourceId::new("a11")));
    assert_eq!(order, vec!["a", "a1", "a11"]);
}

#[test]
fn test_ancestor_path_and_subtree() {
    let store = forest();
    let resolver = InheritanceResolver::new(Stores::uniform(&store));

    let order = ids(resolver.resolve_along_ancestor_path_and_subtree(&ResourceId::new("a")));
    assert_eq!(order, vec!["a", "a1", "a11", "a2"]);

    let order = ids(resolver.resolve_along_ancestor_path_and_subtree(&ResourceId::new("a1")));
    assert_eq!(order, vec!["a", "a1", "a11"]);
}

#[test]
fn test_walks_are_lazy_and_restartable() {
    let store = chain();
    let resolver = InheritanceResolver::new(Stores::uniform(&store));
    let target = ResourceId::new("r3");

    let mut partial = resolver.resolve_along_ancestor_path(&target);
    assert_eq!(partial.next().unwrap().unwrap().resource.id, ResourceId::new("r1"));
    drop(partial);

    let first: Vec<_> = resolver
        .resolve_along_ancestor_path(&target)
        .map(|s| s.unwrap())
        .collect();
    let second: Vec<_> = resolver
        .resolve_along_ancestor_path(&target)
        .map(|s| s.unwrap())
        .collect();
    assert_eq!(first, second);

    // A fresh walk sees store changes made in between.
    store.add_resource_member(ResourceMember::new(
        "r1",
        PrincipalRef::user("late"),
        MemberLevel::Member,
    ));
    store.upsert_principal(Principal::new(PrincipalRef::user("late")));
    let third = resolver
        .resolve_along_ancestor_path(&target)
        .last()
        .unwrap()
        .unwrap();
    assert!(!third.permissions_for(&PrincipalRef::user("late")).is_empty());
}

#[test]
fn test_ancestor_path_through_inactive_root_grants_nothing() {
    let store = chain();
    store
        .update_resource(&ResourceId::new("r1"), |r| r.active = false)
        .unwrap();
    let resolver = InheritanceResolver::new(Stores::uniform(&store));

    let steps: Vec<_> = resolver
        .resolve_along_ancestor_path(&ResourceId::new("r3"))
        .map(|s| s.unwrap())
        .collect();
    let order: Vec<_> = steps.iter().map(|s| s.resource.id.as_str()).collect();
    assert_eq!(order, vec!["r1", "r2", "r3"]);
    assert!(steps.iter().all(|s| s.grants.is_empty()));
    assert!(steps[2].permissions_for(&PrincipalRef::user("u3")).is_empty());
}

#[test]
fn test_parent_cycle_is_reported() {
    let store = MemoryStore::new()
        .with_container(Container::new("c1"))
        .with_resource(Resource::folder("p", "c1").with_parent("q"))
        .with_resource(Resource::folder("q", "c1").with_parent("p"));
    let resolver = InheritanceResolver::new(Stores::uniform(&store));

    let mut walk = resolver.resolve_along_ancestor_path(&ResourceId::new("p"));
    let err = walk.next().unwrap().unwrap_err();
    assert!(matches!(
        err,
        canopy_acl::Error::Core(canopy_core::Error::HierarchyCycle { .. })
    ));
    assert!(walk.next().is_none());
}

#[test]
fn test_missing_container_fails_first_step() {
    let store = MemoryStore::new().with_resource(Resource::folder("orphan", "ghost"));
    let resolver = InheritanceResolver::new(Stores::uniform(&store));

    let mut walk = resolver.resolve_along_ancestor_path(&ResourceId::new("orphan"));
    let err = walk.next().unwrap().unwrap_err();
    assert!(err.to_string().contains("container not found: ghost"));
    assert!(walk.next().is_none());
}

#[test]
fn test_container_seed_splits_levels() {
    use canopy_core::{ContainerLevel, ContainerMember};

    let store = MemoryStore::new()
        .with_container(Container::new("c1").with_organization("acme"))
        .with_container_member(ContainerMember::new(
            "c1",
            PrincipalRef::group("staff"),
            ContainerLevel::Member,
        ))
        .with_container_member(ContainerMember::new(
            "c1",
            PrincipalRef::user("boss"),
            ContainerLevel::Manager,
        ))
        .with_container_member(ContainerMember::new(
            "c1",
            PrincipalRef::user("root"),
            ContainerLevel::Admin,
        ));
    let resolver = InheritanceResolver::new(Stores::uniform(&store));

    let seed = resolver.container_seed(&ContainerId::new("c1")).unwrap();
    assert_eq!(seed.members.len(), 2);
    assert!(seed.members.contains(&PrincipalRef::org_member("acme")));
    assert!(seed.managers.contains(&PrincipalRef::user("boss")));
    assert!(seed.managers.contains(&PrincipalRef::user("root")));
    assert!(!seed.implicitly_deactivated);
}
