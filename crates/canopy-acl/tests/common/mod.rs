//! Common fixtures for canopy-acl integration tests.

use std::collections::BTreeMap;

use canopy_core::{
    AclRuleStore, Container, ContainerLevel, ContainerMember, MemberLevel, Permissions, Principal,
    PrincipalRef, Resource, ResourceId, ResourceMember, Result, Rule, Stores,
};
use canopy_storage::MemoryStore;

/// READ | UPDATE
pub const RU: Permissions = Permissions::READ.union(Permissions::UPDATE);

/// Container `c1` with member group `staff`; top-level `r1`
/// (members=RU, managers=0, inherited=READ) and child `r2` with direct
/// member `staff-sub` (members=READ, inherited=READ).
pub fn scenario_a() -> MemoryStore {
    MemoryStore::new()
        .with_container(Container::new("c1"))
        .with_container_member(ContainerMember::new(
            "c1",
            PrincipalRef::group("staff"),
            ContainerLevel::Member,
        ))
        .with_resource(Resource::folder("r1", "c1").with_masks(
            RU,
            Permissions::NONE,
            Permissions::READ,
        ))
        .with_resource(Resource::folder("r2", "c1").with_parent("r1").with_masks(
            Permissions::READ,
            Permissions::ALL,
            Permissions::READ,
        ))
        .with_resource_member(ResourceMember::new(
            "r2",
            PrincipalRef::group("staff-sub"),
            MemberLevel::Member,
        ))
        .with_principal(Principal::new(PrincipalRef::group("staff")))
        .with_principal(Principal::new(PrincipalRef::group("staff-sub")))
        .with_group_size("staff", 5000)
        .with_group_size("staff-sub", 20)
}

/// Chain `r1 -> r2 -> r3` in container `c1`, with direct user members
/// `u1`, `u2`, `u3` on the respective resources.
pub fn chain() -> MemoryStore {
    let mut store = MemoryStore::new().with_container(Container::new("c1"));
    for (i, parent) in [(1, None), (2, Some("r1")), (3, Some("r2"))] {
        let id = format!("r{i}");
        let user = format!("u{i}");
        let mut resource = Resource::folder(id.as_str(), "c1");
        if let Some(parent) = parent {
            resource = resource.with_parent(parent);
        }
        store = store
            .with_resource(resource)
            .with_resource_member(ResourceMember::new(
                id.as_str(),
                PrincipalRef::user(user.as_str()),
                MemberLevel::Member,
            ))
            .with_principal(Principal::new(PrincipalRef::user(user)));
    }
    store
}

/// Stored rules for `target` as `mapping -> bits`.
pub fn rule_bits(store: &MemoryStore, target: &str) -> BTreeMap<String, u8> {
    store
        .rules_for(&ResourceId::new(target))
        .unwrap_or_default()
        .into_iter()
        .map(|r| (r.mapping.to_string(), r.permissions.bits()))
        .collect()
}

/// Expected `mapping -> bits` map from literal pairs.
pub fn bits(pairs: &[(&str, u8)]) -> BTreeMap<String, u8> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

/// The stored rule set of a resource that grants nothing.
pub fn denied() -> BTreeMap<String, u8> {
    bits(&[("everyone:everyone", 0)])
}

/// Rule store wrapper whose writes to one target always fail.
pub struct FailOn<'a> {
    inner: &'a dyn AclRuleStore,
    target: ResourceId,
}

impl<'a> FailOn<'a> {
    /// Wraps `inner`, failing every write to `target`.
    pub fn new(inner: &'a dyn AclRuleStore, target: &str) -> Self {
        Self {
            inner,
            target: ResourceId::new(target),
        }
    }

    fn guard(&self, rule: &Rule) -> Result<()> {
        if rule.target == self.target {
            Err(canopy_core::Error::store(format!(
                "injected failure on {}",
                self.target
            )))
        } else {
            Ok(())
        }
    }
}

impl AclRuleStore for FailOn<'_> {
    fn rules_for(&self, target: &ResourceId) -> Result<Vec<Rule>> {
        self.inner.rules_for(target)
    }

    fn save(&self, rule: &Rule) -> Result<()> {
        self.guard(rule)?;
        self.inner.save(rule)
    }

    fn delete(&self, rule: &Rule) -> Result<()> {
        self.guard(rule)?;
        self.inner.delete(rule)
    }

    fn atomically(&self, work: &mut dyn FnMut(&dyn AclRuleStore) -> Result<()>) -> Result<()> {
        let target = self.target.clone();
        self.inner.atomically(&mut |tx: &dyn AclRuleStore| {
            work(&FailOn {
                inner: tx,
                target: target.clone(),
            })
        })
    }
}

/// Stores backed by `store`, with rule writes routed through `rules`.
pub fn stores_with_rules<'a>(store: &'a MemoryStore, rules: &'a dyn AclRuleStore) -> Stores<'a> {
    Stores {
        rules,
        ..Stores::uniform(store)
    }
}
