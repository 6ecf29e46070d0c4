//! In-memory implementation of every Canopy store trait.
//!
//! [`MemoryStore`] keeps the resource tree, memberships, principal directory
//! and ACL rules behind `RwLock`s. Listing methods return rows ordered by
//! ID so walks over the store are deterministic.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use canopy_core::{
    AclRuleStore, Container, ContainerId, ContainerLevel, ContainerMember, ContainerStore, Error,
    Mapping, MemberLevel, MemberStore, Principal, PrincipalDirectory, PrincipalRef, Resource,
    ResourceFilter, ResourceId, ResourceMember, ResourceStore, Result, Rule,
};

// ============================================================================
// World
// ============================================================================

/// Everything except ACL rules.
#[derive(Clone, Debug, Default)]
pub(crate) struct World {
    pub(crate) containers: BTreeMap<ContainerId, Container>,
    pub(crate) resources: BTreeMap<ResourceId, Resource>,
    pub(crate) resource_members: Vec<ResourceMember>,
    pub(crate) container_members: Vec<ContainerMember>,
    pub(crate) principals: BTreeMap<PrincipalRef, Principal>,
    pub(crate) group_sizes: BTreeMap<String, u64>,
}

// ============================================================================
// RuleTable
// ============================================================================

pub(crate) type Rules = BTreeMap<ResourceId, BTreeMap<Mapping, Rule>>;

/// ACL rules keyed by `(target, mapping)`.
#[derive(Debug, Default)]
struct RuleTable {
    rules: RwLock<Rules>,
}

impl RuleTable {
    fn new(rules: Rules) -> Self {
        Self {
            rules: RwLock::new(rules),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Rules> {
        self.rules.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Rules> {
        self.rules.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn into_inner(self) -> Rules {
        self.rules.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AclRuleStore for RuleTable {
    fn rules_for(&self, target: &ResourceId) -> Result<Vec<Rule>> {
        Ok(self
            .read()
            .get(target)
            .map(|rules| rules.values().cloned().collect())
            .unwrap_or_default())
    }

    fn save(&self, rule: &Rule) -> Result<()> {
        self.write()
            .entry(rule.target.clone())
            .or_default()
            .insert(rule.mapping.clone(), rule.clone());
        Ok(())
    }

    fn delete(&self, rule: &Rule) -> Result<()> {
        let mut rules = self.write();
        if let Some(target) = rules.get_mut(&rule.target) {
            target.remove(&rule.mapping);
            if target.is_empty() {
                rules.remove(&rule.target);
            }
        }
        Ok(())
    }

    fn atomically(&self, work: &mut dyn FnMut(&dyn AclRuleStore) -> Result<()>) -> Result<()> {
        work(self)
    }
}

// ============================================================================
// MemoryStore
// ============================================================================

/// Thread-safe in-memory store.
///
/// # Example
///
/// ```rust
/// use canopy_core::{Container, Resource, ResourceId, ResourceStore};
/// use canopy_storage::MemoryStore;
///
/// let store = MemoryStore::new()
///     .with_container(Container::new("c1"))
///     .with_resource(Resource::folder("r1", "c1"));
///
/// let r1 = store.find(&ResourceId::new("r1")).unwrap();
/// assert!(r1.is_top_level());
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    world: RwLock<World>,
    rules: RuleTable,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn world(&self) -> RwLockReadGuard<'_, World> {
        self.world.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn world_mut(&self) -> RwLockWriteGuard<'_, World> {
        self.world.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------------
    // Builders
    // ------------------------------------------------------------------------

    /// Adds a container.
    pub fn with_container(self, container: Container) -> Self {
        self.upsert_container(container);
        self
    }

    /// Adds a resource.
    pub fn with_resource(self, resource: Resource) -> Self {
        self.upsert_resource(resource);
        self
    }

    /// Adds a resource membership.
    pub fn with_resource_member(self, member: ResourceMember) -> Self {
        self.add_resource_member(member);
        self
    }

    /// Adds a container membership.
    pub fn with_container_member(self, member: ContainerMember) -> Self {
        self.add_container_member(member);
        self
    }

    /// Registers a principal in the directory.
    pub fn with_principal(self, principal: Principal) -> Self {
        self.upsert_principal(principal);
        self
    }

    /// Records a group's member count.
    pub fn with_group_size(self, group: impl Into<String>, size: u64) -> Self {
        self.set_group_size(group, size);
        self
    }

    /// Seeds an ACL rule.
    pub fn with_rule(self, rule: Rule) -> Self {
        self.rules
            .write()
            .entry(rule.target.clone())
            .or_default()
            .insert(rule.mapping.clone(), rule);
        self
    }

    // ------------------------------------------------------------------------
    // Mutators
    // ------------------------------------------------------------------------

    /// Inserts or replaces a container.
    pub fn upsert_container(&self, container: Container) {
        self.world_mut()
            .containers
            .insert(container.id.clone(), container);
    }

    /// Inserts or replaces a resource.
    pub fn upsert_resource(&self, resource: Resource) {
        self.world_mut()
            .resources
            .insert(resource.id.clone(), resource);
    }

    /// Applies `edit` to a stored resource and returns the updated copy.
    pub fn update_resource(
        &self,
        id: &ResourceId,
        edit: impl FnOnce(&mut Resource),
    ) -> Result<Resource> {
        let mut world = self.world_mut();
        let resource = world
            .resources
            .get_mut(id)
            .ok_or_else(|| Error::not_found("resource", id.as_str()))?;
        edit(resource);
        Ok(resource.clone())
    }

    /// Adds a resource membership, replacing any existing row for the same
    /// resource and principal.
    pub fn add_resource_member(&self, member: ResourceMember) {
        let mut world = self.world_mut();
        world
            .resource_members
            .retain(|m| !(m.resource_id == member.resource_id && m.principal == member.principal));
        world.resource_members.push(member);
    }

    /// Removes every membership of `principal` on `resource`. Returns `true`
    /// if a row was removed.
    pub fn remove_resource_member(&self, resource: &ResourceId, principal: &PrincipalRef) -> bool {
        let mut world = self.world_mut();
        let before = world.resource_members.len();
        world
            .resource_members
            .retain(|m| !(&m.resource_id == resource && &m.principal == principal));
        world.resource_members.len() != before
    }

    /// Adds a container membership, replacing any existing row for the same
    /// container and principal.
    pub fn add_container_member(&self, member: ContainerMember) {
        let mut world = self.world_mut();
        world.container_members.retain(|m| {
            !(m.container_id == member.container_id && m.principal == member.principal)
        });
        world.container_members.push(member);
    }

    /// Inserts or replaces a principal.
    pub fn upsert_principal(&self, principal: Principal) {
        self.world_mut()
            .principals
            .insert(principal.reference.clone(), principal);
    }

    /// Sets a group's member count.
    pub fn set_group_size(&self, group: impl Into<String>, size: u64) {
        self.world_mut().group_sizes.insert(group.into(), size);
    }

    /// Every stored rule, ordered by target then mapping.
    pub fn all_rules(&self) -> Vec<Rule> {
        self.rules
            .read()
            .values()
            .flat_map(|rules| rules.values().cloned())
            .collect()
    }

    pub(crate) fn parts(&self) -> (World, Rules) {
        (self.world().clone(), self.rules.read().clone())
    }

    pub(crate) fn from_parts(world: World, rules: Rules) -> Self {
        Self {
            world: RwLock::new(world),
            rules: RuleTable::new(rules),
        }
    }
}

// ============================================================================
// Store traits
// ============================================================================

impl ResourceStore for MemoryStore {
    fn find(&self, id: &ResourceId) -> Result<Resource> {
        self.world()
            .resources
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found("resource", id.as_str()))
    }

    fn parent_of(&self, resource: &Resource) -> Result<Option<Resource>> {
        resource
            .parent_id
            .as_ref()
            .map(|parent| self.find(parent))
            .transpose()
    }

    fn children_of(
        &self,
        resource: &Resource,
        filter: Option<&ResourceFilter>,
    ) -> Result<Vec<Resource>> {
        Ok(self
            .world()
            .resources
            .values()
            .filter(|r| r.parent_id.as_ref() == Some(&resource.id))
            .filter(|r| filter.is_none_or(|f| f.matches(r)))
            .cloned()
            .collect())
    }

    fn top_level_of(&self, container: &ContainerId) -> Result<Vec<Resource>> {
        Ok(self
            .world()
            .resources
            .values()
            .filter(|r| r.is_top_level() && &r.container_id == container)
            .cloned()
            .collect())
    }
}

impl MemberStore for MemoryStore {
    fn members_of(
        &self,
        resource: &ResourceId,
        level: Option<MemberLevel>,
    ) -> Result<Vec<ResourceMember>> {
        let mut rows: Vec<ResourceMember> = self
            .world()
            .resource_members
            .iter()
            .filter(|m| &m.resource_id == resource)
            .filter(|m| level.is_none_or(|level| m.level == level))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.principal.cmp(&b.principal));
        Ok(rows)
    }
}

impl ContainerStore for MemoryStore {
    fn find_container(&self, id: &ContainerId) -> Result<Container> {
        self.world()
            .containers
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found("container", id.as_str()))
    }

    fn container_members_of(
        &self,
        container: &ContainerId,
        level: Option<ContainerLevel>,
    ) -> Result<Vec<ContainerMember>> {
        let mut rows: Vec<ContainerMember> = self
            .world()
            .container_members
            .iter()
            .filter(|m| &m.container_id == container)
            .filter(|m| level.is_none_or(|level| m.level == level))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.principal.cmp(&b.principal));
        Ok(rows)
    }
}

impl PrincipalDirectory for MemoryStore {
    fn resolve(&self, principal: &PrincipalRef) -> Result<Option<Principal>> {
        Ok(self.world().principals.get(principal).cloned())
    }

    fn group_member_count(&self, group: &str) -> Result<Option<u64>> {
        Ok(self.world().group_sizes.get(group).copied())
    }
}

impl AclRuleStore for MemoryStore {
    fn rules_for(&self, target: &ResourceId) -> Result<Vec<Rule>> {
        self.rules.rules_for(target)
    }

    fn save(&self, rule: &Rule) -> Result<()> {
        self.rules.save(rule)
    }

    fn delete(&self, rule: &Rule) -> Result<()> {
        self.rules.delete(rule)
    }

    /// Runs `work` against a staged copy of the rules and swaps it in only
    /// if `work` succeeds.
    fn atomically(&self, work: &mut dyn FnMut(&dyn AclRuleStore) -> Result<()>) -> Result<()> {
        let staged = RuleTable::new(self.rules.read().clone());
        work(&staged)?;
        *self.rules.write() = staged.into_inner();
        Ok(())
    }
}
