//! Contracts for the external stores Canopy reads from and writes to.
//!
//! The resolver only depends on these narrow traits, never on concrete
//! services, so container-level and resource-level services can each
//! implement them without depending on one another.
//!
//! All methods are synchronous: a permission change runs start to finish
//! inside one request without suspension points.

use crate::error::Result;
use crate::ids::{ContainerId, ResourceId};
use crate::model::{
    Container, ContainerLevel, ContainerMember, MemberLevel, Resource, ResourceKind,
    ResourceMember,
};
use crate::principal::{Principal, PrincipalRef};
use crate::rule::Rule;

/// Optional narrowing for [`ResourceStore::children_of`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceFilter {
    /// Only resources with this active flag.
    pub active: Option<bool>,
    /// Only resources of this kind.
    pub kind: Option<ResourceKind>,
}

impl ResourceFilter {
    /// Filter matching only active resources.
    pub fn active_only() -> Self {
        Self {
            active: Some(true),
            kind: None,
        }
    }

    /// Returns `true` if `resource` passes the filter.
    pub fn matches(&self, resource: &Resource) -> bool {
        self.active.is_none_or(|active| resource.active == active)
            && self.kind.as_ref().is_none_or(|kind| &resource.kind == kind)
    }
}

/// Read access to the resource tree.
pub trait ResourceStore {
    /// Fetch a resource by ID.
    ///
    /// Returns [`Error::NotFound`](crate::Error::NotFound) for unknown IDs.
    fn find(&self, id: &ResourceId) -> Result<Resource>;

    /// Parent of `resource`, `None` at the container's top level.
    fn parent_of(&self, resource: &Resource) -> Result<Option<Resource>>;

    /// Direct children of `resource` in a stable order.
    fn children_of(
        &self,
        resource: &Resource,
        filter: Option<&ResourceFilter>,
    ) -> Result<Vec<Resource>>;

    /// Resources directly below `container`, in a stable order.
    fn top_level_of(&self, container: &ContainerId) -> Result<Vec<Resource>>;
}

/// Read access to resource memberships.
pub trait MemberStore {
    /// Memberships on `resource`, optionally restricted to one level.
    fn members_of(
        &self,
        resource: &ResourceId,
        level: Option<MemberLevel>,
    ) -> Result<Vec<ResourceMember>>;
}

/// Read access to containers and their memberships.
pub trait ContainerStore {
    /// Fetch a container by ID.
    fn find_container(&self, id: &ContainerId) -> Result<Container>;

    /// Memberships on `container`, optionally restricted to one level.
    fn container_members_of(
        &self,
        container: &ContainerId,
        level: Option<ContainerLevel>,
    ) -> Result<Vec<ContainerMember>>;
}

/// Identity lookups.
///
/// An unknown principal is a normal outcome (`Ok(None)`): membership rows
/// routinely outlive the users and groups they reference.
pub trait PrincipalDirectory {
    /// Resolve a principal reference.
    fn resolve(&self, principal: &PrincipalRef) -> Result<Option<Principal>>;

    /// Number of users in a group, `None` if the group is unknown.
    fn group_member_count(&self, group: &str) -> Result<Option<u64>>;
}

/// Read/write access to the authoritative ACL rule store.
pub trait AclRuleStore {
    /// All rules currently attached to `target`.
    fn rules_for(&self, target: &ResourceId) -> Result<Vec<Rule>>;

    /// Insert or replace the rule for `(rule.target, rule.mapping)`.
    fn save(&self, rule: &Rule) -> Result<()>;

    /// Remove the rule for `(rule.target, rule.mapping)`.
    fn delete(&self, rule: &Rule) -> Result<()>;

    /// Run `work` as one all-or-nothing unit.
    ///
    /// If `work` returns an error, none of the writes it issued through the
    /// provided store may remain visible.
    fn atomically(&self, work: &mut dyn FnMut(&dyn AclRuleStore) -> Result<()>) -> Result<()>;
}

/// Borrowed bundle of every store a permission sync touches.
#[derive(Clone, Copy)]
pub struct Stores<'a> {
    /// Resource tree.
    pub resources: &'a dyn ResourceStore,
    /// Resource memberships.
    pub members: &'a dyn MemberStore,
    /// Containers and their memberships.
    pub containers: &'a dyn ContainerStore,
    /// Identity lookups.
    pub principals: &'a dyn PrincipalDirectory,
    /// ACL rules.
    pub rules: &'a dyn AclRuleStore,
}

impl<'a> Stores<'a> {
    /// Bundle a single backend that implements every store trait.
    pub fn uniform<B>(backend: &'a B) -> Self
    where
        B: ResourceStore + MemberStore + ContainerStore + PrincipalDirectory + AclRuleStore,
    {
        Self {
            resources: backend,
            members: backend,
            containers: backend,
            principals: backend,
            rules: backend,
        }
    }
}

impl std::fmt::Debug for Stores<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}
