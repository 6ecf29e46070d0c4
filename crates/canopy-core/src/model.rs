//! Resource tree, membership, and container types.
//!
//! These are read-only snapshots of data owned by external stores. Canopy
//! never mutates them; it reads them once per resolution.

use serde::{Deserialize, Serialize};

use crate::ids::{ContainerId, ResourceId};
use crate::permissions::Permissions;
use crate::principal::PrincipalRef;

// ============================================================================
// ResourceKind
// ============================================================================

/// What backs a resource in the host storage.
///
/// Only folder-backed resources map onto the ACL rule store. Other kinds may
/// appear in the tree (and still propagate grants) but cannot be flattened
/// into rules.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// A storage folder (the default).
    #[default]
    Folder,
    /// Any kind Canopy has no ACL mapping for.
    Custom(String),
}

impl ResourceKind {
    /// Returns `true` if rules for this kind live in the ACL store.
    pub fn is_acl_backed(&self) -> bool {
        matches!(self, Self::Folder)
    }

    /// Returns the kind name as a string.
    pub fn name(&self) -> &str {
        match self {
            Self::Folder => "folder",
            Self::Custom(name) => name,
        }
    }
}

// ============================================================================
// Resource
// ============================================================================

fn default_true() -> bool {
    true
}

fn default_members_permissions() -> Permissions {
    Permissions::READ | Permissions::UPDATE | Permissions::CREATE | Permissions::DELETE
}

fn default_managers_permissions() -> Permissions {
    Permissions::ALL
}

fn default_inherited_permissions() -> Permissions {
    Permissions::READ
}

/// A node in the permission hierarchy.
///
/// Resources form a forest per container: top-level resources have no
/// parent and inherit from the container itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Unique identifier; also the ACL rule target.
    pub id: ResourceId,
    /// Parent resource, `None` at the container's top level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<ResourceId>,
    /// Owning container.
    pub container_id: ContainerId,
    /// What backs this resource.
    #[serde(default)]
    pub kind: ResourceKind,
    /// Inactive resources grant nothing and cut propagation below them.
    #[serde(default = "default_true")]
    pub active: bool,
    /// Whether inbound managers keep managing this resource's children.
    #[serde(default = "default_true")]
    pub inherit_managers: bool,
    /// Granted to direct members (and container members at the top level).
    #[serde(default = "default_members_permissions")]
    pub members_permissions: Permissions,
    /// Granted to direct and inherited managers.
    #[serde(default = "default_managers_permissions")]
    pub managers_permissions: Permissions,
    /// Granted to inherited members; zero stops member propagation.
    #[serde(default = "default_inherited_permissions")]
    pub inherited_permissions: Permissions,
}

impl Resource {
    /// Creates an active top-level folder with default masks.
    pub fn folder(id: impl Into<ResourceId>, container_id: impl Into<ContainerId>) -> Self {
        Self {
            id: id.into(),
            parent_id: None,
            container_id: container_id.into(),
            kind: ResourceKind::Folder,
            active: true,
            inherit_managers: true,
            members_permissions: default_members_permissions(),
            managers_permissions: default_managers_permissions(),
            inherited_permissions: default_inherited_permissions(),
        }
    }

    /// Sets the parent resource.
    pub fn with_parent(mut self, parent_id: impl Into<ResourceId>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Sets the resource kind.
    pub fn with_kind(mut self, kind: ResourceKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the active flag.
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Sets the manager inheritance flag.
    pub fn with_inherit_managers(mut self, inherit: bool) -> Self {
        self.inherit_managers = inherit;
        self
    }

    /// Sets the three permission masks: members, managers, inherited.
    pub fn with_masks(
        mut self,
        members: Permissions,
        managers: Permissions,
        inherited: Permissions,
    ) -> Self {
        self.members_permissions = members;
        self.managers_permissions = managers;
        self.inherited_permissions = inherited;
        self
    }

    /// Returns `true` for resources directly below the container.
    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Returns `true` when inherited members keep propagating below this
    /// resource.
    pub fn propagates_members(&self) -> bool {
        !self.inherited_permissions.is_empty()
    }
}

// ============================================================================
// Membership
// ============================================================================

/// Membership level on a resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberLevel {
    /// Receives the resource's members mask.
    Member,
    /// Receives the managers mask and manages the subtree.
    Manager,
}

/// A principal's membership on a single resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMember {
    /// Resource the membership belongs to.
    pub resource_id: ResourceId,
    /// Member identity.
    pub principal: PrincipalRef,
    /// Membership level.
    pub level: MemberLevel,
}

impl ResourceMember {
    /// Creates a membership row.
    pub fn new(resource_id: impl Into<ResourceId>, principal: PrincipalRef, level: MemberLevel) -> Self {
        Self {
            resource_id: resource_id.into(),
            principal,
            level,
        }
    }
}

/// Membership level on a container.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerLevel {
    /// Seeds the inherited-member set of top-level resources.
    Member,
    /// Seeds the inherited-manager set of top-level resources.
    Manager,
    /// Same propagation as [`ContainerLevel::Manager`].
    Admin,
}

impl ContainerLevel {
    /// Returns `true` for levels that seed the manager set.
    pub fn is_managing(&self) -> bool {
        matches!(self, Self::Manager | Self::Admin)
    }
}

/// A principal's membership on a container.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerMember {
    /// Container the membership belongs to.
    pub container_id: ContainerId,
    /// Member identity.
    pub principal: PrincipalRef,
    /// Membership level.
    pub level: ContainerLevel,
}

impl ContainerMember {
    /// Creates a container membership row.
    pub fn new(
        container_id: impl Into<ContainerId>,
        principal: PrincipalRef,
        level: ContainerLevel,
    ) -> Self {
        Self {
            container_id: container_id.into(),
            principal,
            level,
        }
    }
}

// ============================================================================
// Container
// ============================================================================

/// An organizational container owning a resource forest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    /// Unique identifier.
    pub id: ContainerId,
    /// External organization whose membership group seeds every top-level
    /// resource as an extra member.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
}

impl Container {
    /// Creates a container without a bound organization.
    pub fn new(id: impl Into<ContainerId>) -> Self {
        Self {
            id: id.into(),
            organization: None,
        }
    }

    /// Binds an external organization.
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    /// The seed member representing the bound organization, if any.
    pub fn organization_principal(&self) -> Option<PrincipalRef> {
        self.organization.as_ref().map(PrincipalRef::org_member)
    }
}
