//! Permission inheritance resolver.
//!
//! Walks a container's resource forest in pre-order, handing each resource
//! the principals inherited from its parent and producing the resource's
//! [`GrantAccumulator`] plus the inherited state for its children.
//!
//! # Propagation rules
//!
//! - Inactive resources grant nothing, and every resource below them is
//!   implicitly deactivated.
//! - Inherited members continue below a resource only if its inherited mask
//!   is nonzero; otherwise the member set restarts empty.
//! - Inbound managers continue below a resource only if `inherit_managers`
//!   is set. The resource's own managers always continue.
//! - Any manager holding a nonzero grant at a resource is also handed down
//!   as an inherited member.
//! - Top-level resources receive the container's members at their members
//!   mask and the container's managers/admins at their managers mask.
//!
//! Walks are lazy iterators that read the stores as they go. Nothing is
//! cached between walks, so calling a `resolve_*` method again always
//! reflects the current state.

use std::collections::{BTreeSet, VecDeque};

use canopy_core::{
    ContainerId, ContainerStore, Error as CoreError, MemberLevel, MemberStore, Permissions,
    PrincipalDirectory, PrincipalRef, Resource, ResourceId, ResourceMember, ResourceStore, Rule,
    Stores,
};

use crate::Result;
use crate::grants::{ContributionKind, GrantAccumulator, GrantOrigin, InheritedSet};

// ============================================================================
// Inherited state
// ============================================================================

/// State handed from a parent (or the container) to a resource.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InheritedState {
    /// Principals inherited as members.
    pub members: InheritedSet,
    /// Principals inherited as managers.
    pub managers: InheritedSet,
    /// Set once any ancestor is inactive; sticky for the whole subtree.
    pub implicitly_deactivated: bool,
}

impl InheritedState {
    /// State below an inactive resource.
    pub fn deactivated() -> Self {
        Self {
            implicitly_deactivated: true,
            ..Self::default()
        }
    }
}

/// Outcome of resolving a single resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    /// Effective grants at the resource.
    pub grants: GrantAccumulator,
    /// State to hand to each child.
    pub next: InheritedState,
}

/// Resolve one resource from its configuration, direct memberships, and
/// inbound state.
///
/// This is a pure function; [`InheritanceResolver`] feeds it from the
/// stores.
pub fn resolve_resource(
    resource: &Resource,
    direct: &[ResourceMember],
    inbound: &InheritedState,
    tracing: bool,
) -> Resolution {
    let mut grants = GrantAccumulator::new(tracing);
    if !resource.active || inbound.implicitly_deactivated {
        return Resolution {
            grants,
            next: InheritedState::deactivated(),
        };
    }

    // Container seeds land on top-level resources at the members mask;
    // deeper down, inherited members get the inherited mask.
    let (member_mask, member_kind, manager_kind) = if resource.is_top_level() {
        (
            resource.members_permissions,
            ContributionKind::ContainerMember,
            ContributionKind::ContainerManager,
        )
    } else {
        (
            resource.inherited_permissions,
            ContributionKind::InheritedMember,
            ContributionKind::InheritedManager,
        )
    };

    for (principal, origin) in inbound.members.iter() {
        grants.add_grant(principal, member_mask, member_kind, Some(origin));
    }
    for (principal, origin) in inbound.managers.iter() {
        grants.add_grant(
            principal,
            resource.managers_permissions,
            manager_kind,
            Some(origin),
        );
    }

    let (direct_managers, direct_members): (Vec<&ResourceMember>, Vec<&ResourceMember>) = direct
        .iter()
        .filter(|m| m.resource_id == resource.id)
        .partition(|m| m.level == MemberLevel::Manager);

    for member in &direct_members {
        grants.add_grant(
            &member.principal,
            resource.members_permissions,
            ContributionKind::DirectMember,
            None,
        );
    }
    for manager in &direct_managers {
        grants.add_grant(
            &manager.principal,
            resource.managers_permissions,
            ContributionKind::DirectManager,
            None,
        );
    }

    let here = GrantOrigin::Resource(resource.id.clone());
    let mut next = InheritedState::default();

    if resource.propagates_members() {
        next.members.extend_from(&inbound.members);
        for member in &direct_members {
            next.members.insert(member.principal.clone(), here.clone());
        }
    }

    if resource.inherit_managers {
        next.managers.extend_from(&inbound.managers);
    }
    for manager in &direct_managers {
        next.managers.insert(manager.principal.clone(), here.clone());
    }

    // Managers with access here stay visible below as members, even when
    // management itself stops propagating.
    for (principal, origin) in inbound.managers.iter() {
        if !grants.permissions_for(principal).is_empty() {
            next.members.insert(principal.clone(), origin.clone());
        }
    }
    for manager in &direct_managers {
        if !grants.permissions_for(&manager.principal).is_empty() {
            next.members.insert(manager.principal.clone(), here.clone());
        }
    }

    Resolution { grants, next }
}

// ============================================================================
// Per-resource output
// ============================================================================

/// Effective grants for one resource, as yielded by a [`GrantWalk`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceGrants {
    /// The resource as read during the walk.
    pub resource: Resource,
    /// Its effective grants.
    pub grants: GrantAccumulator,
}

impl ResourceGrants {
    /// Combined permissions for `principal` at this resource.
    pub fn permissions_for(&self, principal: &PrincipalRef) -> Permissions {
        self.grants.permissions_for(principal)
    }

    /// Convert to absolute ACL rules; see
    /// [`GrantAccumulator::flatten_to_rules`].
    pub fn flatten_to_rules(&self, directory: &dyn PrincipalDirectory) -> Result<Vec<Rule>> {
        self.grants.flatten_to_rules(&self.resource, directory)
    }
}

// ============================================================================
// InheritanceResolver
// ============================================================================

/// Reads the stores and drives [`resolve_resource`] over the tree.
#[derive(Clone, Copy)]
pub struct InheritanceResolver<'a> {
    resources: &'a dyn ResourceStore,
    members: &'a dyn MemberStore,
    containers: &'a dyn ContainerStore,
    trace_origins: bool,
}

impl<'a> InheritanceResolver<'a> {
    /// Creates a resolver over the given stores, without origin tracing.
    pub fn new(stores: Stores<'a>) -> Self {
        Self {
            resources: stores.resources,
            members: stores.members,
            containers: stores.containers,
            trace_origins: false,
        }
    }

    /// Enables or disables origin tracing on every produced accumulator.
    pub fn with_tracing(mut self, trace_origins: bool) -> Self {
        self.trace_origins = trace_origins;
        self
    }

    /// Whether produced accumulators record origins.
    pub fn is_tracing(&self) -> bool {
        self.trace_origins
    }

    /// Walk from the container root down to `resource`, inclusive.
    pub fn resolve_along_ancestor_path(&self, resource: &ResourceId) -> GrantWalk<'a> {
        GrantWalk::new(
            *self,
            WalkStart::Path {
                target: resource.clone(),
                subtree: false,
            },
        )
    }

    /// Walk from the container root down to `resource`, then through its
    /// whole subtree.
    pub fn resolve_along_ancestor_path_and_subtree(&self, resource: &ResourceId) -> GrantWalk<'a> {
        GrantWalk::new(
            *self,
            WalkStart::Path {
                target: resource.clone(),
                subtree: true,
            },
        )
    }

    /// Walk every resource of `container`.
    pub fn resolve_entire_container(&self, container: &ContainerId) -> GrantWalk<'a> {
        GrantWalk::new(*self, WalkStart::Container(container.clone()))
    }

    /// Inherited state a container hands to its top-level resources.
    ///
    /// Members seed the member set; managers and admins seed the manager
    /// set; a bound organization adds its membership group as a member.
    pub fn container_seed(&self, container: &ContainerId) -> Result<InheritedState> {
        let found = self.containers.find_container(container)?;
        let origin = GrantOrigin::Container(found.id.clone());
        let mut seed = InheritedState::default();

        for membership in self.containers.container_members_of(container, None)? {
            if membership.level.is_managing() {
                seed.managers.insert(membership.principal, origin.clone());
            } else {
                seed.members.insert(membership.principal, origin.clone());
            }
        }
        if let Some(org) = found.organization_principal() {
            seed.members.insert(org, origin);
        }
        Ok(seed)
    }

    /// Resolve a single resource against `inbound`, reading its members.
    pub fn resolve_one(&self, resource: &Resource, inbound: &InheritedState) -> Result<Resolution> {
        let direct = if resource.active && !inbound.implicitly_deactivated {
            self.members.members_of(&resource.id, None)?
        } else {
            Vec::new()
        };
        let resolution = resolve_resource(resource, &direct, inbound, self.trace_origins);
        log::debug!(
            "Resolved {}: {} grantee(s), {} inherited member(s), {} inherited manager(s){}",
            resource.id,
            resolution.grants.effective().count(),
            resolution.next.members.len(),
            resolution.next.managers.len(),
            if resolution.next.implicitly_deactivated {
                ", propagation cut"
            } else {
                ""
            }
        );
        Ok(resolution)
    }

    /// Resources from the container's top level down to `target`, root first.
    fn ancestor_path(&self, target: &ResourceId) -> Result<Vec<Resource>> {
        let mut seen = BTreeSet::new();
        let mut path = Vec::new();
        let mut current = Some(self.resources.find(target)?);

        while let Some(resource) = current {
            if !seen.insert(resource.id.clone()) {
                return Err(CoreError::HierarchyCycle {
                    resource: resource.id,
                }
                .into());
            }
            current = self.resources.parent_of(&resource)?;
            path.push(resource);
        }
        path.reverse();
        Ok(path)
    }
}

impl std::fmt::Debug for InheritanceResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InheritanceResolver")
            .field("trace_origins", &self.trace_origins)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// GrantWalk
// ============================================================================

#[derive(Clone, Debug)]
enum WalkStart {
    Path { target: ResourceId, subtree: bool },
    Container(ContainerId),
}

/// Lazy pre-order walk yielding one [`ResourceGrants`] per resource.
///
/// Parents are always yielded before their children. The walk stops after
/// the first error.
pub struct GrantWalk<'a> {
    resolver: InheritanceResolver<'a>,
    start: Option<WalkStart>,
    path: VecDeque<Resource>,
    path_state: InheritedState,
    expand_target: bool,
    stack: Vec<(Resource, InheritedState)>,
    visited: BTreeSet<ResourceId>,
    done: bool,
}

impl<'a> GrantWalk<'a> {
    fn new(resolver: InheritanceResolver<'a>, start: WalkStart) -> Self {
        Self {
            resolver,
            start: Some(start),
            path: VecDeque::new(),
            path_state: InheritedState::default(),
            expand_target: false,
            stack: Vec::new(),
            visited: BTreeSet::new(),
            done: false,
        }
    }

    fn begin(&mut self, start: WalkStart) -> Result<()> {
        match start {
            WalkStart::Path { target, subtree } => {
                let path = self.resolver.ancestor_path(&target)?;
                if let Some(root) = path.first() {
                    self.path_state = self.resolver.container_seed(&root.container_id)?;
                }
                self.path = path.into();
                self.expand_target = subtree;
            }
            WalkStart::Container(container) => {
                let seed = self.resolver.container_seed(&container)?;
                let top_level = self.resolver.resources.top_level_of(&container)?;
                for resource in top_level.into_iter().rev() {
                    self.stack.push((resource, seed.clone()));
                }
            }
        }
        Ok(())
    }

    fn visit(&mut self, resource: &Resource) -> Result<()> {
        if self.visited.insert(resource.id.clone()) {
            Ok(())
        } else {
            Err(CoreError::HierarchyCycle {
                resource: resource.id.clone(),
            }
            .into())
        }
    }

    fn push_children(&mut self, resource: &Resource, next: &InheritedState) -> Result<()> {
        let children = self.resolver.resources.children_of(resource, None)?;
        for child in children.into_iter().rev() {
            self.stack.push((child, next.clone()));
        }
        Ok(())
    }

    fn step_path(&mut self, resource: Resource) -> Result<ResourceGrants> {
        self.visit(&resource)?;
        let Resolution { grants, next } = self.resolver.resolve_one(&resource, &self.path_state)?;
        if self.path.is_empty() && self.expand_target {
            self.push_children(&resource, &next)?;
        }
        self.path_state = next;
        Ok(ResourceGrants { resource, grants })
    }

    fn step_subtree(
        &mut self,
        resource: Resource,
        inbound: InheritedState,
    ) -> Result<ResourceGrants> {
        self.visit(&resource)?;
        let Resolution { grants, next } = self.resolver.resolve_one(&resource, &inbound)?;
        self.push_children(&resource, &next)?;
        Ok(ResourceGrants { resource, grants })
    }
}

impl Iterator for GrantWalk<'_> {
    type Item = Result<ResourceGrants>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(start) = self.start.take() {
            if let Err(err) = self.begin(start) {
                self.done = true;
                return Some(Err(err));
            }
        }

        let step = if let Some(resource) = self.path.pop_front() {
            self.step_path(resource)
        } else if let Some((resource, inbound)) = self.stack.pop() {
            self.step_subtree(resource, inbound)
        } else {
            self.done = true;
            return None;
        };

        if step.is_err() {
            self.done = true;
        }
        Some(step)
    }
}

impl std::fmt::Debug for GrantWalk<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrantWalk")
            .field("pending_path", &self.path.len())
            .field("pending_subtree", &self.stack.len())
            .field("done", &self.done)
            .finish()
    }
}
