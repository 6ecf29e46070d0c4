//! Permission sync orchestration and the safety gate.
//!
//! An edit on one resource recomputes the grants of the resource and its
//! whole subtree, diffs each against the rule store, gates the edited
//! resource's plan, then commits every plan in pre-order. Each resource's
//! write is atomic on its own; there is no transaction spanning resources.

use canopy_core::{ContainerId, ResourceId, Stores};
use serde::Serialize;

use crate::diff::{AclDiffEngine, RuleDiffPlan};
use crate::inheritance::{GrantWalk, InheritanceResolver, ResourceGrants};
use crate::plan::{ApplyPlan, ImpactSummary};
use crate::{Error, Result};

// ============================================================================
// SafetyGate
// ============================================================================

/// Rejects edits that would change access for too many users at once.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SafetyGate {
    threshold: Option<u64>,
}

impl SafetyGate {
    /// Gate rejecting plans whose added + removed users exceed `threshold`.
    pub fn with_threshold(threshold: u64) -> Self {
        Self {
            threshold: Some(threshold),
        }
    }

    /// Gate that lets everything through.
    pub fn disabled() -> Self {
        Self { threshold: None }
    }

    /// Configured threshold, `None` when disabled.
    pub fn threshold(&self) -> Option<u64> {
        self.threshold
    }

    /// Returns `true` if `impact` is within the threshold.
    pub fn allows(&self, impact: &ImpactSummary) -> bool {
        self.threshold
            .is_none_or(|threshold| impact.total_users() <= threshold)
    }

    /// Compute the impact of `plan` and reject it if it exceeds the
    /// threshold.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChangeTooLarge`] on rejection, or any directory
    /// error raised while counting group members.
    pub fn check(&self, plan: &ApplyPlan<'_>) -> Result<ImpactSummary> {
        let impact = plan.impact()?;
        match self.threshold {
            Some(threshold) if !self.allows(&impact) => {
                log::warn!(
                    "Safety gate rejected change on {}: {} added, {} removed (threshold {})",
                    plan.target(),
                    impact.users_added,
                    impact.users_removed,
                    threshold
                );
                Err(Error::ChangeTooLarge {
                    resource: plan.target().clone(),
                    users_added: impact.users_added,
                    users_removed: impact.users_removed,
                    threshold,
                })
            }
            _ => Ok(impact),
        }
    }
}

// ============================================================================
// Reports
// ============================================================================

/// Rule writes for one resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResourceSyncSummary {
    /// Resource the writes targeted.
    pub resource_id: ResourceId,
    /// Rules created.
    pub created: usize,
    /// Rules updated.
    pub updated: usize,
    /// Rules removed.
    pub removed: usize,
}

impl ResourceSyncSummary {
    fn of(plan: &RuleDiffPlan) -> Self {
        Self {
            resource_id: plan.target.clone(),
            created: plan.to_create.len(),
            updated: plan.to_update.len(),
            removed: plan.to_remove.len(),
        }
    }

    /// Returns `true` if nothing was written.
    pub fn is_noop(&self) -> bool {
        self.created + self.updated + self.removed == 0
    }
}

/// Outcome of a sync, or of a dry run when nothing was committed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Directly edited resource; `None` for a container resync.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edited: Option<ResourceId>,
    /// Impact of the edited resource's plan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact: Option<ImpactSummary>,
    /// Per-resource writes, in pre-order.
    pub resources: Vec<ResourceSyncSummary>,
}

impl SyncReport {
    /// Total rule writes across all resources.
    pub fn total_changes(&self) -> usize {
        self.resources
            .iter()
            .map(|r| r.created + r.updated + r.removed)
            .sum()
    }
}

// ============================================================================
// EditPlan
// ============================================================================

/// Every pending plan for one edit: the edited resource first, then its
/// subtree in pre-order.
#[derive(Debug)]
pub struct EditPlan<'a> {
    edited: ResourceId,
    plans: Vec<ApplyPlan<'a>>,
}

impl<'a> EditPlan<'a> {
    /// Directly edited resource.
    pub fn edited(&self) -> &ResourceId {
        &self.edited
    }

    /// The edited resource's plan.
    pub fn edited_plan(&self) -> Option<&ApplyPlan<'a>> {
        self.plans.first().filter(|p| p.target() == &self.edited)
    }

    /// All plans in commit order.
    pub fn plans(&self) -> &[ApplyPlan<'a>] {
        &self.plans
    }

    /// Report what committing would write, without writing.
    pub fn preview(&self) -> Result<SyncReport> {
        let impact = self.edited_plan().map(|p| p.impact()).transpose()?;
        Ok(SyncReport {
            edited: Some(self.edited.clone()),
            impact,
            resources: self
                .plans
                .iter()
                .map(|p| ResourceSyncSummary::of(p.plan()))
                .collect(),
        })
    }

    /// Gate the edited resource's plan, then commit every plan.
    ///
    /// A rejected gate aborts before any write.
    pub fn commit(self, gate: &SafetyGate) -> Result<SyncReport> {
        let impact = self.edited_plan().map(|p| gate.check(p)).transpose()?;
        let resources = commit_all(self.plans)?;
        Ok(SyncReport {
            edited: Some(self.edited),
            impact,
            resources,
        })
    }
}

/// Commit plans in order, reporting partial progress on failure.
fn commit_all(plans: Vec<ApplyPlan<'_>>) -> Result<Vec<ResourceSyncSummary>> {
    let mut committed: Vec<ResourceSyncSummary> = Vec::with_capacity(plans.len());
    for plan in plans {
        let target = plan.target().clone();
        match plan.commit() {
            Ok(applied) => committed.push(ResourceSyncSummary::of(&applied)),
            Err(err) if committed.is_empty() => return Err(err),
            Err(err) => {
                log::warn!(
                    "Sync interrupted at {} after {} committed resource(s): {}",
                    target,
                    committed.len(),
                    err
                );
                return Err(Error::CascadeInterrupted {
                    committed: committed.into_iter().map(|s| s.resource_id).collect(),
                    failed: target,
                    source: Box::new(err),
                });
            }
        }
    }
    Ok(committed)
}

// ============================================================================
// PermissionSync
// ============================================================================

/// Entry point tying the resolver, diff engine, and gate together.
#[derive(Clone, Copy, Debug)]
pub struct PermissionSync<'a> {
    stores: Stores<'a>,
    resolver: InheritanceResolver<'a>,
}

impl<'a> PermissionSync<'a> {
    /// Creates a sync over `stores`.
    pub fn new(stores: Stores<'a>) -> Self {
        Self {
            stores,
            resolver: InheritanceResolver::new(stores),
        }
    }

    /// Enables origin tracing on the underlying resolver.
    pub fn with_tracing(mut self, trace_origins: bool) -> Self {
        self.resolver = self.resolver.with_tracing(trace_origins);
        self
    }

    /// The underlying resolver.
    pub fn resolver(&self) -> &InheritanceResolver<'a> {
        &self.resolver
    }

    /// Compute the plans for an edit on `edited` without writing.
    ///
    /// Ancestors are resolved to feed the edited resource but are not
    /// re-planned. Resources below the edited one that are not
    /// folder-backed still propagate grants but get no plan; the edited
    /// resource itself must be folder-backed.
    pub fn plan_edit(&self, edited: &ResourceId) -> Result<EditPlan<'a>> {
        let walk = self.resolver.resolve_along_ancestor_path_and_subtree(edited);
        let mut reached = false;
        let mut plans = Vec::new();
        for step in walk {
            let grants = step?;
            if !reached {
                if &grants.resource.id != edited {
                    continue;
                }
                reached = true;
            } else if !grants.resource.kind.is_acl_backed() {
                log::debug!(
                    "Skipping {} resource {} in cascade",
                    grants.resource.kind.name(),
                    grants.resource.id
                );
                continue;
            }
            plans.push(self.plan_resource(&grants)?);
        }
        Ok(EditPlan {
            edited: edited.clone(),
            plans,
        })
    }

    /// Plan, gate, and commit an edit on `edited`.
    pub fn apply_edit(&self, edited: &ResourceId, gate: &SafetyGate) -> Result<SyncReport> {
        self.plan_edit(edited)?.commit(gate)
    }

    /// Compute plans for every folder-backed resource of `container`.
    pub fn plan_container(&self, container: &ContainerId) -> Result<Vec<ApplyPlan<'a>>> {
        self.plan_walk(self.resolver.resolve_entire_container(container))
    }

    /// Report what [`resync_container`](Self::resync_container) would write.
    pub fn preview_container(&self, container: &ContainerId) -> Result<SyncReport> {
        let plans = self.plan_container(container)?;
        Ok(SyncReport {
            edited: None,
            impact: None,
            resources: plans
                .iter()
                .map(|p| ResourceSyncSummary::of(p.plan()))
                .collect(),
        })
    }

    /// Reconcile every resource of `container` with no gate.
    pub fn resync_container(&self, container: &ContainerId) -> Result<SyncReport> {
        let plans = self.plan_container(container)?;
        log::info!("Resyncing {} resource(s) in {}", plans.len(), container);
        Ok(SyncReport {
            edited: None,
            impact: None,
            resources: commit_all(plans)?,
        })
    }

    fn plan_walk(&self, walk: GrantWalk<'a>) -> Result<Vec<ApplyPlan<'a>>> {
        let mut plans = Vec::new();
        for step in walk {
            let grants = step?;
            if grants.resource.kind.is_acl_backed() {
                plans.push(self.plan_resource(&grants)?);
            }
        }
        Ok(plans)
    }

    fn plan_resource(&self, grants: &ResourceGrants) -> Result<ApplyPlan<'a>> {
        let desired = grants.flatten_to_rules(self.stores.principals)?;
        let engine = AclDiffEngine::new(self.stores.rules);
        let plan = engine.compute_diff(&grants.resource.id, &desired)?;
        Ok(ApplyPlan::new(plan, engine, self.stores.principals))
    }
}
