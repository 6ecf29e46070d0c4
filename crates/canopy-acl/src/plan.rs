//! Change-impact accounting for a pending rule diff.

use canopy_core::{Mapping, MappingKind, PrincipalDirectory, ResourceId, Rule};
use serde::Serialize;

use crate::Result;
use crate::diff::{AclDiffEngine, RuleDiffPlan};

/// How many users a plan affects.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ImpactSummary {
    /// Users that would gain access.
    pub users_added: u64,
    /// Users that would lose access.
    pub users_removed: u64,
    /// Number of rule writes.
    pub rule_changes: usize,
}

impl ImpactSummary {
    /// `users_added + users_removed`, the value the safety gate checks.
    pub fn total_users(&self) -> u64 {
        self.users_added.saturating_add(self.users_removed)
    }
}

/// A computed [`RuleDiffPlan`] awaiting commit.
///
/// Impact counts weigh each rule by the number of users behind its mapping:
/// one for a user, the group's size for a group (zero when unknown), and
/// zero for the catch-all mapping.
pub struct ApplyPlan<'a> {
    plan: RuleDiffPlan,
    engine: AclDiffEngine<'a>,
    directory: &'a dyn PrincipalDirectory,
}

impl<'a> ApplyPlan<'a> {
    /// Wraps `plan` for accounting and commit.
    pub fn new(
        plan: RuleDiffPlan,
        engine: AclDiffEngine<'a>,
        directory: &'a dyn PrincipalDirectory,
    ) -> Self {
        Self {
            plan,
            engine,
            directory,
        }
    }

    /// The underlying diff.
    pub fn plan(&self) -> &RuleDiffPlan {
        &self.plan
    }

    /// Resource the plan applies to.
    pub fn target(&self) -> &ResourceId {
        &self.plan.target
    }

    /// Users behind every created rule.
    pub fn users_gaining_access(&self) -> Result<u64> {
        self.weigh(self.plan.to_create.iter())
    }

    /// Users behind every removed rule, plus every update down to no bits.
    pub fn users_losing_access(&self) -> Result<u64> {
        let emptied = self
            .plan
            .to_update
            .iter()
            .filter(|r| r.permissions.is_empty());
        self.weigh(self.plan.to_remove.iter().chain(emptied))
    }

    /// Number of rule writes.
    pub fn rule_change_count(&self) -> usize {
        self.plan.change_count()
    }

    /// All impact figures at once.
    pub fn impact(&self) -> Result<ImpactSummary> {
        Ok(ImpactSummary {
            users_added: self.users_gaining_access()?,
            users_removed: self.users_losing_access()?,
            rule_changes: self.rule_change_count(),
        })
    }

    /// Apply the plan atomically and hand it back for reporting.
    pub fn commit(self) -> Result<RuleDiffPlan> {
        self.engine.apply_diff(&self.plan)?;
        Ok(self.plan)
    }

    /// Consume without writing.
    pub fn into_plan(self) -> RuleDiffPlan {
        self.plan
    }

    fn weigh<'r>(&self, mut rules: impl Iterator<Item = &'r Rule>) -> Result<u64> {
        rules.try_fold(0u64, |total, rule| {
            Ok(total.saturating_add(self.users_behind(&rule.mapping)?))
        })
    }

    fn users_behind(&self, mapping: &Mapping) -> Result<u64> {
        Ok(match mapping.kind {
            MappingKind::Everyone => 0,
            MappingKind::User => 1,
            MappingKind::Group => self
                .directory
                .group_member_count(&mapping.id)?
                .unwrap_or_else(|| {
                    log::debug!("Unknown group {} counted as zero users", mapping.id);
                    0
                }),
        })
    }
}

impl std::fmt::Debug for ApplyPlan<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplyPlan")
            .field("plan", &self.plan)
            .finish_non_exhaustive()
    }
}
