//! Rule-set diffing against the authoritative ACL store.
//!
//! Rules are keyed by mapping identity within one target. A plan holds the
//! minimal set of writes turning the stored rules into the desired ones;
//! rules that already match are never touched.

use std::collections::{BTreeMap, BTreeSet};

use canopy_core::{AclRuleStore, Mapping, ResourceId, Rule};
use serde::Serialize;

use crate::Result;

/// Writes needed to bring one target's rules to a desired state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RuleDiffPlan {
    /// Resource the plan applies to.
    pub target: ResourceId,
    /// Desired rules whose mapping has no stored rule.
    pub to_create: Vec<Rule>,
    /// Desired rules whose stored counterpart differs in mask or bits.
    pub to_update: Vec<Rule>,
    /// Stored rules whose mapping is no longer desired.
    pub to_remove: Vec<Rule>,
}

impl RuleDiffPlan {
    /// A plan for `target` that writes nothing.
    pub fn empty(target: ResourceId) -> Self {
        Self {
            target,
            to_create: Vec::new(),
            to_update: Vec::new(),
            to_remove: Vec::new(),
        }
    }

    /// Diff `existing` against `desired` for `target`.
    ///
    /// Creates and updates follow the order of `desired`; removals follow
    /// the order of `existing`.
    pub fn between(target: ResourceId, existing: &[Rule], desired: &[Rule]) -> Self {
        let stored: BTreeMap<&Mapping, &Rule> = existing.iter().map(|r| (&r.mapping, r)).collect();
        let wanted: BTreeSet<&Mapping> = desired.iter().map(|r| &r.mapping).collect();

        let mut plan = Self::empty(target);
        for rule in desired {
            match stored.get(&rule.mapping) {
                None => plan.to_create.push(rule.clone()),
                Some(current) if !current.same_effect(rule) => plan.to_update.push(rule.clone()),
                Some(_) => {}
            }
        }
        plan.to_remove = existing
            .iter()
            .filter(|r| !wanted.contains(&r.mapping))
            .cloned()
            .collect();
        plan
    }

    /// Returns `true` if the plan writes nothing.
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty() && self.to_remove.is_empty()
    }

    /// Total number of rule writes.
    pub fn change_count(&self) -> usize {
        self.to_create.len() + self.to_update.len() + self.to_remove.len()
    }

    /// The rule set that results from applying this plan to `existing`,
    /// ordered by mapping.
    pub fn apply_to(&self, existing: &[Rule]) -> Vec<Rule> {
        let mut rules: BTreeMap<Mapping, Rule> = existing
            .iter()
            .map(|r| (r.mapping.clone(), r.clone()))
            .collect();
        for rule in &self.to_remove {
            rules.remove(&rule.mapping);
        }
        for rule in self.to_create.iter().chain(&self.to_update) {
            rules.insert(rule.mapping.clone(), rule.clone());
        }
        rules.into_values().collect()
    }
}

/// Computes and applies [`RuleDiffPlan`]s against an [`AclRuleStore`].
#[derive(Clone, Copy)]
pub struct AclDiffEngine<'a> {
    store: &'a dyn AclRuleStore,
}

impl<'a> AclDiffEngine<'a> {
    /// Creates an engine over `store`.
    pub fn new(store: &'a dyn AclRuleStore) -> Self {
        Self { store }
    }

    /// Diff `desired` against the rules currently stored for `target`.
    pub fn compute_diff(&self, target: &ResourceId, desired: &[Rule]) -> Result<RuleDiffPlan> {
        let existing = self.store.rules_for(target)?;
        Ok(RuleDiffPlan::between(target.clone(), &existing, desired))
    }

    /// Apply `plan` as one atomic unit: removals, then creations, then
    /// updates.
    pub fn apply_diff(&self, plan: &RuleDiffPlan) -> Result<()> {
        if plan.is_empty() {
            log::debug!("No rule changes for {}", plan.target);
            return Ok(());
        }

        self.store.atomically(&mut |tx: &dyn AclRuleStore| {
            for rule in &plan.to_remove {
                tx.delete(rule)?;
            }
            for rule in &plan.to_create {
                tx.save(rule)?;
            }
            for rule in &plan.to_update {
                tx.save(rule)?;
            }
            Ok(())
        })?;

        log::info!(
            "Applied ACL plan for {}: {} created, {} updated, {} removed",
            plan.target,
            plan.to_create.len(),
            plan.to_update.len(),
            plan.to_remove.len()
        );
        Ok(())
    }
}

impl std::fmt::Debug for AclDiffEngine<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AclDiffEngine").finish_non_exhaustive()
    }
}
