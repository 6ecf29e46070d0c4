//! Per-resource grant accumulation.
//!
//! A [`GrantAccumulator`] collects every contribution a resource receives
//! (inherited, direct, container-seeded) and OR-merges them per principal.
//! With tracing on, each record also keeps the list of contributions that
//! produced it, which is what `canopy resolve --trace` prints.

use std::collections::BTreeMap;

use canopy_core::{
    ContainerId, Error as CoreError, Mapping, Permissions, PrincipalDirectory, PrincipalRef,
    Resource, ResourceId, Rule,
};
use serde::Serialize;

use crate::Result;

// ============================================================================
// Origins
// ============================================================================

/// Where a downward-propagating grant entered the tree.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "scope", content = "id", rename_all = "snake_case")]
pub enum GrantOrigin {
    /// Seeded by a container membership (or its bound organization).
    Container(ContainerId),
    /// Granted directly on a resource.
    Resource(ResourceId),
}

/// A principal travelling down the tree, with the place it came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InheritedGrant {
    /// Inherited identity.
    pub principal: PrincipalRef,
    /// Where the grant was first given.
    pub origin: GrantOrigin,
}

/// Set of inherited principals keyed by identity.
///
/// When the same principal arrives from several places, the first origin
/// recorded is kept.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InheritedSet {
    entries: BTreeMap<PrincipalRef, GrantOrigin>,
}

impl InheritedSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a principal unless it is already present.
    pub fn insert(&mut self, principal: PrincipalRef, origin: GrantOrigin) {
        self.entries.entry(principal).or_insert(origin);
    }

    /// Adds every entry of `other` not already present.
    pub fn extend_from(&mut self, other: &InheritedSet) {
        for (principal, origin) in &other.entries {
            self.insert(principal.clone(), origin.clone());
        }
    }

    /// Returns `true` if `principal` is in the set.
    pub fn contains(&self, principal: &PrincipalRef) -> bool {
        self.entries.contains_key(principal)
    }

    /// Origin recorded for `principal`.
    pub fn origin_of(&self, principal: &PrincipalRef) -> Option<&GrantOrigin> {
        self.entries.get(principal)
    }

    /// Iterates entries in principal order.
    pub fn iter(&self) -> impl Iterator<Item = (&PrincipalRef, &GrantOrigin)> {
        self.entries.iter()
    }

    /// Owned view of the entries, for reporting.
    pub fn grants(&self) -> Vec<InheritedGrant> {
        self.entries
            .iter()
            .map(|(principal, origin)| InheritedGrant {
                principal: principal.clone(),
                origin: origin.clone(),
            })
            .collect()
    }

    /// Number of principals.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Records
// ============================================================================

/// How a contribution reached a resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionKind {
    /// Container member applied at a top-level resource's members mask.
    ContainerMember,
    /// Container manager/admin applied at a top-level resource's managers mask.
    ContainerManager,
    /// Inherited member applied at the inherited mask.
    InheritedMember,
    /// Inherited manager applied at the managers mask.
    InheritedManager,
    /// Direct member applied at the members mask.
    DirectMember,
    /// Direct manager applied at the managers mask.
    DirectManager,
}

/// One traced contribution to a [`GrantRecord`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OriginTrace {
    /// How the contribution arrived.
    pub kind: ContributionKind,
    /// Bits contributed (possibly zero).
    pub permissions: Permissions,
    /// Where an inherited contribution was first granted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inherited_from: Option<GrantOrigin>,
}

/// Effective grant of one principal at one resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GrantRecord {
    /// Grantee.
    pub principal: PrincipalRef,
    /// OR of every contribution.
    pub permissions: Permissions,
    /// Contributions, present only when tracing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origins: Option<Vec<OriginTrace>>,
}

// ============================================================================
// GrantAccumulator
// ============================================================================

/// Principal → combined permissions for a single resource.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GrantAccumulator {
    records: BTreeMap<PrincipalRef, GrantRecord>,
    tracing: bool,
}

impl GrantAccumulator {
    /// Creates an accumulator, optionally recording origins.
    pub fn new(tracing: bool) -> Self {
        Self {
            records: BTreeMap::new(),
            tracing,
        }
    }

    /// Whether origins are recorded.
    pub fn is_tracing(&self) -> bool {
        self.tracing
    }

    /// OR `permissions` into the record for `principal`.
    ///
    /// Zero contributions still create the record (and are traced), but
    /// never produce a rule.
    pub fn add_grant(
        &mut self,
        principal: &PrincipalRef,
        permissions: Permissions,
        kind: ContributionKind,
        inherited_from: Option<&GrantOrigin>,
    ) {
        let tracing = self.tracing;
        let record = self
            .records
            .entry(principal.clone())
            .or_insert_with(|| GrantRecord {
                principal: principal.clone(),
                permissions: Permissions::NONE,
                origins: tracing.then(Vec::new),
            });
        record.permissions |= permissions;
        if let Some(origins) = record.origins.as_mut() {
            origins.push(OriginTrace {
                kind,
                permissions,
                inherited_from: inherited_from.cloned(),
            });
        }
    }

    /// Combined permissions for `principal`, empty if absent.
    pub fn permissions_for(&self, principal: &PrincipalRef) -> Permissions {
        self.records
            .get(principal)
            .map(|r| r.permissions)
            .unwrap_or_default()
    }

    /// Record for `principal`.
    pub fn get(&self, principal: &PrincipalRef) -> Option<&GrantRecord> {
        self.records.get(principal)
    }

    /// Records in principal order.
    pub fn records(&self) -> impl Iterator<Item = &GrantRecord> {
        self.records.values()
    }

    /// Records with at least one bit set.
    pub fn effective(&self) -> impl Iterator<Item = &GrantRecord> {
        self.records.values().filter(|r| !r.permissions.is_empty())
    }

    /// Number of principals seen.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if no principal contributed.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Convert to the absolute rule set for `resource`.
    ///
    /// The first rule is always a deny-all for [`Mapping::everyone`]. Then one
    /// rule per ACL mapping with a nonzero grant; principals sharing a
    /// mapping are OR-merged. Principals the directory cannot resolve, or
    /// that have no mapping, are skipped.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::UnsupportedResourceKind`] for resources that
    /// are not folder-backed, and with any directory error.
    pub fn flatten_to_rules(
        &self,
        resource: &Resource,
        directory: &dyn PrincipalDirectory,
    ) -> Result<Vec<Rule>> {
        if !resource.kind.is_acl_backed() {
            return Err(CoreError::UnsupportedResourceKind {
                resource: resource.id.clone(),
                kind: resource.kind.name().to_string(),
            }
            .into());
        }

        let mut merged: BTreeMap<Mapping, Permissions> = BTreeMap::new();
        for record in self.effective() {
            let Some(principal) = directory.resolve(&record.principal)? else {
                log::debug!(
                    "Skipping unresolvable principal {} on {}",
                    record.principal,
                    resource.id
                );
                continue;
            };
            let Some(mapping) = principal.acl_mapping() else {
                log::debug!(
                    "Skipping principal {} on {}: no ACL mapping",
                    record.principal,
                    resource.id
                );
                continue;
            };
            *merged.entry(mapping).or_default() |= record.permissions;
        }

        let mut rules = Vec::with_capacity(merged.len() + 1);
        rules.push(Rule::deny_all(Mapping::everyone(), resource.id.clone()));
        rules.extend(
            merged
                .into_iter()
                .map(|(mapping, permissions)| {
                    Rule::absolute(mapping, resource.id.clone(), permissions)
                }),
        );
        Ok(rules)
    }
}
