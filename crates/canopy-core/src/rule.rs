//! Absolute ACL rules as stored by the external rule store.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::ResourceId;
use crate::permissions::Permissions;

/// Namespace of an ACL mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingKind {
    /// The distinguished catch-all principal.
    Everyone,
    /// A single user.
    User,
    /// A group of users.
    Group,
}

/// The identity an ACL rule is attached to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Mapping {
    /// Mapping namespace.
    pub kind: MappingKind,
    /// Identifier within the namespace.
    pub id: String,
}

impl Mapping {
    /// ID used for the catch-all mapping.
    pub const EVERYONE_ID: &'static str = "everyone";

    /// The catch-all mapping every flattened rule set starts with.
    pub fn everyone() -> Self {
        Self {
            kind: MappingKind::Everyone,
            id: Self::EVERYONE_ID.to_string(),
        }
    }

    /// A user mapping.
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            kind: MappingKind::User,
            id: id.into(),
        }
    }

    /// A group mapping.
    pub fn group(id: impl Into<String>) -> Self {
        Self {
            kind: MappingKind::Group,
            id: id.into(),
        }
    }

    /// Returns `true` for the catch-all mapping.
    pub fn is_everyone(&self) -> bool {
        self.kind == MappingKind::Everyone
    }
}

impl fmt::Display for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            MappingKind::Everyone => "everyone",
            MappingKind::User => "user",
            MappingKind::Group => "group",
        };
        write!(f, "{kind}:{}", self.id)
    }
}

/// An ACL rule: `(mapping, target, mask, permissions)`.
///
/// Rules produced by Canopy are absolute: the mask is always
/// [`Permissions::ALL`], so the rule fully states the mapping's permissions
/// at the target instead of refining an inherited value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    /// Who the rule applies to.
    pub mapping: Mapping,
    /// Resource the rule is attached to.
    pub target: ResourceId,
    /// Which bits this rule decides.
    pub mask: Permissions,
    /// Value of the decided bits.
    pub permissions: Permissions,
}

impl Rule {
    /// An absolute rule granting exactly `permissions`.
    pub fn absolute(mapping: Mapping, target: ResourceId, permissions: Permissions) -> Self {
        Self {
            mapping,
            target,
            mask: Permissions::ALL,
            permissions,
        }
    }

    /// An absolute rule granting nothing.
    pub fn deny_all(mapping: Mapping, target: ResourceId) -> Self {
        Self::absolute(mapping, target, Permissions::NONE)
    }

    /// Returns `true` when both rules decide the same bits the same way.
    pub fn same_effect(&self, other: &Rule) -> bool {
        self.mask == other.mask && self.permissions == other.permissions
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {} = {} (mask {})",
            self.mapping, self.target, self.permissions, self.mask
        )
    }
}
