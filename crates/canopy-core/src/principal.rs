//! Identity references and their mapping onto the ACL store.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::rule::Mapping;

/// Kind of identity that can receive grants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    /// An individual user account.
    User,
    /// A directory group.
    Group,
    /// A role, materialized through a backing group.
    Role,
    /// Membership of an external organization, materialized through a
    /// backing group.
    OrgMember,
}

impl PrincipalKind {
    /// Returns the kind name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Group => "group",
            Self::Role => "role",
            Self::OrgMember => "org_member",
        }
    }
}

/// Stable identity of a principal: `(kind, id)`.
///
/// Grants are keyed by this value, so two references with the same kind and
/// id always accumulate into the same record.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrincipalRef {
    /// Identity kind.
    pub kind: PrincipalKind,
    /// Identifier within the kind's namespace.
    pub id: String,
}

impl PrincipalRef {
    /// Creates a reference of the given kind.
    pub fn new(kind: PrincipalKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    /// Shorthand for a user reference.
    pub fn user(id: impl Into<String>) -> Self {
        Self::new(PrincipalKind::User, id)
    }

    /// Shorthand for a group reference.
    pub fn group(id: impl Into<String>) -> Self {
        Self::new(PrincipalKind::Group, id)
    }

    /// Shorthand for a role reference.
    pub fn role(id: impl Into<String>) -> Self {
        Self::new(PrincipalKind::Role, id)
    }

    /// Shorthand for an organization-membership reference.
    pub fn org_member(id: impl Into<String>) -> Self {
        Self::new(PrincipalKind::OrgMember, id)
    }
}

impl fmt::Display for PrincipalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.name(), self.id)
    }
}

/// A resolved principal, as returned by a
/// [`PrincipalDirectory`](crate::traits::PrincipalDirectory).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Identity this record describes.
    #[serde(flatten)]
    pub reference: PrincipalRef,
    /// Whether the identity still exists and may hold grants.
    #[serde(default = "default_valid")]
    pub valid: bool,
    /// Group that materializes this principal in the ACL store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backing_group: Option<String>,
}

fn default_valid() -> bool {
    true
}

impl Principal {
    /// Creates a valid principal without a backing group.
    pub fn new(reference: PrincipalRef) -> Self {
        Self {
            reference,
            valid: true,
            backing_group: None,
        }
    }

    /// Sets the backing group.
    pub fn with_backing_group(mut self, group: impl Into<String>) -> Self {
        self.backing_group = Some(group.into());
        self
    }

    /// Marks the principal as invalid (deleted, disabled).
    pub fn invalidated(mut self) -> Self {
        self.valid = false;
        self
    }

    /// The ACL mapping this principal resolves to, if any.
    ///
    /// Users map to themselves. Groups map to their backing group when one is
    /// set, otherwise to themselves. Roles and organization memberships only
    /// map through a backing group. Invalid principals never map.
    pub fn acl_mapping(&self) -> Option<Mapping> {
        if !self.valid {
            return None;
        }
        let id = &self.reference.id;
        match self.reference.kind {
            PrincipalKind::User => Some(Mapping::user(id.clone())),
            PrincipalKind::Group => Some(Mapping::group(
                self.backing_group.clone().unwrap_or_else(|| id.clone()),
            )),
            PrincipalKind::Role | PrincipalKind::OrgMember => {
                self.backing_group.clone().map(Mapping::group)
            }
        }
    }
}
