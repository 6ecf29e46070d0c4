//! # canopy-acl
//!
//! Permission inheritance and ACL reconciliation for Canopy.
//!
//! This crate turns a container's resource tree and memberships into
//! absolute ACL rules and keeps the rule store in sync with them:
//! - Inheritance resolution down the resource tree
//! - Per-resource grant accumulation with optional origin tracing
//! - Minimal rule diffs against the stored rules
//! - Change-impact accounting and the safety gate
//! - Cascading sync of an edited resource and its subtree
//!
//! # Example
//!
//! ```rust,ignore
//! use canopy_acl::{PermissionSync, SafetyGate};
//! use canopy_core::{ResourceId, Stores};
//!
//! let sync = PermissionSync::new(Stores::uniform(&store));
//! let report = sync.apply_edit(&ResourceId::new("r1"), &SafetyGate::with_threshold(100))?;
//! println!("{} rule writes", report.total_changes());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![forbid(unsafe_code)]

pub mod diff;
pub mod enforcement;
pub mod error;
pub mod grants;
pub mod inheritance;
pub mod plan;

pub use diff::{AclDiffEngine, RuleDiffPlan};
pub use enforcement::{EditPlan, PermissionSync, ResourceSyncSummary, SafetyGate, SyncReport};
pub use error::{Error, Result};
pub use grants::{
    ContributionKind, GrantAccumulator, GrantOrigin, GrantRecord, InheritedGrant, InheritedSet,
    OriginTrace,
};
pub use inheritance::{
    GrantWalk, InheritanceResolver, InheritedState, Resolution, ResourceGrants, resolve_resource,
};
pub use plan::{ApplyPlan, ImpactSummary};
