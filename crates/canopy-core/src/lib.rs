//! Canopy Core: shared types, store traits, errors.
//!
//! This crate provides the foundational types used across all Canopy crates.
//! It has no internal Canopy dependencies (dependency level 0).
//!
//! # Modules
//!
//! - [`error`]: Error types and Result alias
//! - [`ids`]: Resource and container identifiers
//! - [`permissions`]: The 5-bit permission bitmap
//! - [`principal`]: Identity references and their ACL mappings
//! - [`model`]: Resource tree, members, and containers
//! - [`rule`]: Absolute ACL rules
//! - [`traits`]: Read/write contracts for external stores

#![doc = include_str!("../README.md")]

pub mod error;
pub mod ids;
pub mod model;
pub mod permissions;
pub mod principal;
pub mod rule;
pub mod traits;

// Re-export key types at crate root for convenience
pub use error::{Error, Result};
pub use ids::{ContainerId, ResourceId};
pub use model::{
    Container, ContainerLevel, ContainerMember, MemberLevel, Resource, ResourceKind,
    ResourceMember,
};
pub use permissions::Permissions;
pub use principal::{Principal, PrincipalKind, PrincipalRef};
pub use rule::{Mapping, MappingKind, Rule};
pub use traits::{
    AclRuleStore, ContainerStore, MemberStore, PrincipalDirectory, ResourceFilter, ResourceStore,
    Stores,
};
