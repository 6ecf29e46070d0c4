//! Error types for canopy-core

use crate::ids::ResourceId;

/// Result type alias for canopy-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading or writing Canopy stores.
///
/// Configuration-class variants indicate corrupted upstream data and are
/// fatal; store variants carry whatever the backend reported.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// What configuration is problematic
        message: String,
    },

    /// A resource kind that cannot be mapped onto the ACL store.
    #[error("Unsupported resource kind '{kind}' for resource {resource}")]
    UnsupportedResourceKind {
        /// Offending resource
        resource: ResourceId,
        /// Kind name as stored
        kind: String,
    },

    /// Parent links loop back on themselves.
    #[error("Cycle detected in resource hierarchy at {resource}")]
    HierarchyCycle {
        /// First resource seen twice while walking parents
        resource: ResourceId,
    },

    /// Permission bits outside the 5-bit range.
    #[error("Invalid permission bits: {0:#x}")]
    InvalidPermissions(u8),

    /// Entity lookup failed
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity ("resource", "container", ...)
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// Backend store failure
    #[error("Store error: {message}")]
    Store {
        /// Human-readable error message
        message: String,
    },
}

impl Error {
    /// Returns whether this error signals corrupted configuration data.
    ///
    /// Fatal errors will recur on every retry until the data is repaired.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Config { .. }
                | Error::UnsupportedResourceKind { .. }
                | Error::HierarchyCycle { .. }
                | Error::InvalidPermissions(_)
        )
    }

    /// Creates a new configuration error.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    /// Creates a new not-found error.
    pub fn not_found<S: Into<String>>(entity: &'static str, id: S) -> Self {
        Error::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Creates a new store error with a message.
    pub fn store<S: Into<String>>(message: S) -> Self {
        Error::Store {
            message: message.into(),
        }
    }
}
