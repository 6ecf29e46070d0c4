//! Error types for canopy-acl

use canopy_core::ResourceId;
use thiserror::Error;

/// Result type alias for canopy-acl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving or reconciling permissions
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Error from canopy-core (store failures, configuration errors)
    #[error("Core error: {0}")]
    Core(#[from] canopy_core::Error),

    /// The safety gate rejected the edited resource's plan.
    ///
    /// Nothing was written. Callers may re-request with the gate disabled.
    #[error(
        "Change too large on {resource}: {users_added} users added, \
         {users_removed} users removed (threshold {threshold})"
    )]
    ChangeTooLarge {
        /// Directly edited resource
        resource: ResourceId,
        /// Users that would gain access
        users_added: u64,
        /// Users that would lose access
        users_removed: u64,
        /// Threshold the sum was checked against
        threshold: u64,
    },

    /// A cascade failed after some resources were already committed.
    ///
    /// Every resource in `committed` is individually consistent; `failed`
    /// and everything after it still carry their previous rules.
    #[error("Sync interrupted at {failed} after {count} committed resource(s): {source}", count = .committed.len())]
    CascadeInterrupted {
        /// Resources whose plans were applied, in order
        committed: Vec<ResourceId>,
        /// Resource whose write failed
        failed: ResourceId,
        /// Underlying failure
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Whether re-running the same operation can succeed without repairing data.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Core(e) => !e.is_fatal(),
            Error::ChangeTooLarge { .. } => true,
            Error::CascadeInterrupted { source, .. } => source.is_recoverable(),
        }
    }

    /// Impact counts `(users_added, users_removed)` carried by a gate rejection.
    pub fn change_counts(&self) -> Option<(u64, u64)> {
        match self {
            Error::ChangeTooLarge {
                users_added,
                users_removed,
                ..
            } => Some((*users_added, *users_removed)),
            _ => None,
        }
    }
}
