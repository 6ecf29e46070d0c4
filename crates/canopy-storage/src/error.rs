//! Error types for canopy-storage

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type alias for canopy-storage operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in canopy-storage
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Error from canopy-core
    #[error("Core error: {0}")]
    Core(#[from] canopy_core::Error),

    /// I/O error on a snapshot file
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File being read or written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Snapshot file could not be parsed
    #[error("Invalid snapshot {path}: {source}")]
    Parse {
        /// Offending file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// Snapshot could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create an I/O error tagged with the file path.
    pub fn io_with_path(source: std::io::Error, path: impl AsRef<Path>) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create a parse error tagged with the file path.
    pub fn parse(source: serde_json::Error, path: impl AsRef<Path>) -> Self {
        Self::Parse {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}
