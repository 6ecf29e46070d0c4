//! Error types for canopy-cli

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type alias for canopy-cli operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in canopy-cli
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Error from canopy-core
    #[error("Core error: {0}")]
    Core(#[from] canopy_core::Error),

    /// Error from canopy-acl
    #[error(transparent)]
    Acl(#[from] canopy_acl::Error),

    /// Error from canopy-storage
    #[error(transparent)]
    Storage(#[from] canopy_storage::Error),

    /// Configuration or usage error
    #[error("Configuration error: {message}")]
    Config {
        /// What is wrong
        message: String,
    },

    /// I/O error on a config file
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File being read or written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Output could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Creates a new configuration error.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    /// Creates an I/O error tagged with the file path.
    pub fn io_with_path(source: std::io::Error, path: impl AsRef<Path>) -> Self {
        Error::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}
