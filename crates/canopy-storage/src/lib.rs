//! # canopy-storage
//!
//! Store backends for Canopy.
//!
//! This crate provides:
//! - [`MemoryStore`]: an in-memory implementation of every store trait in
//!   `canopy-core`, with atomic rule batches
//! - [`Snapshot`]: a JSON document that loads into and saves from a
//!   `MemoryStore`

#![warn(missing_docs)]
#![warn(clippy::all)]
#![forbid(unsafe_code)]

pub mod error;
pub mod memory;
pub mod snapshot;

pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use snapshot::Snapshot;
