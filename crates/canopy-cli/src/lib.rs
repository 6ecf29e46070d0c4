//! # canopy-cli
//!
//! Admin CLI for Canopy.
//!
//! Operates on a JSON world snapshot (see [`canopy_storage::Snapshot`]):
//! - `resolve`: effective grants and flattened rules, optionally traced
//! - `sync`: reconcile rules after an edit, behind the change-size gate
//! - `resync`: reconcile a whole container
//! - `config`: inspect and edit `config.toml`

#![warn(missing_docs)]
#![warn(clippy::all)]
#![forbid(unsafe_code)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod config_handlers;
pub mod error;

pub use cli::{Cli, Command, ConfigAction};
pub use config::CanopyConfig;
pub use error::{Error, Result};
