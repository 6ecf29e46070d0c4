//! Canopy CLI
//!
//! Command-line interface for permission resolution and ACL sync.

#![warn(clippy::all)]
#![forbid(unsafe_code)]

use anyhow::Result;
use canopy_cli::{CanopyConfig, Cli, Command, commands};
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // `config` subcommands must work even when the file is broken.
    let config = match &cli.command {
        Command::Config { .. } => CanopyConfig::default(),
        _ => CanopyConfig::load(cli.config.as_deref())?,
    };

    let level = if cli.verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into()))
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(threshold = config.acl.change_threshold, "configuration loaded");

    commands::run(cli, &config)?;
    Ok(())
}
