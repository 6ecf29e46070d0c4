//! Command-line interface definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Resolve inherited permissions and reconcile ACL rules
#[derive(Parser, Debug)]
#[command(name = "canopy", author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "CANOPY_CONFIG")]
    pub config: Option<String>,

    /// World snapshot (JSON) to operate on
    #[arg(short, long, global = true, env = "CANOPY_WORLD")]
    pub world: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG still wins)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show effective grants and flattened rules for a resource
    Resolve {
        /// Resource id
        resource: String,

        /// Also resolve every descendant
        #[arg(long)]
        subtree: bool,

        /// Record and print where each grant came from
        #[arg(long)]
        trace: bool,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Reconcile ACL rules after an edit to a resource and its subtree
    Sync {
        /// Edited resource id
        resource: String,

        /// Compute and print the plan without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Skip the change-size safety gate
        #[arg(long, conflicts_with = "threshold")]
        force: bool,

        /// Override the configured gate threshold (users)
        #[arg(long)]
        threshold: Option<u64>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Reconcile every resource of a container (no safety gate)
    Resync {
        /// Container id
        container: String,

        /// Compute and print the plan without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Configuration management
    Config {
        /// Config subcommand
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// `canopy config` subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the resolved config file path
    Path,

    /// Get a value by dotted key (e.g. `acl.change_threshold`)
    Get {
        /// Dotted key
        key: String,
    },

    /// Set a value by dotted key in the config file
    Set {
        /// Dotted key
        key: String,
        /// New value
        value: String,
    },

    /// Write a default config file
    Init {
        /// Destination (defaults to the platform config dir)
        #[arg(long)]
        file: Option<String>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
