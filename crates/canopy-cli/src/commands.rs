//! Handlers for `resolve`, `sync`, and `resync`.
//!
//! Each handler loads the world snapshot into a [`MemoryStore`], runs the
//! operation, and writes the snapshot back when rules were committed.

use std::path::Path;

use canopy_acl::{
    ContributionKind, GrantOrigin, GrantRecord, InheritanceResolver, PermissionSync, SafetyGate,
    SyncReport,
};
use canopy_core::{ContainerId, ResourceId, Rule, Stores};
use canopy_storage::MemoryStore;
use serde::Serialize;

use crate::cli::{Cli, Command};
use crate::config::CanopyConfig;
use crate::config_handlers::handle_config_command;
use crate::{Error, Result};

// ============================================================================
// Dispatch
// ============================================================================

/// Run a parsed command line.
pub fn run(cli: Cli, config: &CanopyConfig) -> Result<()> {
    let Cli {
        config: config_path,
        world,
        command,
        ..
    } = cli;

    match command {
        Command::Config { action } => handle_config_command(config_path.as_deref(), action),
        Command::Resolve {
            resource,
            subtree,
            trace,
            json,
        } => {
            let store = open_world(world.as_deref())?;
            let trace = trace || config.acl.trace_origins;
            let resolved = resolve(&store, &ResourceId::new(resource), subtree, trace)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&resolved)?);
            } else {
                resolved.iter().for_each(print_resolved);
            }
            Ok(())
        }
        Command::Sync {
            resource,
            dry_run,
            force,
            threshold,
            json,
        } => {
            let world = require_world(world.as_deref())?;
            let store = MemoryStore::load_snapshot(world)?;
            let gate = match (force, threshold) {
                (true, _) => SafetyGate::disabled(),
                (false, Some(t)) => SafetyGate::with_threshold(t),
                (false, None) => config.safety_gate(),
            };
            let options = SyncOptions { dry_run, gate };
            let report = persist_after(&store, world, dry_run, |store| {
                sync(store, &ResourceId::new(resource), &options)
            })?;
            print_report(&report, &options, json)
        }
        Command::Resync {
            container,
            dry_run,
            json,
        } => {
            let world = require_world(world.as_deref())?;
            let store = MemoryStore::load_snapshot(world)?;
            let options = SyncOptions {
                dry_run,
                gate: SafetyGate::disabled(),
            };
            let report = persist_after(&store, world, dry_run, |store| {
                resync(store, &ContainerId::new(container), dry_run)
            })?;
            print_report(&report, &options, json)
        }
    }
}

fn require_world(world: Option<&Path>) -> Result<&Path> {
    world.ok_or_else(|| Error::config("No world snapshot given (use --world or CANOPY_WORLD)"))
}

fn open_world(world: Option<&Path>) -> Result<MemoryStore> {
    let path = require_world(world)?;
    log::debug!("Loading world from {}", path.display());
    Ok(MemoryStore::load_snapshot(path)?)
}

/// Run `op`, then save the snapshot unless nothing could have been written.
///
/// An interrupted cascade still saves, so the committed prefix is kept.
fn persist_after<F>(store: &MemoryStore, world: &Path, dry_run: bool, op: F) -> Result<SyncReport>
where
    F: FnOnce(&MemoryStore) -> Result<SyncReport>,
{
    let outcome = op(store);
    if dry_run {
        return outcome;
    }
    match outcome {
        Ok(report) => {
            if report.total_changes() > 0 {
                store.save_snapshot(world)?;
                log::info!("Saved world to {}", world.display());
            }
            Ok(report)
        }
        Err(Error::Acl(err @ canopy_acl::Error::CascadeInterrupted { .. })) => {
            store.save_snapshot(world)?;
            Err(err.into())
        }
        Err(err) => Err(err),
    }
}

// ============================================================================
// Operations
// ============================================================================

/// Effective grants (and rules, for folder-backed resources) of one resource.
#[derive(Debug, Serialize)]
pub struct ResolvedResource {
    /// Resource id.
    pub resource_id: ResourceId,
    /// Resource kind name.
    pub kind: String,
    /// Whether the resource is itself active.
    pub active: bool,
    /// Effective grants, ordered by principal.
    pub grants: Vec<GrantRecord>,
    /// Flattened rules; absent for kinds without ACL backing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<Rule>>,
}

/// Resolve `resource`, and its subtree when `subtree` is set.
///
/// Principals left with no bits are listed only when tracing.
pub fn resolve(
    store: &MemoryStore,
    resource: &ResourceId,
    subtree: bool,
    trace: bool,
) -> Result<Vec<ResolvedResource>> {
    let resolver = InheritanceResolver::new(Stores::uniform(store)).with_tracing(trace);
    let walk = if subtree {
        resolver.resolve_along_ancestor_path_and_subtree(resource)
    } else {
        resolver.resolve_along_ancestor_path(resource)
    };

    let mut reached = false;
    let mut out = Vec::new();
    for step in walk {
        let step = step?;
        reached |= &step.resource.id == resource;
        if !reached {
            continue;
        }
        let rules = if step.resource.kind.is_acl_backed() {
            Some(step.flatten_to_rules(store)?)
        } else {
            None
        };
        out.push(ResolvedResource {
            resource_id: step.resource.id.clone(),
            kind: step.resource.kind.name().to_string(),
            active: step.resource.active,
            grants: if trace {
                step.grants.records().cloned().collect()
            } else {
                step.grants.effective().cloned().collect()
            },
            rules,
        });
    }
    Ok(out)
}

/// How a sync should be carried out.
#[derive(Clone, Debug)]
pub struct SyncOptions {
    /// Plan only.
    pub dry_run: bool,
    /// Gate applied to the edited resource.
    pub gate: SafetyGate,
}

/// Plan and (unless dry-running) commit an edit on `resource`.
pub fn sync(store: &MemoryStore, resource: &ResourceId, options: &SyncOptions) -> Result<SyncReport> {
    let plan = PermissionSync::new(Stores::uniform(store)).plan_edit(resource)?;
    let report = if options.dry_run {
        plan.preview()?
    } else {
        plan.commit(&options.gate)?
    };
    Ok(report)
}

/// Plan and (unless dry-running) commit a full container resync.
pub fn resync(store: &MemoryStore, container: &ContainerId, dry_run: bool) -> Result<SyncReport> {
    let sync = PermissionSync::new(Stores::uniform(store));
    let report = if dry_run {
        sync.preview_container(container)?
    } else {
        sync.resync_container(container)?
    };
    Ok(report)
}

// ============================================================================
// Output
// ============================================================================

fn print_resolved(resolved: &ResolvedResource) {
    let state = if resolved.active { "" } else { ", inactive" };
    println!("{} ({}{state})", resolved.resource_id, resolved.kind);
    if resolved.grants.is_empty() {
        println!("  no grants");
    }
    for record in &resolved.grants {
        println!("  {:<32} {}", record.principal.to_string(), record.permissions);
        for origin in record.origins.iter().flatten() {
            let from = match &origin.inherited_from {
                Some(GrantOrigin::Container(id)) => format!(" from container {id}"),
                Some(GrantOrigin::Resource(id)) => format!(" from {id}"),
                None => String::new(),
            };
            println!(
                "    {} {}{from}",
                origin.permissions,
                contribution_label(origin.kind)
            );
        }
    }
    if let Some(rules) = &resolved.rules {
        println!("  rules:");
        for rule in rules {
            println!("    {:<32} {}", rule.mapping.to_string(), rule.permissions);
        }
    }
}

fn contribution_label(kind: ContributionKind) -> &'static str {
    match kind {
        ContributionKind::ContainerMember => "container member",
        ContributionKind::ContainerManager => "container manager",
        ContributionKind::InheritedMember => "inherited member",
        ContributionKind::InheritedManager => "inherited manager",
        ContributionKind::DirectMember => "direct member",
        ContributionKind::DirectManager => "direct manager",
    }
}

fn print_report(report: &SyncReport, options: &SyncOptions, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let verb = if options.dry_run { "Would write" } else { "Wrote" };
    let scope = report
        .edited
        .as_ref()
        .map(|id| format!(" for {id}"))
        .unwrap_or_default();
    println!(
        "{verb} {} rule change(s) across {} resource(s){scope}",
        report.total_changes(),
        report.resources.len()
    );
    if let Some(impact) = &report.impact {
        println!(
            "  impact: +{} / -{} users",
            impact.users_added, impact.users_removed
        );
        if options.dry_run && !options.gate.allows(impact) {
            println!(
                "  exceeds threshold {}; commit with --force or a higher --threshold",
                options.gate.threshold().unwrap_or_default()
            );
        }
    }
    for summary in report.resources.iter().filter(|s| !s.is_noop()) {
        println!(
            "  {}: {} created, {} updated, {} removed",
            summary.resource_id, summary.created, summary.updated, summary.removed
        );
    }
    Ok(())
}
