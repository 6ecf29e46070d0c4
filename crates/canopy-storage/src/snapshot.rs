//! JSON snapshots of a whole Canopy world.
//!
//! A snapshot is a single JSON document holding containers, resources,
//! memberships, the principal directory, group sizes and ACL rules. The CLI
//! loads one into a [`MemoryStore`], runs an operation, and writes it back.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use canopy_core::{
    Container, ContainerMember, Principal, Resource, ResourceId, ResourceMember, Rule,
};
use serde::{Deserialize, Serialize};

use crate::memory::{MemoryStore, Rules, World};
use crate::{Error, Result};

/// Serializable contents of a [`MemoryStore`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Containers.
    #[serde(default)]
    pub containers: Vec<Container>,
    /// Resources of every container.
    #[serde(default)]
    pub resources: Vec<Resource>,
    /// Resource memberships.
    #[serde(default)]
    pub resource_members: Vec<ResourceMember>,
    /// Container memberships.
    #[serde(default)]
    pub container_members: Vec<ContainerMember>,
    /// Principal directory.
    #[serde(default)]
    pub principals: Vec<Principal>,
    /// Member counts per backing group.
    #[serde(default)]
    pub group_sizes: BTreeMap<String, u64>,
    /// Stored ACL rules.
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl Snapshot {
    /// Read a snapshot from `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| Error::io_with_path(e, path))?;
        let snapshot: Self =
            serde_json::from_str(&content).map_err(|e| Error::parse(e, path))?;
        log::debug!(
            "Loaded snapshot {}: {} container(s), {} resource(s), {} rule(s)",
            path.display(),
            snapshot.containers.len(),
            snapshot.resources.len(),
            snapshot.rules.len()
        );
        Ok(snapshot)
    }

    /// Write the snapshot to `path` as pretty-printed JSON, creating parent
    /// directories as needed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::io_with_path(e, parent))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| Error::io_with_path(e, path))?;
        Ok(())
    }

    /// Check referential integrity.
    ///
    /// Every resource must belong to a known container and point at a known
    /// parent in the same container; every membership must point at a known
    /// resource or container.
    pub fn validate(&self) -> Result<()> {
        let containers: BTreeSet<_> = self.containers.iter().map(|c| &c.id).collect();
        let resources: BTreeMap<&ResourceId, &Resource> =
            self.resources.iter().map(|r| (&r.id, r)).collect();

        for resource in &self.resources {
            if !containers.contains(&resource.container_id) {
                return Err(canopy_core::Error::config(format!(
                    "resource {} references unknown container {}",
                    resource.id, resource.container_id
                ))
                .into());
            }
            if let Some(parent_id) = &resource.parent_id {
                let parent = resources.get(parent_id).ok_or_else(|| {
                    canopy_core::Error::config(format!(
                        "resource {} references unknown parent {}",
                        resource.id, parent_id
                    ))
                })?;
                if parent.container_id != resource.container_id {
                    return Err(canopy_core::Error::config(format!(
                        "resource {} and its parent {} belong to different containers",
                        resource.id, parent_id
                    ))
                    .into());
                }
            }
        }
        if let Some(member) = self
            .resource_members
            .iter()
            .find(|m| !resources.contains_key(&m.resource_id))
        {
            return Err(canopy_core::Error::config(format!(
                "membership of {} references unknown resource {}",
                member.principal, member.resource_id
            ))
            .into());
        }
        if let Some(member) = self
            .container_members
            .iter()
            .find(|m| !containers.contains(&m.container_id))
        {
            return Err(canopy_core::Error::config(format!(
                "membership of {} references unknown container {}",
                member.principal, member.container_id
            ))
            .into());
        }
        Ok(())
    }
}

impl MemoryStore {
    /// Build a store from a validated snapshot.
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self> {
        snapshot.validate()?;

        let world = World {
            containers: snapshot
                .containers
                .into_iter()
                .map(|c| (c.id.clone(), c))
                .collect(),
            resources: snapshot
                .resources
                .into_iter()
                .map(|r| (r.id.clone(), r))
                .collect(),
            resource_members: snapshot.resource_members,
            container_members: snapshot.container_members,
            principals: snapshot
                .principals
                .into_iter()
                .map(|p| (p.reference.clone(), p))
                .collect(),
            group_sizes: snapshot.group_sizes,
        };
        let mut rules = Rules::new();
        for rule in snapshot.rules {
            rules
                .entry(rule.target.clone())
                .or_default()
                .insert(rule.mapping.clone(), rule);
        }
        Ok(Self::from_parts(world, rules))
    }

    /// Load a snapshot file straight into a store.
    pub fn load_snapshot(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_snapshot(Snapshot::load(path)?)
    }

    /// Capture the current contents.
    pub fn to_snapshot(&self) -> Snapshot {
        let (world, rules) = self.parts();
        Snapshot {
            containers: world.containers.into_values().collect(),
            resources: world.resources.into_values().collect(),
            resource_members: world.resource_members,
            container_members: world.container_members,
            principals: world.principals.into_values().collect(),
            group_sizes: world.group_sizes,
            rules: rules
                .into_values()
                .flat_map(|rules| rules.into_values())
                .collect(),
        }
    }

    /// Write the current contents to `path`.
    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<()> {
        self.to_snapshot().save(path)
    }
}
