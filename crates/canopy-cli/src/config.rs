//! Configuration for the `canopy` binary.
//!
//! Loaded from `<config dir>/canopy/config.toml` (or an explicit `--config`
//! path). A missing default file means built-in defaults.

use std::path::PathBuf;

use canopy_acl::SafetyGate;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default safety gate threshold, in users.
pub const DEFAULT_CHANGE_THRESHOLD: u64 = 100;

/// Top-level configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanopyConfig {
    /// ACL sync settings.
    pub acl: AclConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// `[acl]` section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AclConfig {
    /// Maximum users added + removed by one edit before the gate rejects it.
    pub change_threshold: u64,
    /// Record where each grant came from.
    pub trace_origins: bool,
}

impl Default for AclConfig {
    fn default() -> Self {
        Self {
            change_threshold: DEFAULT_CHANGE_THRESHOLD,
            trace_origins: false,
        }
    }
}

/// `[logging]` section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl CanopyConfig {
    /// Name used for the config directory and in hints.
    pub const PROJECT_NAME: &'static str = "canopy";

    /// `<config dir>/canopy/config.toml`, if the platform has a config dir.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(Self::PROJECT_NAME).join("config.toml"))
    }

    /// The explicit path if given, else the default path.
    pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
        explicit
            .map(PathBuf::from)
            .or_else(Self::default_config_path)
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. A missing default file yields defaults.
    pub fn load(explicit: Option<&str>) -> Result<Self> {
        let Some(path) = Self::resolve_config_path(explicit) else {
            return Ok(Self::default());
        };
        if !path.exists() {
            if explicit.is_some() {
                return Err(Error::config(format!(
                    "Config file does not exist at {}",
                    path.display()
                )));
            }
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|e| Error::io_with_path(e, &path))?;
        toml::from_str(&content)
            .map_err(|e| Error::config(format!("Failed to parse {}: {e}", path.display())))
    }

    /// Serialize as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }

    /// Safety gate for this configuration.
    pub fn safety_gate(&self) -> SafetyGate {
        SafetyGate::with_threshold(self.acl.change_threshold)
    }
}
