//! Handlers for `canopy config` subcommands.
//!
//! `path`, `get`, `set` and `init` operate on the TOML file directly, so
//! `set` preserves keys this version does not know about.

use std::path::PathBuf;

use crate::cli::ConfigAction;
use crate::config::CanopyConfig;
use crate::{Error, Result};

// ============================================================================
// Command dispatch
// ============================================================================

/// Handle a config subcommand.
pub fn handle_config_command(config_path: Option<&str>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Path => cmd_config_path(config_path),
        ConfigAction::Get { key } => cmd_config_get(config_path, &key),
        ConfigAction::Set { key, value } => cmd_config_set(config_path, &key, &value),
        ConfigAction::Init { file, force } => cmd_config_init(file.as_deref(), force),
    }
}

// ============================================================================
// Command handlers
// ============================================================================

/// Show the resolved config file path.
pub fn cmd_config_path(config_path: Option<&str>) -> Result<()> {
    let path = CanopyConfig::resolve_config_path(config_path).ok_or_else(|| {
        Error::config("Could not determine config directory for this platform")
    })?;
    println!("{}", path.display());
    if !path.exists() {
        eprintln!(
            "(file does not exist, run `{} config init` to create it)",
            CanopyConfig::PROJECT_NAME
        );
    }
    Ok(())
}

/// Print a configuration value by dotted key.
pub fn cmd_config_get(config_path: Option<&str>, key: &str) -> Result<()> {
    let value = lookup(config_path, key)?;
    println!("{}", format_toml_value(&value));
    Ok(())
}

/// Resolve a dotted key against the loaded configuration (defaults included).
pub fn lookup(config_path: Option<&str>, key: &str) -> Result<toml::Value> {
    let config = CanopyConfig::load(config_path)?;
    let value = toml::Value::try_from(&config).map_err(|e| Error::config(e.to_string()))?;
    get_nested_value(&value, key)
        .cloned()
        .ok_or_else(|| Error::config(format!("Key '{key}' not found in configuration")))
}

/// Set a configuration value by dotted key in the config file.
pub fn cmd_config_set(config_path: Option<&str>, key: &str, value: &str) -> Result<()> {
    let path = CanopyConfig::resolve_config_path(config_path)
        .ok_or_else(|| Error::config("Could not determine config directory"))?;

    if !path.exists() {
        return Err(Error::config(format!(
            "Config file does not exist at {}. Run `{} config init` first.",
            path.display(),
            CanopyConfig::PROJECT_NAME
        )));
    }
    let content = std::fs::read_to_string(&path).map_err(|e| Error::io_with_path(e, &path))?;
    let mut doc: toml::Value = toml::from_str(&content)
        .map_err(|e| Error::config(format!("Failed to parse {}: {e}", path.display())))?;

    let parsed = parse_value(value, get_nested_value(&doc, key))?;
    set_nested_value(&mut doc, key, parsed)?;

    let toml_str = toml::to_string_pretty(&doc).map_err(|e| Error::config(e.to_string()))?;
    // Reject edits that no longer deserialize (e.g. a string threshold).
    let checked: CanopyConfig = toml::from_str(&toml_str)
        .map_err(|e| Error::config(format!("Invalid value for '{key}': {e}")))?;
    log::debug!("config after set: {checked:?}");

    std::fs::write(&path, toml_str).map_err(|e| Error::io_with_path(e, &path))?;

    println!("Set {key} = {value} in {}", path.display());
    Ok(())
}

/// Create a default configuration file.
pub fn cmd_config_init(file: Option<&str>, force: bool) -> Result<()> {
    let path = match file {
        Some(p) => PathBuf::from(p),
        None => CanopyConfig::default_config_path()
            .ok_or_else(|| Error::config("Could not determine config directory"))?,
    };

    if path.exists() && !force {
        return Err(Error::config(format!(
            "Config file already exists at {}. Use --force to overwrite.",
            path.display()
        )));
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io_with_path(e, parent))?;
    }

    let toml_str = CanopyConfig::default().to_toml_string()?;
    std::fs::write(&path, &toml_str).map_err(|e| Error::io_with_path(e, &path))?;

    println!("Config file created at {}", path.display());
    Ok(())
}

// ============================================================================
// Dotted keys
// ============================================================================

/// Follow a dotted key such as `acl.change_threshold` through nested tables.
pub fn get_nested_value<'a>(value: &'a toml::Value, key: &str) -> Option<&'a toml::Value> {
    key.split('.')
        .try_fold(value, |current, part| current.as_table()?.get(part))
}

/// Store `value` under a dotted key, creating missing sections.
pub fn set_nested_value(root: &mut toml::Value, key: &str, value: toml::Value) -> Result<()> {
    let (section, field) = match key.rsplit_once('.') {
        Some((section, field)) => (Some(section), field),
        None => (None, key),
    };
    if field.is_empty() {
        return Err(Error::config(format!("Invalid key '{key}'")));
    }

    let mut table = root
        .as_table_mut()
        .ok_or_else(|| Error::config("Config root is not a table"))?;
    for part in section.into_iter().flat_map(|s| s.split('.')) {
        table = table
            .entry(part)
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()))
            .as_table_mut()
            .ok_or_else(|| Error::config(format!("'{part}' in '{key}' is not a section")))?;
    }
    table.insert(field.to_string(), value);
    Ok(())
}

/// Convert a command-line value to TOML, following the type of the value it
/// replaces. Keys with no current value accept booleans, integers or text.
pub fn parse_value(raw: &str, current: Option<&toml::Value>) -> Result<toml::Value> {
    let invalid =
        |expected: &str| Error::config(format!("Invalid value '{raw}': expected {expected}"));
    match current {
        Some(toml::Value::Integer(_)) => raw
            .parse()
            .map(toml::Value::Integer)
            .map_err(|_| invalid("an integer")),
        Some(toml::Value::Boolean(_)) => raw
            .parse()
            .map(toml::Value::Boolean)
            .map_err(|_| invalid("true or false")),
        Some(toml::Value::String(_)) => Ok(toml::Value::String(raw.to_string())),
        Some(_) => Err(invalid("a plain value, not a section")),
        None => Ok(raw
            .parse()
            .map(toml::Value::Boolean)
            .or_else(|_| raw.parse().map(toml::Value::Integer))
            .unwrap_or_else(|_| toml::Value::String(raw.to_string()))),
    }
}

/// Render a value for `config get`: text unquoted, sections as TOML.
pub fn format_toml_value(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Table(_) => toml::to_string_pretty(value).unwrap_or_else(|_| value.to_string()),
        other => other.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
