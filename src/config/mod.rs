//! Layered application configuration: `system < user < workspace <
//! environment`, each layer an optional TOML file, read through the same
//! five keys the workspace's own `.git-ws/config.toml` persists
//! ([`crate::core::workspace::Config`]).
//!
//! This is the *ambient* configuration path consulted before a workspace
//! exists (e.g. to pick a default `clone_cache` for `init`/`clone`) and to
//! let an operator override persisted workspace settings without editing
//! the workspace's own file.

use crate::core::workspace::Config as WorkspaceConfig;
use crate::errors::{Error, StateError};
use std::path::{Path, PathBuf};

const ENV_SYSTEM_DIR: &str = "GIT_WS_CONFIG_SYSTEM_DIR";
const ENV_USER_DIR: &str = "GIT_WS_CONFIG_USER_DIR";
const ENV_WORKSPACE_DIR: &str = "GIT_WS_CONFIG_WORKSPACE_DIR";
const ENV_NO_LOAD: &str = "GIT_WS_ENV_NO_LOAD";
const ENV_OPTION_PREFIX: &str = "GIT_WS_";

/// One optional layer: a directory that may contain `config.toml`.
fn layer_path(dir: Option<PathBuf>) -> Option<PathBuf> {
    dir.map(|d| d.join("config.toml"))
}

fn system_dir() -> Option<PathBuf> {
    std::env::var(ENV_SYSTEM_DIR)
        .ok()
        .map(PathBuf::from)
        .or_else(|| Some(PathBuf::from("/etc/git-ws")))
}

fn user_dir() -> Option<PathBuf> {
    std::env::var(ENV_USER_DIR)
        .ok()
        .map(PathBuf::from)
        .or_else(|| dirs_next_config_home().map(|d| d.join("git-ws")))
}

/// `$XDG_CONFIG_HOME` or `~/.config`, the platform-conventional location
/// this tool's own search falls back to absent an explicit override.
fn dirs_next_config_home() -> Option<PathBuf> {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg.is_empty() {
            return Some(PathBuf::from(xdg));
        }
    }
    std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config"))
}

/// Read one optional TOML layer as a partial overlay. A missing file is
/// not an error; an unparseable one is `InvalidConfigurationFile`.
fn load_layer(path: &Path) -> Result<Option<toml::Value>, Error> {
    if !path.is_file() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&text).map_err(|e| StateError::InvalidConfigurationFile {
        path: path.to_path_buf(),
        details: e.to_string(),
    })?;
    Ok(Some(value))
}

/// Merge `overlay`'s top-level keys into `base`, overlay winning.
fn merge_table(base: &mut toml::value::Table, overlay: toml::value::Table) {
    for (k, v) in overlay {
        base.insert(k, v);
    }
}

const KNOWN_OPTIONS: &[&str] = &["manifest_path", "color_ui", "group_filters", "clone_cache", "depth"];

fn env_option_overrides() -> Result<toml::value::Table, Error> {
    let mut table = toml::value::Table::new();
    if std::env::var(ENV_NO_LOAD).is_ok() {
        return Ok(table);
    }
    for (key, raw) in std::env::vars() {
        let Some(option) = key.strip_prefix(ENV_OPTION_PREFIX) else {
            continue;
        };
        let option = option.to_lowercase();
        if !KNOWN_OPTIONS.contains(&option.as_str()) {
            continue;
        }
        let value = parse_env_value(&option, &raw).map_err(|details| StateError::InvalidConfigurationValue {
            option: option.clone(),
            details,
        })?;
        table.insert(option, value);
    }
    Ok(table)
}

fn parse_env_value(option: &str, raw: &str) -> Result<toml::Value, String> {
    match option {
        "color_ui" => raw
            .parse::<bool>()
            .map(toml::Value::Boolean)
            .map_err(|e| e.to_string()),
        "depth" => raw
            .parse::<i64>()
            .map(toml::Value::Integer)
            .map_err(|e| e.to_string()),
        "group_filters" => Ok(toml::Value::Array(
            raw.split(',')
                .filter(|s| !s.is_empty())
                .map(|s| toml::Value::String(s.to_string()))
                .collect(),
        )),
        _ => Ok(toml::Value::String(raw.to_string())),
    }
}

/// Load the layered configuration, searching `system < user < workspace`
/// directories (skipping any layer whose file is absent) and finally
/// applying any recognized `GIT_WS_<OPTION>` environment override.
///
/// `workspace_root` is the directory an already-open or about-to-be-opened
/// workspace lives in; pass `None` when no workspace context exists yet
/// (e.g. before `init`).
pub fn load(workspace_root: Option<&Path>) -> Result<WorkspaceConfig, Error> {
    let mut merged = toml::value::Table::new();

    for dir in [system_dir(), user_dir()] {
        if let Some(path) = layer_path(dir) {
            if let Some(toml::Value::Table(t)) = load_layer(&path)? {
                merge_table(&mut merged, t);
            }
        }
    }

    let workspace_layer_dir = std::env::var(ENV_WORKSPACE_DIR)
        .ok()
        .map(PathBuf::from)
        .or_else(|| workspace_root.map(|r| crate::core::workspace::workspace_dir(r)));
    if let Some(path) = layer_path(workspace_layer_dir) {
        if let Some(toml::Value::Table(t)) = load_layer(&path)? {
            merge_table(&mut merged, t);
        }
    }

    merge_table(&mut merged, env_option_overrides()?);

    let default = WorkspaceConfig::default();
    let value = toml::Value::Table(merged);
    let config: WorkspaceConfig = value.try_into().unwrap_or(default);
    Ok(config)
}
