//! The persistent workspace: `.git-ws/info.toml` and `.git-ws/config.toml`,
//! discovery by walking parent directories, and project path resolution.

use crate::errors::{Error, StateError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const WORKSPACE_DIR: &str = ".git-ws";
pub const INFO_FILE: &str = "info.toml";
pub const CONFIG_FILE: &str = "config.toml";
pub const MANIFESTS_DIR: &str = "manifests";
pub const DEFAULT_MANIFEST_PATH: &str = crate::core::manifest::DEFAULT_MANIFEST_PATH;

/// A tracked copy or link materialized into the workspace root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceFileRef {
    #[serde(rename = "type_")]
    pub type_: FileRefKind,
    pub project_path: String,
    pub src: String,
    pub dest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileRefKind {
    Copy,
    Link,
}

/// Persistent workspace identity: which clone (if any) is the main
/// project, and the file references currently materialized.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Info {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filerefs: Vec<WorkspaceFileRef>,
}

impl Info {
    pub fn load(workspace_root: &Path) -> Result<Self, Error> {
        let path = info_path(workspace_root);
        let text = std::fs::read_to_string(&path)?;
        toml::from_str(&text).map_err(Error::from)
    }

    pub fn save(&self, workspace_root: &Path) -> Result<(), Error> {
        let path = info_path(workspace_root);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

/// Persistent workspace settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "manifest_path", default = "default_manifest_path")]
    pub manifest_path: String,
    #[serde(default = "default_true")]
    pub color_ui: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_filters: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clone_cache: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
}

fn default_manifest_path() -> String {
    DEFAULT_MANIFEST_PATH.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Config {
            manifest_path: default_manifest_path(),
            color_ui: true,
            group_filters: Vec::new(),
            clone_cache: None,
            depth: None,
        }
    }
}

impl Config {
    pub fn load(workspace_root: &Path) -> Result<Self, Error> {
        let path = config_path(workspace_root);
        let text = std::fs::read_to_string(&path)?;
        toml::from_str(&text).map_err(Error::from)
    }

    pub fn save(&self, workspace_root: &Path) -> Result<(), Error> {
        let path = config_path(workspace_root);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

pub fn workspace_dir(workspace_root: &Path) -> PathBuf {
    workspace_root.join(WORKSPACE_DIR)
}

pub fn info_path(workspace_root: &Path) -> PathBuf {
    workspace_dir(workspace_root).join(INFO_FILE)
}

pub fn config_path(workspace_root: &Path) -> PathBuf {
    workspace_dir(workspace_root).join(CONFIG_FILE)
}

pub fn frozen_manifest_path(main_path: &Path, tag: &str) -> PathBuf {
    main_path
        .join(WORKSPACE_DIR)
        .join(MANIFESTS_DIR)
        .join(format!("{tag}.toml"))
}

/// Walk from `start` up through parent directories looking for a
/// `.git-ws` directory, returning the directory that contains it.
pub fn find_workspace_root(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start.to_path_buf());
    while let Some(d) = dir {
        if workspace_dir(&d).is_dir() {
            return Some(d);
        }
        dir = d.parent().map(|p| p.to_path_buf());
    }
    None
}

/// Load the `Info`/`Config` pair for an already-initialized workspace.
pub struct Workspace {
    pub root: PathBuf,
    pub info: Info,
    pub config: Config,
}

impl Workspace {
    pub fn open(start: &Path) -> Result<Self, Error> {
        let root = find_workspace_root(start).ok_or(StateError::Uninitialized)?;
        let info = Info::load(&root)?;
        let config = Config::load(&root)?;
        Ok(Workspace { root, info, config })
    }

    pub fn main_path(&self) -> Result<PathBuf, Error> {
        let rel = self.info.main_path.as_ref().ok_or(Error::NoMain)?;
        Ok(self.root.join(rel))
    }

    /// Resolve a workspace-relative or project-relative path, refusing to
    /// leave the workspace root.
    pub fn resolve_in_workspace(&self, relative: &str) -> Result<PathBuf, Error> {
        let candidate = self.root.join(relative);
        let normalized = normalize(&candidate);
        let root_normalized = normalize(&self.root);
        if !normalized.starts_with(&root_normalized) {
            return Err(StateError::OutsideWorkspace {
                workspace: self.root.clone(),
                path: candidate,
                what: "path",
            }
            .into());
        }
        Ok(candidate)
    }

    pub fn manifest_path(&self) -> Result<PathBuf, Error> {
        let main = self.main_path()?;
        Ok(main.join(&self.config.manifest_path))
    }
}

/// Lexical normalization (no filesystem access, so this also works for
/// paths that don't exist yet): resolves `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}
