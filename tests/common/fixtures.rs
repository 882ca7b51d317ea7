//! Test fixtures for creating workspace environments.
//!
//! Provides a `WorkspaceBuilder` pattern for creating a main project (with
//! a `git-ws.toml` manifest) plus bare remotes for every declared
//! dependency, all offline via `file://` URLs.

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use super::git_helpers;

/// A test workspace with temporary directories that are cleaned up on drop.
pub struct WorkspaceFixture {
    /// Kept alive for the lifetime of the fixture.
    pub _temp: TempDir,
    /// Workspace root (parent of the main project clone).
    pub workspace_root: PathBuf,
    /// Path to the bare remotes directory.
    pub remotes_dir: PathBuf,
    /// Relative path of the main project within the workspace.
    pub main_path: String,
    /// Names of declared dependency projects.
    pub dep_names: Vec<String>,
}

impl WorkspaceFixture {
    /// Absolute path to a project within the workspace (main or dependency).
    pub fn project_path(&self, relative: &str) -> PathBuf {
        self.workspace_root.join(relative)
    }

    pub fn main_abs_path(&self) -> PathBuf {
        self.workspace_root.join(&self.main_path)
    }

    pub fn remote_path(&self, name: &str) -> PathBuf {
        self.remotes_dir.join(format!("{name}.git"))
    }

    pub fn remote_url(&self, name: &str) -> String {
        format!("file://{}", self.remote_path(name).display())
    }
}

struct DepSpec {
    name: String,
    revision: Option<String>,
    groups: Vec<String>,
    recursive: bool,
}

/// Builder for test workspaces: a main project plus declared dependencies.
pub struct WorkspaceBuilder {
    main_name: String,
    deps: Vec<DepSpec>,
}

impl WorkspaceBuilder {
    pub fn new(main_name: &str) -> Self {
        Self {
            main_name: main_name.to_string(),
            deps: Vec::new(),
        }
    }

    pub fn add_dependency(mut self, name: &str) -> Self {
        self.deps.push(DepSpec {
            name: name.to_string(),
            revision: None,
            groups: Vec::new(),
            recursive: true,
        });
        self
    }

    pub fn add_dependency_with_groups(mut self, name: &str, groups: Vec<&str>) -> Self {
        self.deps.push(DepSpec {
            name: name.to_string(),
            revision: None,
            groups: groups.into_iter().map(str::to_string).collect(),
            recursive: true,
        });
        self
    }

    pub fn add_dependency_pinned(mut self, name: &str, revision: &str) -> Self {
        self.deps.push(DepSpec {
            name: name.to_string(),
            revision: Some(revision.to_string()),
            groups: Vec::new(),
            recursive: true,
        });
        self
    }

    pub fn add_dependency_non_recursive(mut self, name: &str) -> Self {
        self.deps.push(DepSpec {
            name: name.to_string(),
            revision: None,
            groups: Vec::new(),
            recursive: false,
        });
        self
    }

    /// Build the workspace: a bare remote + staging clone for every project
    /// (main and dependencies), a manifest committed into the main project,
    /// but dependency clones left un-cloned (to be materialized by `update`).
    pub fn build(self) -> WorkspaceFixture {
        let temp = TempDir::new().expect("failed to create temp dir");
        let workspace_root = temp.path().join("workspace");
        let remotes_dir = temp.path().join("remotes");
        fs::create_dir_all(&workspace_root).unwrap();
        fs::create_dir_all(&remotes_dir).unwrap();

        for dep in &self.deps {
            create_bare_remote_with_commit(&temp, &remotes_dir, &dep.name);
        }

        let main_path = format!("{0}/{0}", self.main_name);
        let main_abs = workspace_root.join(&main_path);
        fs::create_dir_all(&main_abs).unwrap();
        git_helpers::init_repo(&main_abs);

        let manifest = render_manifest(&self.deps, &remotes_dir);
        git_helpers::commit_file(&main_abs, "git-ws.toml", &manifest, "add manifest");

        WorkspaceFixture {
            _temp: temp,
            workspace_root,
            remotes_dir,
            main_path,
            dep_names: self.deps.iter().map(|d| d.name.clone()).collect(),
        }
    }
}

fn create_bare_remote_with_commit(temp: &TempDir, remotes_dir: &PathBuf, name: &str) -> String {
    let bare_path = remotes_dir.join(format!("{name}.git"));
    git_helpers::init_bare_repo(&bare_path);

    let staging = temp.path().join(format!("staging-{name}"));
    git_helpers::init_repo(&staging);
    let sha = git_helpers::commit_file(&staging, "README.md", &format!("# {name}\n"), "initial commit");

    let remote_url = format!("file://{}", bare_path.display());
    git_helpers::add_remote(&staging, "origin", &remote_url);
    git_helpers::push_upstream(&staging, "origin", "main");
    sha
}

fn render_manifest(deps: &[DepSpec], remotes_dir: &std::path::Path) -> String {
    let mut toml = String::from("version = \"1.0\"\n\n");
    for dep in deps {
        let url = format!("file://{}", remotes_dir.join(format!("{}.git", dep.name)).display());
        toml.push_str("[[dependencies]]\n");
        toml.push_str(&format!("name = \"{}\"\n", dep.name));
        toml.push_str(&format!("url = \"{url}\"\n"));
        if let Some(rev) = &dep.revision {
            toml.push_str(&format!("revision = \"{rev}\"\n"));
        }
        if !dep.groups.is_empty() {
            let groups: Vec<String> = dep.groups.iter().map(|g| format!("\"{g}\"")).collect();
            toml.push_str(&format!("groups = [{}]\n", groups.join(", ")));
        }
        if !dep.recursive {
            toml.push_str("recursive = false\n");
        }
        toml.push('\n');
    }
    toml
}
