//! The top-level façade: composes the manifest model, iterators, git
//! adapter, and workspace file-reference manager into the operations a
//! CLI front-end drives (SPEC_FULL §4.7).

use crate::core::clone::{Clone, CloneMap};
use crate::core::filerefs::{self, Declared};
use crate::core::iterators::{self, IterOptions, OriginResolver};
use crate::core::manifest::{ManifestSpec, Project, ProjectSpec};
use crate::core::manifestformat::CodecRegistry;
use crate::core::workspace::{Config, Info, Workspace};
use crate::errors::{Error, GitError, StateError};
use crate::git::adapter::Git;
use std::path::{Path, PathBuf};

pub struct Orchestrator {
    pub workspace: Workspace,
    pub registry: CodecRegistry,
}

struct ClonedResolver;

impl OriginResolver for ClonedResolver {
    fn origin_url(&self, clone_path: &Path) -> Option<String> {
        Git::new(clone_path).get_url().ok().flatten()
    }
    fn is_cloned(&self, clone_path: &Path) -> bool {
        Git::new(clone_path).is_cloned()
    }
}

pub struct InitOptions<'a> {
    pub main_path: Option<&'a str>,
    pub manifest_path: Option<&'a str>,
    pub group_filters: Vec<String>,
    pub depth: Option<u32>,
    pub force: bool,
}

impl Orchestrator {
    /// `init(path, main_path?, manifest_path?, group_filters?, depth?, force?)`.
    pub fn init(root: &Path, opts: InitOptions) -> Result<Self, Error> {
        let ws_dir = crate::core::workspace::workspace_dir(root);
        if !opts.force && ws_dir.is_dir() {
            return Err(StateError::Initialized {
                path: root.to_path_buf(),
            }
            .into());
        }

        let main_path = match opts.main_path {
            Some(p) => Some(p.to_string()),
            None => detect_main_clone(root),
        };

        if !opts.force {
            let entries: Vec<PathBuf> = std::fs::read_dir(root)
                .map(|rd| rd.filter_map(|e| e.ok()).map(|e| e.path()).collect())
                .unwrap_or_default();
            let allowed_main = main_path.as_ref().map(|m| root.join(m));
            let extra: Vec<PathBuf> = entries
                .into_iter()
                .filter(|p| Some(p) != allowed_main.as_ref())
                .collect();
            if !extra.is_empty() {
                return Err(StateError::WorkspaceNotEmpty {
                    path: root.to_path_buf(),
                    items: extra,
                }
                .into());
            }
        }

        let info = Info {
            main_path: main_path.clone(),
            filerefs: Vec::new(),
        };
        info.save(root)?;

        let layered = crate::config::load(Some(root))?;
        let config = Config {
            manifest_path: opts
                .manifest_path
                .map(str::to_string)
                .unwrap_or_else(|| "git-ws.toml".to_string()),
            color_ui: true,
            group_filters: opts.group_filters,
            clone_cache: layered.clone_cache,
            depth: opts.depth.or(layered.depth),
        };
        config.save(root)?;

        Ok(Orchestrator {
            workspace: Workspace {
                root: root.to_path_buf(),
                info,
                config,
            },
            registry: CodecRegistry::default(),
        })
    }

    pub fn open(start: &Path) -> Result<Self, Error> {
        let mut workspace = Workspace::open(start)?;
        workspace.config = crate::config::load(Some(&workspace.root))?;
        Ok(Orchestrator {
            workspace,
            registry: CodecRegistry::default(),
        })
    }

    /// `clone(url, ...)`: default `main_path = repo_name/repo_name`.
    pub fn clone_new(root: &Path, url: &str, revision: Option<&str>, opts: InitOptions) -> Result<Self, Error> {
        let repo_name = repo_name_from_url(url);
        let main_rel = opts
            .main_path
            .map(str::to_string)
            .unwrap_or_else(|| format!("{repo_name}/{repo_name}"));
        let main_path = root.join(&main_rel);

        if main_path.exists() && !opts.force {
            let has_entries = std::fs::read_dir(&main_path)
                .map(|mut rd| rd.next().is_some())
                .unwrap_or(false);
            if has_entries {
                return Err(Error::NotEmpty { path: main_path });
            }
        }
        if let Some(parent) = main_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let git = Git::new(&main_path);
        let cache_dir = crate::config::load(Some(root))?.clone_cache;
        clone_with_cache(&git, url, revision, opts.depth, cache_dir.as_deref())?;

        Self::init(
            root,
            InitOptions {
                main_path: Some(&main_rel),
                manifest_path: opts.manifest_path,
                group_filters: opts.group_filters,
                depth: opts.depth,
                force: true,
            },
        )
    }

    pub fn deinit(&self) -> Result<(), Error> {
        let dir = crate::core::workspace::workspace_dir(&self.workspace.root);
        if dir.is_dir() {
            std::fs::remove_dir_all(dir)?;
        }
        Ok(())
    }

    fn manifest_spec_for(&self, manifest_path: &Path) -> Result<ManifestSpec, Error> {
        let codec = self.registry.for_path(manifest_path)?;
        Ok(codec.load(manifest_path)?)
    }

    fn main_project(&self) -> Result<Option<Project>, Error> {
        Ok(self
            .workspace
            .info
            .main_path
            .as_ref()
            .map(|p| Project::main(&main_name(p), p)))
    }

    /// Resolve the effective manifest path for a clone, honoring the
    /// manifest-finder: when `clone`'s HEAD is detached on a tag `T` and
    /// `clone/.git-ws/manifests/T.toml` exists, route there instead.
    pub fn effective_manifest_path(&self, clone_path: &Path, declared_manifest_path: &Path) -> PathBuf {
        let git = Git::new(clone_path);
        let detached = matches!(git.get_branch(), Ok(None));
        if detached {
            if let Ok(Some(tag)) = git.get_tag() {
                let frozen = crate::core::workspace::frozen_manifest_path(clone_path, &tag);
                if frozen.is_file() {
                    return frozen;
                }
            }
        }
        declared_manifest_path.to_path_buf()
    }

    fn root_manifest_path(&self) -> Result<PathBuf, Error> {
        let main = self.workspace.main_path()?;
        let declared = main.join(&self.workspace.config.manifest_path);
        Ok(self.effective_manifest_path(&main, &declared))
    }

    pub fn all_projects(&self, resolve_url: bool) -> Result<Vec<Project>, Error> {
        let root_manifest = self.root_manifest_path()?;
        let main = self.main_project()?;
        let resolver = ClonedResolver;
        let opts = IterOptions {
            resolve_url,
            skip_main: false,
            extra_group_filters: &self.workspace.config.group_filters,
        };
        iterators::project_iter(
            &root_manifest,
            main.as_ref(),
            &self.workspace.root,
            &self.registry,
            &resolver,
            &opts,
        )
    }

    fn clone_map(&self, resolve_url: bool) -> Result<CloneMap, Error> {
        let projects = self.all_projects(resolve_url)?;
        let clones: Vec<Clone> = projects
            .into_iter()
            .filter(|p| !p.is_main)
            .map(|p| Clone::new(p, &self.workspace.root))
            .collect();
        Ok(CloneMap::new(clones))
    }

    /// `update(project_paths?, skip_main?, prune?, rebase?, force?)`.
    pub fn update(
        &mut self,
        project_paths: Option<&[String]>,
        prune: bool,
        rebase: bool,
        force: bool,
    ) -> Result<(), Error> {
        let map = self.clone_map(true)?;
        let depth = self.workspace.config.depth;

        for clone in map.clones() {
            if let Some(paths) = project_paths {
                if !paths.iter().any(|p| p == &clone.project.path) {
                    continue;
                }
            }
            if let Err(err) = self.update_one(clone, depth, rebase, force) {
                propagate_if_structural(err, &clone.project.path)?;
            }
        }

        self.reconcile_filerefs(force)?;

        if prune {
            self.prune(force)?;
        }
        Ok(())
    }

    fn update_one(&self, clone: &Clone, depth: Option<u32>, rebase: bool, _force: bool) -> Result<(), Error> {
        let git = &clone.git;
        let project = &clone.project;

        if !git.is_cloned() {
            let url = project.url.as_deref().ok_or_else(|| GitError::GitCloneMissing {
                path: git.path().to_path_buf(),
            })?;
            clone_with_cache(git, url, project.revision.as_deref(), depth, self.workspace.config.clone_cache.as_deref())?;
            if project.submodules {
                git.update_submodules()?;
            }
            return Ok(());
        }

        let current_sha = git.get_sha(None)?;
        let current_tag = git.get_tag()?;
        let current_branch = git.get_branch()?;

        if let Some(ref want) = project.revision {
            let already = current_tag.as_deref() == Some(want.as_str()) || current_sha == *want;
            if already && current_branch.is_none() {
                return Ok(());
            }
        }

        if git.get_shallow() {
            let rev = project.revision.as_deref().unwrap_or("HEAD");
            git.fetch(Some(depth.unwrap_or(1)), false)?;
            let fetch_head = git.get_sha(Some("FETCH_HEAD")).or_else(|_| git.get_sha(Some(rev)))?;
            git.checkout(Some(&fetch_head), None, None, true)?;
            return Ok(());
        }

        git.fetch(None, false)?;
        if let Some(ref want) = project.revision {
            if current_sha != *want {
                git.checkout(Some(want), None, None, false)?;
            }
        }
        if let Some(ref branch) = current_branch {
            if git.get_upstream_branch()?.is_some() {
                let upstream_ref = format!("origin/{branch}");
                if rebase {
                    git.rebase()?;
                } else {
                    git.merge(&upstream_ref)?;
                }
            }
        }
        Ok(())
    }

    fn reconcile_filerefs(&mut self, force: bool) -> Result<(), Error> {
        let projects = self.all_projects(false)?;
        let mut declared = Vec::new();
        for p in &projects {
            declared.extend(filerefs::declared_from_project(&p.path, &p.linkfiles, &p.copyfiles));
        }
        let skipped = filerefs::update(&mut self.workspace.info, &self.workspace.root, &declared, force)?;
        for s in skipped {
            tracing::warn!(error = %s, "file reference skipped");
        }
        self.workspace.info.save(&self.workspace.root)
    }

    pub fn prune(&self, force: bool) -> Result<Vec<PathBuf>, Error> {
        let projects = self.all_projects(false)?;
        let known_paths: Vec<String> = projects.iter().filter(|p| !p.is_main).map(|p| p.path.clone()).collect();
        filerefs::prune(&self.workspace.info, &self.workspace.root, &known_paths, force, |path| {
            Git::new(path).is_empty().unwrap_or(false)
        })
    }

    pub fn status_all(&self) -> Result<Vec<(String, Vec<crate::git::adapter::StatusEntry>)>, Error> {
        let map = self.clone_map(false)?;
        let mut out = Vec::new();
        for clone in map.clones() {
            if !clone.git.is_cloned() {
                continue;
            }
            match clone.git.status(None) {
                Ok(entries) => out.push((clone.project.path.clone(), entries)),
                Err(err) => propagate_if_structural(err.into(), &clone.project.path)?,
            }
        }
        Ok(out)
    }

    pub fn checkout(&self, revision: &str, project_paths: Option<&[String]>) -> Result<(), Error> {
        let map = self.clone_map(false)?;
        for clone in map.clones() {
            if let Some(paths) = project_paths {
                if !paths.iter().any(|p| p == &clone.project.path) {
                    continue;
                }
            }
            if let Err(err) = clone.git.checkout(Some(revision), None, None, false) {
                propagate_if_structural(err.into(), &clone.project.path)?;
            }
        }
        Ok(())
    }

    pub fn add(&self, project_path: &str, paths: Option<&[String]>, force: bool, all: bool) -> Result<(), Error> {
        let map = self.clone_map(false)?;
        let clone = map
            .owning_clone(Path::new(project_path))
            .ok_or_else(|| GitError::GitCloneMissing {
                path: self.workspace.root.join(project_path),
            })?;
        clone.git.add(paths, force, all)?;
        Ok(())
    }

    pub fn rm(&self, project_path: &str, paths: &[String], cached: bool, force: bool, recursive: bool) -> Result<(), Error> {
        let map = self.clone_map(false)?;
        let clone = map
            .owning_clone(Path::new(project_path))
            .ok_or_else(|| GitError::GitCloneMissing {
                path: self.workspace.root.join(project_path),
            })?;
        clone.git.rm(paths, cached, force, recursive)?;
        Ok(())
    }

    pub fn reset(&self, project_path: &str, paths: &[String]) -> Result<(), Error> {
        let map = self.clone_map(false)?;
        let clone = map
            .owning_clone(Path::new(project_path))
            .ok_or_else(|| GitError::GitCloneMissing {
                path: self.workspace.root.join(project_path),
            })?;
        clone.git.reset(paths)?;
        Ok(())
    }

    pub fn commit(&self, project_path: &str, message: &str, paths: Option<&[String]>, all: bool) -> Result<(), Error> {
        let map = self.clone_map(false)?;
        let clone = map
            .owning_clone(Path::new(project_path))
            .ok_or_else(|| GitError::GitCloneMissing {
                path: self.workspace.root.join(project_path),
            })?;
        clone.git.commit(message, paths, all)?;
        Ok(())
    }

    pub fn diff(&self, project_path: Option<&str>, paths: Option<&[String]>) -> Result<Vec<(String, String)>, Error> {
        let map = self.clone_map(false)?;
        let mut out = Vec::new();
        for clone in map.clones() {
            if let Some(p) = project_path {
                if clone.project.path != p {
                    continue;
                }
            }
            if !clone.git.is_cloned() {
                continue;
            }
            out.extend(clone.git.diffstat(paths)?);
        }
        Ok(out)
    }

    pub fn foreach<F>(&self, mut op: F) -> Result<(), Error>
    where
        F: FnMut(&Clone) -> Result<(), Error>,
    {
        let map = self.clone_map(false)?;
        for clone in map.clones() {
            if clone.git.is_cloned() {
                op(clone)?;
            }
        }
        Ok(())
    }

    /// `get_manifest_spec(freeze, resolve)`: the live root spec, optionally
    /// with every transitively reached project's revision pinned to its
    /// clone's current SHA.
    pub fn get_manifest_spec(&self, freeze: bool) -> Result<ManifestSpec, Error> {
        let root_manifest = self.root_manifest_path()?;
        let mut spec = self.manifest_spec_for(&root_manifest)?;
        if !freeze {
            return Ok(spec);
        }

        let projects = self.all_projects(true)?;
        let mut frozen_deps = Vec::new();
        for p in projects.iter().filter(|p| !p.is_main) {
            let clone = Clone::new(p.clone(), &self.workspace.root);
            let sha = if clone.git.is_cloned() {
                clone.git.get_sha(None)?
            } else {
                p.revision.clone().unwrap_or_default()
            };
            frozen_deps.push(ProjectSpec {
                name: p.name.clone(),
                remote: None,
                sub_url: None,
                url: p.url.clone(),
                revision: Some(sha),
                path: Some(p.path.clone()),
                manifest_path: p.manifest_path.clone(),
                groups: p.groups.clone(),
                with_groups: p.with_groups.clone(),
                submodules: Some(p.submodules),
                linkfiles: p.linkfiles.clone(),
                copyfiles: p.copyfiles.clone(),
                recursive: p.recursive,
            });
        }
        spec.dependencies = frozen_deps;
        Ok(spec)
    }

    /// `tag(name, msg?, force?)`.
    pub fn tag(&self, name: &str, message: Option<&str>, force: bool) -> Result<(), Error> {
        let main_path = self.workspace.main_path()?;
        let main_git = Git::new(&main_path);

        if !force && main_git.get_tags(Some(name))?.contains(&name.to_string()) {
            return Err(GitError::GitTagExists { name: name.to_string() }.into());
        }

        let frozen = self.get_manifest_spec(true)?;
        let frozen_path = crate::core::workspace::frozen_manifest_path(&main_path, name);
        let codec = self.registry.for_path(&frozen_path)?;
        codec.save(&frozen, &frozen_path, false)?;

        let rel = frozen_path.strip_prefix(&main_path).unwrap_or(&frozen_path);
        let rel_str = rel.to_string_lossy().into_owned();
        main_git.add(Some(&[rel_str]), false, false)?;
        main_git.commit(&format!("freeze manifest for {name}"), None, false)?;
        main_git.tag(name, message, force)?;
        Ok(())
    }

    /// Sync discovered `origin` URLs back into the manifest that declared
    /// them (SPEC_FULL §4.7 "dependency update").
    pub fn dependency_update(&self) -> Result<(), Error> {
        let root_manifest = self.root_manifest_path()?;
        self.dependency_update_one(&root_manifest)
    }

    fn dependency_update_one(&self, manifest_path: &Path) -> Result<(), Error> {
        let codec = self.registry.for_path(manifest_path)?;
        let mut spec = codec.load(manifest_path)?;
        let manifest_dir = manifest_path.parent().unwrap_or(Path::new("."));
        let mut changed = false;

        for dep in &mut spec.dependencies {
            let clone_path = manifest_dir
                .parent()
                .map(|p| p.join(&dep.name))
                .unwrap_or_else(|| PathBuf::from(&dep.name));
            let clone_path = if let Some(ref p) = dep.path {
                manifest_dir.parent().map(|d| d.join(p)).unwrap_or(clone_path)
            } else {
                clone_path
            };
            let git = Git::new(&clone_path);
            if !git.is_cloned() {
                continue;
            }
            if let Some(discovered) = git.get_url()? {
                if dep.url.as_deref() != Some(discovered.as_str()) {
                    dep.url = Some(discovered);
                    dep.remote = None;
                    dep.sub_url = None;
                    changed = true;
                }
            }

            if dep.recursive {
                let sub_manifest = clone_path.join(&dep.manifest_path);
                if sub_manifest.is_file() {
                    self.dependency_update_one(&sub_manifest)?;
                }
            }
        }

        if changed {
            codec.save(&spec, manifest_path, true)?;
        }
        Ok(())
    }
}

/// Clone `url` into `git`'s path, routing through the configured clone
/// cache (SPEC_FULL §4.3) when `cache_dir` is set. Falls back to checking
/// out `revision` directly if it isn't a branch the cache could resolve
/// (e.g. a pinned SHA from a frozen manifest).
fn clone_with_cache(
    git: &Git,
    url: &str,
    revision: Option<&str>,
    depth: Option<u32>,
    cache_dir: Option<&Path>,
) -> Result<(), Error> {
    let Some(dir) = cache_dir else {
        return Ok(git.clone(url, revision, depth)?);
    };

    crate::git::clonecache::clone_via_cache(dir, url, git.path(), revision)?;

    if let Some(rev) = revision {
        let at_revision = git.get_sha(None)? == rev || git.get_branch()?.as_deref() == Some(rev);
        if !at_revision {
            git.checkout(Some(rev), None, None, true)?;
        }
    }
    Ok(())
}

/// Per-clone errors during iteration-driven operations are logged and the
/// run continues; only structural problems (a required clone missing, or
/// missing its origin) abort the whole operation.
fn propagate_if_structural(err: Error, project_path: &str) -> Result<(), Error> {
    match err {
        Error::Git(GitError::GitCloneMissing { .. }) | Error::Git(GitError::GitCloneMissingOrigin { .. }) => Err(err),
        other => {
            tracing::warn!(project = project_path, error = %other, "clone operation failed, continuing");
            Ok(())
        }
    }
}

fn detect_main_clone(root: &Path) -> Option<String> {
    let output = std::process::Command::new("git")
        .current_dir(root)
        .args(["rev-parse", "--show-cdup"])
        .output()
        .ok()?;
    if output.status.success() {
        Some(".".to_string())
    } else {
        None
    }
}

fn repo_name_from_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    let last = trimmed.rsplit('/').next().unwrap_or(trimmed);
    last.strip_suffix(".git").unwrap_or(last).to_string()
}

fn main_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}
