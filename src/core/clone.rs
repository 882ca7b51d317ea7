//! Pairing of a resolved [`Project`] with the git adapter for its on-disk
//! clone, plus the path-to-clone lookup the orchestrator uses to route
//! file-path CLI arguments to the right project.

use crate::core::manifest::Project;
use crate::errors::GitError;
use crate::git::adapter::Git;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub struct Clone {
    pub project: Project,
    pub git: Git,
}

impl Clone {
    pub fn new(project: Project, workspace_root: &Path) -> Self {
        let path = workspace_root.join(&project.path);
        Clone {
            git: Git::new(path),
            project,
        }
    }

    pub fn clone_path(&self) -> &Path {
        self.git.path()
    }

    /// `revision` diverges from what's actually checked out.
    pub fn revision_diverges(&self) -> Result<bool, GitError> {
        let Some(ref want) = self.project.revision else {
            return Ok(false);
        };
        if !self.git.is_cloned() {
            return Ok(true);
        }
        let want_sha = self.git.get_sha(Some(want))?;
        let have_sha = self.git.get_sha(None)?;
        Ok(want_sha != have_sha)
    }

    /// `origin`'s URL no longer matches the manifest's resolved URL.
    pub fn origin_mismatches(&self) -> Result<bool, GitError> {
        let Some(ref want) = self.project.url else {
            return Ok(false);
        };
        if !self.git.is_cloned() {
            return Ok(false);
        }
        match self.git.get_url()? {
            Some(have) => Ok(&have != want),
            None => Ok(true),
        }
    }
}

/// Maps workspace-relative clone paths (and every ancestor of a file
/// argument) to the owning `Clone`, for resolving CLI path arguments to
/// the projects they belong to.
pub struct CloneMap {
    by_path: HashMap<PathBuf, usize>,
    clones: Vec<Clone>,
}

impl CloneMap {
    pub fn new(clones: Vec<Clone>) -> Self {
        let mut by_path = HashMap::new();
        for (i, c) in clones.iter().enumerate() {
            by_path.insert(PathBuf::from(&c.project.path), i);
        }
        CloneMap { by_path, clones }
    }

    pub fn clones(&self) -> &[Clone] {
        &self.clones
    }

    pub fn clones_mut(&mut self) -> &mut [Clone] {
        &mut self.clones
    }

    /// Find the clone owning `relative_path` (a workspace-relative path),
    /// by walking up from the path until a known clone path matches.
    pub fn owning_clone(&self, relative_path: &Path) -> Option<&Clone> {
        let mut candidate = relative_path;
        loop {
            if let Some(&idx) = self.by_path.get(candidate) {
                return Some(&self.clones[idx]);
            }
            match candidate.parent() {
                Some(p) if !p.as_os_str().is_empty() => candidate = p,
                _ => return None,
            }
        }
    }
}
