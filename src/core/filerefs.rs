//! Workspace file-reference manager: tracks `copy` and `link` references
//! materialized from clones into the workspace root, and reconciles them
//! against a declared set on every `update`.

use crate::core::manifest::FileRef;
use crate::core::workspace::{FileRefKind, Info, WorkspaceFileRef};
use crate::errors::{Error, FileRefError, StateError};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One declared reference, scoped to the project it was declared by.
pub struct Declared {
    pub project_path: String,
    pub kind: FileRefKind,
    pub src: String,
    pub dest: String,
}

pub fn declared_from_project(project_path: &str, linkfiles: &[FileRef], copyfiles: &[FileRef]) -> Vec<Declared> {
    let mut out = Vec::new();
    for fr in linkfiles {
        out.push(Declared {
            project_path: project_path.to_string(),
            kind: FileRefKind::Link,
            src: fr.src.clone(),
            dest: fr.dest.clone(),
        });
    }
    for fr in copyfiles {
        out.push(Declared {
            project_path: project_path.to_string(),
            kind: FileRefKind::Copy,
            src: fr.src.clone(),
            dest: fr.dest.clone(),
        });
    }
    out
}

fn resolve_within(workspace_root: &Path, relative: &str, what: &'static str) -> Result<PathBuf, Error> {
    let path = workspace_root.join(relative);
    let normalized = normalize(&path);
    let root_normalized = normalize(workspace_root);
    if !normalized.starts_with(&root_normalized) {
        return Err(StateError::OutsideWorkspace {
            workspace: workspace_root.to_path_buf(),
            path,
            what,
        }
        .into());
    }
    Ok(path)
}

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

fn hash_file(path: &Path) -> std::io::Result<u64> {
    let bytes = std::fs::read(path)?;
    let digest = Sha256::digest(&bytes);
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&digest[..8]);
    Ok(u64::from_le_bytes(buf))
}

/// Verify that an existing persisted copy reference's destination still
/// matches the hash recorded at creation.
fn copy_unmodified(workspace_root: &Path, entry: &WorkspaceFileRef) -> bool {
    let dest = workspace_root.join(&entry.dest);
    match (entry.hash_, hash_file(&dest)) {
        (Some(expected), Ok(actual)) => expected == actual,
        _ => false,
    }
}

/// Verify that an existing persisted link reference's destination still
/// points at the declared source.
fn link_unmodified(workspace_root: &Path, entry: &WorkspaceFileRef) -> bool {
    let dest = workspace_root.join(&entry.dest);
    let expected_src = workspace_root.join(&entry.project_path).join(&entry.src);
    match std::fs::read_link(&dest) {
        Ok(target) => normalize(&target) == normalize(&expected_src),
        Err(_) => false,
    }
}

fn entry_unmodified(workspace_root: &Path, entry: &WorkspaceFileRef) -> bool {
    match entry.type_ {
        FileRefKind::Copy => copy_unmodified(workspace_root, entry),
        FileRefKind::Link => link_unmodified(workspace_root, entry),
    }
}

fn remove_destination(workspace_root: &Path, entry: &WorkspaceFileRef) -> std::io::Result<()> {
    let dest = workspace_root.join(&entry.dest);
    match entry.type_ {
        FileRefKind::Link => {
            if dest.is_symlink() || dest.exists() {
                std::fs::remove_file(dest)?;
            }
        }
        FileRefKind::Copy => {
            if dest.exists() {
                std::fs::remove_file(dest)?;
            }
        }
    }
    Ok(())
}

fn create_reference(workspace_root: &Path, d: &Declared) -> Result<WorkspaceFileRef, Error> {
    let src_path = resolve_within(workspace_root, &format!("{}/{}", d.project_path, d.src), "src")?;
    let dest_path = resolve_within(workspace_root, &d.dest, "dest")?;
    if let Some(parent) = dest_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let hash_ = match d.kind {
        FileRefKind::Copy => {
            std::fs::copy(&src_path, &dest_path)?;
            if let Ok(meta) = std::fs::metadata(&src_path) {
                if let Ok(mtime) = meta.modified() {
                    let _ = filetime_set(&dest_path, mtime);
                }
            }
            Some(hash_file(&dest_path)?)
        }
        FileRefKind::Link => {
            #[cfg(unix)]
            std::os::unix::fs::symlink(&src_path, &dest_path)?;
            #[cfg(not(unix))]
            std::fs::copy(&src_path, &dest_path)?;
            None
        }
    };

    Ok(WorkspaceFileRef {
        type_: d.kind,
        project_path: d.project_path.clone(),
        src: d.src.clone(),
        dest: d.dest.clone(),
        hash_,
    })
}

fn filetime_set(path: &Path, time: std::time::SystemTime) -> std::io::Result<()> {
    std::fs::File::options().write(true).open(path)?.set_modified(time)
}

/// Reconcile `info.filerefs` against `declared`: remove obsolete entries,
/// then add/refresh the declared set. Mutates `info` in place and returns
/// any `FileRefModified` violations that were skipped (not raised) because
/// `force` was false — callers typically log these and continue.
pub fn update(
    info: &mut Info,
    workspace_root: &Path,
    declared: &[Declared],
    force: bool,
) -> Result<Vec<FileRefError>, Error> {
    let mut skipped = Vec::new();

    let declared_dests: std::collections::HashSet<&str> =
        declared.iter().map(|d| d.dest.as_str()).collect();

    let mut retained = Vec::new();
    for entry in info.filerefs.drain(..) {
        if declared_dests.contains(entry.dest.as_str()) {
            retained.push(entry);
            continue;
        }
        if !force && !entry_unmodified(workspace_root, &entry) {
            skipped.push(FileRefError::FileRefModified {
                dest: PathBuf::from(&entry.dest),
            });
            retained.push(entry);
            continue;
        }
        remove_destination(workspace_root, &entry)?;
    }
    info.filerefs = retained;

    let mut by_dest: HashMap<String, usize> = HashMap::new();
    for (i, entry) in info.filerefs.iter().enumerate() {
        by_dest.insert(entry.dest.clone(), i);
    }

    let mut owners: HashMap<&str, &str> = HashMap::new();
    for entry in &info.filerefs {
        owners.insert(entry.dest.as_str(), entry.project_path.as_str());
    }

    let mut next_filerefs: Vec<WorkspaceFileRef> = Vec::new();
    let mut claimed: HashMap<String, String> = HashMap::new();

    for d in declared {
        if let Some(existing_owner) = claimed.get(&d.dest) {
            if existing_owner != &d.project_path {
                skipped.push(FileRefError::FileRefConflict {
                    dest: PathBuf::from(&d.dest),
                    existing: existing_owner.clone(),
                    incoming: d.project_path.clone(),
                });
                continue;
            }
        }

        let existing = by_dest.get(d.dest.as_str()).map(|&i| info.filerefs[i].clone());
        match existing {
            Some(entry)
                if entry.project_path == d.project_path
                    && entry.src == d.src
                    && entry.type_ == d.kind
                    && matches_unchanged(workspace_root, &entry, d) =>
            {
                next_filerefs.push(entry);
            }
            Some(entry) => {
                if !force && !entry_unmodified(workspace_root, &entry) {
                    skipped.push(FileRefError::FileRefModified {
                        dest: PathBuf::from(&entry.dest),
                    });
                    next_filerefs.push(entry);
                    continue;
                }
                remove_destination(workspace_root, &entry)?;
                let fresh = create_reference(workspace_root, d)?;
                next_filerefs.push(fresh);
            }
            None => {
                let fresh = create_reference(workspace_root, d)?;
                next_filerefs.push(fresh);
            }
        }
        claimed.insert(d.dest.clone(), d.project_path.clone());
    }

    let _ = owners;
    info.filerefs = next_filerefs;
    Ok(skipped)
}

fn matches_unchanged(workspace_root: &Path, entry: &WorkspaceFileRef, d: &Declared) -> bool {
    match d.kind {
        FileRefKind::Copy => {
            let src_path = workspace_root.join(&d.project_path).join(&d.src);
            match (entry.hash_, hash_file(&src_path)) {
                (Some(expected), Ok(actual)) => {
                    expected == actual && copy_unmodified(workspace_root, entry)
                }
                _ => false,
            }
        }
        FileRefKind::Link => link_unmodified(workspace_root, entry),
    }
}

/// Delete every entry under `workspace_root` not covered by `known_paths`
/// (project clone paths) or a live file-reference destination, skipping
/// the `.git-ws` directory. Non-empty git clones are refused unless
/// `force`.
pub fn prune(
    info: &Info,
    workspace_root: &Path,
    known_paths: &[String],
    force: bool,
    is_empty_clone: impl Fn(&Path) -> bool,
) -> Result<Vec<PathBuf>, Error> {
    let mut known_tops: std::collections::HashSet<&str> = known_paths
        .iter()
        .map(|p| p.split('/').next().unwrap_or(p.as_str()))
        .collect();
    if let Some(ref main) = info.main_path {
        known_tops.insert(main.split('/').next().unwrap_or(main.as_str()));
    }
    let known_dests: std::collections::HashSet<&str> =
        info.filerefs.iter().map(|f| f.dest.as_str()).collect();

    let mut removed = Vec::new();
    for entry in std::fs::read_dir(workspace_root)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name == crate::core::workspace::WORKSPACE_DIR {
            continue;
        }
        if known_tops.contains(name.as_ref()) || known_dests.contains(name.as_ref()) {
            continue;
        }
        let path = entry.path();
        if path.join(".git").exists() && !force && !is_empty_clone(&path) {
            continue;
        }
        if path.is_dir() {
            std::fs::remove_dir_all(&path)?;
        } else {
            std::fs::remove_file(&path)?;
        }
        removed.push(path);
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup(root: &Path) {
        std::fs::create_dir_all(root.join("dep1")).unwrap();
        std::fs::write(root.join("dep1").join("VERSION"), "1.0").unwrap();
    }

    #[test]
    fn creates_copy_reference_with_hash() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        setup(root);

        let mut info = Info::default();
        let declared = vec![Declared {
            project_path: "dep1".to_string(),
            kind: FileRefKind::Copy,
            src: "VERSION".to_string(),
            dest: "VERSION".to_string(),
        }];
        let skipped = update(&mut info, root, &declared, false).unwrap();
        assert!(skipped.is_empty());
        assert_eq!(info.filerefs.len(), 1);
        assert!(info.filerefs[0].hash_.is_some());
        assert_eq!(std::fs::read_to_string(root.join("VERSION")).unwrap(), "1.0");
    }

    #[test]
    fn creates_link_reference() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        setup(root);

        let mut info = Info::default();
        let declared = vec![Declared {
            project_path: "dep1".to_string(),
            kind: FileRefKind::Link,
            src: "VERSION".to_string(),
            dest: "VERSION".to_string(),
        }];
        update(&mut info, root, &declared, false).unwrap();
        assert!(root.join("VERSION").is_symlink());
    }

    #[test]
    fn conflicting_destinations_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        setup(root);
        std::fs::create_dir_all(root.join("dep2")).unwrap();
        std::fs::write(root.join("dep2").join("VERSION"), "2.0").unwrap();

        let mut info = Info::default();
        let declared = vec![
            Declared {
                project_path: "dep1".to_string(),
                kind: FileRefKind::Copy,
                src: "VERSION".to_string(),
                dest: "VERSION".to_string(),
            },
            Declared {
                project_path: "dep2".to_string(),
                kind: FileRefKind::Copy,
                src: "VERSION".to_string(),
                dest: "VERSION".to_string(),
            },
        ];
        let skipped = update(&mut info, root, &declared, false).unwrap();
        assert_eq!(skipped.len(), 1);
        assert!(matches!(skipped[0], FileRefError::FileRefConflict { .. }));
        assert_eq!(info.filerefs.len(), 1);
    }

    #[test]
    fn removes_obsolete_reference_on_second_update() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        setup(root);

        let mut info = Info::default();
        let declared = vec![Declared {
            project_path: "dep1".to_string(),
            kind: FileRefKind::Copy,
            src: "VERSION".to_string(),
            dest: "VERSION".to_string(),
        }];
        update(&mut info, root, &declared, false).unwrap();
        assert!(root.join("VERSION").exists());

        let skipped = update(&mut info, root, &[], false).unwrap();
        assert!(skipped.is_empty());
        assert!(info.filerefs.is_empty());
        assert!(!root.join("VERSION").exists());
    }

    #[test]
    fn user_modified_copy_blocks_removal_without_force() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        setup(root);

        let mut info = Info::default();
        let declared = vec![Declared {
            project_path: "dep1".to_string(),
            kind: FileRefKind::Copy,
            src: "VERSION".to_string(),
            dest: "VERSION".to_string(),
        }];
        update(&mut info, root, &declared, false).unwrap();

        std::fs::write(root.join("VERSION"), "user-edited").unwrap();
        let skipped = update(&mut info, root, &[], false).unwrap();
        assert_eq!(skipped.len(), 1);
        assert!(matches!(skipped[0], FileRefError::FileRefModified { .. }));
        assert!(root.join("VERSION").exists());
    }

    #[test]
    fn out_of_workspace_dest_rejected() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        setup(root);

        let mut info = Info::default();
        let declared = vec![Declared {
            project_path: "dep1".to_string(),
            kind: FileRefKind::Copy,
            src: "VERSION".to_string(),
            dest: "../outside".to_string(),
        }];
        let err = update(&mut info, root, &declared, false).unwrap_err();
        assert!(matches!(err, Error::State(StateError::OutsideWorkspace { .. })));
    }
}
