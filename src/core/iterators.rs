//! Breadth-first, path-deduplicated traversal of the dependency graph:
//! `ManifestIter`, `ProjectIter`, `ProjectLevelIter`.
//!
//! All three share one underlying walk (`walk`) and differ only in what
//! they yield. Duplicate semantics are first-match-wins: a dependency
//! whose resolved `path` is already in the done-set is dropped entirely,
//! with no attempt to merge its revision/groups into the earlier entry.

use crate::core::groupfilter::{self, GroupSelect};
use crate::core::manifest::{Manifest, ManifestSpec, Project};
use crate::core::manifestformat::CodecRegistry;
use crate::errors::{Error, ManifestError};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

/// Resolves the origin URL of an on-disk clone; used for `resolve_url`.
/// Abstracted so iterators don't depend directly on the git adapter.
pub trait OriginResolver {
    fn origin_url(&self, clone_path: &Path) -> Option<String>;
    fn is_cloned(&self, clone_path: &Path) -> bool;
}

pub struct IterOptions<'a> {
    pub resolve_url: bool,
    pub skip_main: bool,
    pub extra_group_filters: &'a [String],
}

impl Default for IterOptions<'_> {
    fn default() -> Self {
        Self {
            resolve_url: false,
            skip_main: false,
            extra_group_filters: &[],
        }
    }
}

struct WalkItem {
    project: Project,
    clone_path: PathBuf,
}

/// Walk context: one entry per BFS frontier item still to expand.
struct Frontier {
    manifest_spec: ManifestSpec,
    refurl: Option<String>,
    filters: Vec<GroupSelect>,
    default: bool,
    level: u32,
}

/// Run the shared BFS walk, invoking `on_yield` for every selected project
/// (main project first, if not skipped) and returning accumulated errors
/// that were logged but didn't abort (structural errors still propagate).
pub fn walk<R: OriginResolver>(
    root_manifest_path: &Path,
    main_project: Option<&Project>,
    workspace_root: &Path,
    registry: &CodecRegistry,
    resolver: &R,
    opts: &IterOptions,
    mut on_yield: impl FnMut(&Project, u32),
) -> Result<(), Error> {
    let mut done: HashSet<String> = HashSet::new();

    if let Some(main) = main_project {
        done.insert(main.path.clone());
        if !opts.skip_main {
            on_yield(main, 0);
        }
    }

    let root_spec = match registry.for_path(root_manifest_path) {
        Ok(codec) => match codec.load(root_manifest_path) {
            Ok(spec) => spec,
            Err(ManifestError::NotFound { .. }) => return Ok(()),
            Err(e) => return Err(e.into()),
        },
        Err(_) => return Ok(()),
    };

    let mut root_filters = root_spec.group_filters.clone();
    root_filters.extend(opts.extra_group_filters.iter().cloned());
    let filters = groupfilter::parse(&root_filters)?;

    let mut queue: VecDeque<Frontier> = VecDeque::new();
    queue.push_back(Frontier {
        manifest_spec: root_spec,
        refurl: main_project.and_then(|_| resolver.origin_url(workspace_root)),
        filters,
        default: true,
        level: 0,
    });

    while let Some(frontier) = queue.pop_front() {
        let next_level = frontier.level + 1;
        for spec in &frontier.manifest_spec.dependencies {
            let project = Project::from_spec(
                spec,
                &frontier.manifest_spec,
                frontier.refurl.as_deref(),
                opts.resolve_url,
                next_level,
            )
            .map_err(Error::from)?;

            if done.contains(&project.path) {
                continue;
            }

            let selected = groupfilter::evaluate(
                &frontier.filters,
                &project.path,
                &project.groups,
                frontier.default,
            );
            if !selected {
                continue;
            }

            done.insert(project.path.clone());
            on_yield(&project, next_level);

            if !project.recursive {
                continue;
            }

            let clone_path = workspace_root.join(&project.path);
            let sub_manifest_path = clone_path.join(&project.manifest_path);

            if opts.resolve_url
                && !frontier.manifest_spec.dependencies.is_empty()
                && resolver.is_cloned(&clone_path)
                && resolver.origin_url(&clone_path).is_none()
            {
                // presence required, origin missing: structural, abort.
                return Err(crate::errors::GitError::GitCloneMissingOrigin {
                    path: clone_path.clone(),
                }
                .into());
            }

            let sub_spec = match registry.for_path(&sub_manifest_path) {
                Ok(codec) => match codec.load(&sub_manifest_path) {
                    Ok(spec) => spec,
                    Err(ManifestError::NotFound { .. }) => continue,
                    Err(e) => return Err(e.into()),
                },
                Err(_) => continue,
            };

            let mut sub_filters = sub_spec.group_filters.clone();
            let with_groups_filters: Vec<String> = project
                .with_groups
                .iter()
                .map(|g| format!("+{g}"))
                .collect();
            let mut combined = with_groups_filters;
            combined.append(&mut sub_filters);
            let filters = groupfilter::parse(&combined)?;

            let refurl = if opts.resolve_url {
                resolver.origin_url(&clone_path)
            } else {
                project.url.clone()
            };

            queue.push_back(Frontier {
                manifest_spec: sub_spec,
                refurl,
                filters,
                default: false,
                level: next_level,
            });
        }
    }

    Ok(())
}

/// Yields every `Project` reachable from the root manifest, BFS,
/// deduplicated by path.
pub fn project_iter<R: OriginResolver>(
    root_manifest_path: &Path,
    main_project: Option<&Project>,
    workspace_root: &Path,
    registry: &CodecRegistry,
    resolver: &R,
    opts: &IterOptions,
) -> Result<Vec<Project>, Error> {
    let mut out = Vec::new();
    walk(
        root_manifest_path,
        main_project,
        workspace_root,
        registry,
        resolver,
        opts,
        |project, _level| out.push(project.clone()),
    )?;
    Ok(out)
}

/// Yields projects grouped into batches, one per BFS level.
pub fn project_level_iter<R: OriginResolver>(
    root_manifest_path: &Path,
    main_project: Option<&Project>,
    workspace_root: &Path,
    registry: &CodecRegistry,
    resolver: &R,
    opts: &IterOptions,
) -> Result<Vec<Vec<Project>>, Error> {
    let mut levels: Vec<Vec<Project>> = Vec::new();
    walk(
        root_manifest_path,
        main_project,
        workspace_root,
        registry,
        resolver,
        opts,
        |project, level| {
            let idx = level as usize;
            while levels.len() <= idx {
                levels.push(Vec::new());
            }
            levels[idx].push(project.clone());
        },
    )?;
    Ok(levels)
}

/// Yields every `Manifest` (not just its dependencies) reachable from the
/// root, BFS, deduplicated by the owning project's path.
pub fn manifest_iter<R: OriginResolver>(
    root_manifest_path: &Path,
    main_project: Option<&Project>,
    workspace_root: &Path,
    registry: &CodecRegistry,
    resolver: &R,
    opts: &IterOptions,
) -> Result<Vec<Manifest>, Error> {
    let mut manifests = Vec::new();
    // Re-walk, this time capturing per-frontier manifest data directly via
    // a thin wrapper: we reuse `walk`'s project stream and attach each
    // yielded project's own sub-manifest as the `Manifest` entry when one
    // exists, mirroring the level-0 root manifest as well.
    if let Ok(codec) = registry.for_path(root_manifest_path) {
        if let Ok(spec) = codec.load(root_manifest_path) {
            manifests.push(Manifest {
                group_filters: spec.group_filters.clone(),
                linkfiles: spec.linkfiles.clone(),
                copyfiles: spec.copyfiles.clone(),
                dependencies: Vec::new(),
                path: root_manifest_path.to_path_buf(),
            });
        }
    }

    walk(
        root_manifest_path,
        main_project,
        workspace_root,
        registry,
        resolver,
        opts,
        |project, _level| {
            if !project.recursive {
                return;
            }
            let clone_path = workspace_root.join(&project.path);
            let sub_manifest_path = clone_path.join(&project.manifest_path);
            if let Ok(codec) = registry.for_path(&sub_manifest_path) {
                if let Ok(spec) = codec.load(&sub_manifest_path) {
                    manifests.push(Manifest {
                        group_filters: spec.group_filters,
                        linkfiles: spec.linkfiles,
                        copyfiles: spec.copyfiles,
                        dependencies: Vec::new(),
                        path: sub_manifest_path,
                    });
                }
            }
        },
    )?;
    Ok(manifests)
}
