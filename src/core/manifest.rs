//! The manifest data model: remotes, defaults, group filters, and project
//! specifications, plus the resolution of a `ProjectSpec` into a concrete
//! `Project`.
//!
//! All entities here are immutable value types; equality is structural
//! (derived `PartialEq`). `Project` values are not cached anywhere — they
//! are recomputed on every iteration since resolution is a cheap pure
//! function of its inputs.

use crate::errors::{ManifestError, ResolveError};
use crate::url_utils::{urljoin, urlsub};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_MANIFEST_PATH: &str = "git-ws.toml";

static GROUP_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_-]*$").unwrap());

fn validate_group_name(name: &str) -> Result<(), ManifestError> {
    if GROUP_NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(ManifestError::Broken {
            path: PathBuf::new(),
            details: format!("invalid group name {name:?}"),
        })
    }
}

/// A named source of repositories: `url = f"{url_base}/{sub_url}"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remote {
    pub name: String,
    #[serde(rename = "url-base", default, skip_serializing_if = "Option::is_none")]
    pub url_base: Option<String>,
}

/// Manifest-wide defaults inherited by every `ProjectSpec` that doesn't
/// override them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Defaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    #[serde(rename = "with-groups", default, skip_serializing_if = "Vec::is_empty")]
    pub with_groups: Vec<String>,
    #[serde(default = "default_true")]
    pub submodules: bool,
}

fn default_true() -> bool {
    true
}

/// A declared copy or link from a project's working tree into the
/// workspace root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub src: String,
    pub dest: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
}

/// A dependency as declared in a manifest, before resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    #[serde(rename = "sub-url", default, skip_serializing_if = "Option::is_none")]
    pub sub_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(rename = "manifest-path", default = "default_manifest_path")]
    pub manifest_path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    #[serde(rename = "with-groups", default, skip_serializing_if = "Vec::is_empty")]
    pub with_groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submodules: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub linkfiles: Vec<FileRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub copyfiles: Vec<FileRef>,
    #[serde(default = "default_true")]
    pub recursive: bool,
}

fn default_manifest_path() -> String {
    DEFAULT_MANIFEST_PATH.to_string()
}

impl ProjectSpec {
    /// Structural validation independent of any enclosing manifest:
    /// `remote` XOR `url`; `sub_url` requires `remote`; `sub_url` XOR
    /// `url`; group names are well-formed.
    pub fn validate(&self) -> Result<(), ManifestError> {
        let broken = |details: String| ManifestError::Broken {
            path: PathBuf::new(),
            details,
        };

        if self.remote.is_some() && self.url.is_some() {
            return Err(broken(format!(
                "dependency {:?} may not set both 'remote' and 'url'",
                self.name
            )));
        }
        if self.sub_url.is_some() && self.remote.is_none() {
            return Err(broken(format!(
                "dependency {:?} sets 'sub-url' without 'remote'",
                self.name
            )));
        }
        if self.sub_url.is_some() && self.url.is_some() {
            return Err(broken(format!(
                "dependency {:?} may not set both 'sub-url' and 'url'",
                self.name
            )));
        }
        for g in self.groups.iter().chain(self.with_groups.iter()) {
            validate_group_name(g)?;
        }
        Ok(())
    }
}

/// A resolved dependency: concrete URL, path, and effective groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub name: String,
    pub path: String,
    pub url: Option<String>,
    pub revision: Option<String>,
    pub manifest_path: String,
    pub groups: Vec<String>,
    pub with_groups: Vec<String>,
    pub submodules: bool,
    pub linkfiles: Vec<FileRef>,
    pub copyfiles: Vec<FileRef>,
    pub is_main: bool,
    pub level: u32,
    pub recursive: bool,
}

impl Project {
    /// The main project synthesized at level 0 when a workspace has one.
    pub fn main(name: &str, path: &str) -> Self {
        Project {
            name: name.to_string(),
            path: path.to_string(),
            url: None,
            revision: None,
            manifest_path: DEFAULT_MANIFEST_PATH.to_string(),
            groups: Vec::new(),
            with_groups: Vec::new(),
            submodules: true,
            linkfiles: Vec::new(),
            copyfiles: Vec::new(),
            is_main: true,
            level: 0,
            recursive: true,
        }
    }

    /// Resolve a `ProjectSpec` into a concrete `Project`.
    ///
    /// `refurl` is the URL of the enclosing manifest's own clone (used to
    /// derive relative URLs and the `urlsub` suffix carry-over).
    /// `resolve_url`, when true, additionally joins a relative URL against
    /// `refurl` into an absolute one, failing with `NoAbsUrl` if `refurl`
    /// is unavailable.
    pub fn from_spec(
        spec: &ProjectSpec,
        manifest: &ManifestSpec,
        refurl: Option<&str>,
        resolve_url: bool,
        level: u32,
    ) -> Result<Self, ResolveError> {
        let url = if let Some(ref url) = spec.url {
            url.clone()
        } else {
            let effective_remote = spec.remote.clone().or_else(|| manifest.defaults.remote.clone());
            let effective_sub = spec
                .sub_url
                .clone()
                .unwrap_or_else(|| urlsub(refurl, &spec.name));

            match effective_remote {
                Some(remote_name) => {
                    let remote = manifest
                        .remotes
                        .iter()
                        .find(|r| r.name == remote_name)
                        .ok_or_else(|| ResolveError::UnknownRemote {
                            name: spec.name.clone(),
                            remote: remote_name.clone(),
                        })?;
                    match &remote.url_base {
                        Some(base) => format!("{base}/{effective_sub}"),
                        None => effective_sub,
                    }
                }
                None => format!("../{effective_sub}"),
            }
        };

        let url = if resolve_url && !has_scheme_or_rooted(&url) {
            if refurl.is_none() {
                return Err(ResolveError::NoAbsUrl {
                    name: spec.name.clone(),
                    url,
                });
            }
            urljoin(refurl, &url)
        } else {
            url
        };

        let groups = if spec.groups.is_empty() {
            manifest.defaults.groups.clone()
        } else {
            spec.groups.clone()
        };
        let with_groups = if spec.with_groups.is_empty() {
            manifest.defaults.with_groups.clone()
        } else {
            spec.with_groups.clone()
        };
        let submodules = spec.submodules.unwrap_or(manifest.defaults.submodules);
        let revision = spec.revision.clone().or_else(|| manifest.defaults.revision.clone());
        let path = spec.path.clone().unwrap_or_else(|| spec.name.clone());

        Ok(Project {
            name: spec.name.clone(),
            path,
            url: Some(url),
            revision,
            manifest_path: spec.manifest_path.clone(),
            groups,
            with_groups,
            submodules,
            linkfiles: spec.linkfiles.clone(),
            copyfiles: spec.copyfiles.clone(),
            is_main: false,
            level,
            recursive: spec.recursive,
        })
    }
}

fn has_scheme_or_rooted(url: &str) -> bool {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*://").unwrap().is_match(url) || url.starts_with('/')
}

/// The raw, on-disk manifest content (remotes/defaults/dependencies), prior
/// to resolution against a context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestSpec {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(rename = "group-filters", default, skip_serializing_if = "Vec::is_empty")]
    pub group_filters: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remotes: Vec<Remote>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub linkfiles: Vec<FileRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub copyfiles: Vec<FileRef>,
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<ProjectSpec>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for ManifestSpec {
    fn default() -> Self {
        ManifestSpec {
            version: default_version(),
            group_filters: Vec::new(),
            remotes: Vec::new(),
            linkfiles: Vec::new(),
            copyfiles: Vec::new(),
            defaults: Defaults::default(),
            dependencies: Vec::new(),
        }
    }
}

impl ManifestSpec {
    /// Structural validation: unique remote names, unique dependency
    /// names, and well-formed `ProjectSpec`s.
    pub fn validate(&self, path: &std::path::Path) -> Result<(), ManifestError> {
        let mut seen_remotes = std::collections::HashSet::new();
        for remote in &self.remotes {
            if !seen_remotes.insert(remote.name.as_str()) {
                return Err(ManifestError::Broken {
                    path: path.to_path_buf(),
                    details: format!("duplicate remote name {:?}", remote.name),
                });
            }
        }
        let mut seen_deps = std::collections::HashSet::new();
        for dep in &self.dependencies {
            if !seen_deps.insert(dep.name.as_str()) {
                return Err(ManifestError::Broken {
                    path: path.to_path_buf(),
                    details: format!("duplicate dependency name {:?}", dep.name),
                });
            }
            dep.validate().map_err(|e| match e {
                ManifestError::Broken { details, .. } => ManifestError::Broken {
                    path: path.to_path_buf(),
                    details,
                },
                other => other,
            })?;
        }
        for g in &self.defaults.groups {
            validate_group_name(g).map_err(|e| match e {
                ManifestError::Broken { details, .. } => ManifestError::Broken {
                    path: path.to_path_buf(),
                    details,
                },
                other => other,
            })?;
        }
        Ok(())
    }
}

/// A `ManifestSpec` bound to the context it was loaded from: the resolved
/// dependencies at this level and the path it was read from.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub group_filters: Vec<String>,
    pub linkfiles: Vec<FileRef>,
    pub copyfiles: Vec<FileRef>,
    pub dependencies: Vec<Project>,
    pub path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(name: &str, base: &str) -> Remote {
        Remote {
            name: name.to_string(),
            url_base: Some(base.to_string()),
        }
    }

    fn spec(name: &str) -> ProjectSpec {
        ProjectSpec {
            name: name.to_string(),
            remote: None,
            sub_url: None,
            url: None,
            revision: None,
            path: None,
            manifest_path: default_manifest_path(),
            groups: Vec::new(),
            with_groups: Vec::new(),
            submodules: None,
            linkfiles: Vec::new(),
            copyfiles: Vec::new(),
            recursive: true,
        }
    }

    #[test]
    fn spec_url_wins_over_computed_url() {
        let manifest = ManifestSpec {
            remotes: vec![remote("origin", "https://example.com/group")],
            ..Default::default()
        };
        let mut s = spec("dep1");
        s.url = Some("https://elsewhere.com/dep1.git".to_string());
        s.remote = None;
        let project = Project::from_spec(&s, &manifest, None, false, 1).unwrap();
        assert_eq!(project.url.as_deref(), Some("https://elsewhere.com/dep1.git"));
    }

    #[test]
    fn remote_and_sub_url_join_with_base() {
        let manifest = ManifestSpec {
            remotes: vec![remote("origin", "https://example.com/group")],
            ..Default::default()
        };
        let mut s = spec("dep1");
        s.remote = Some("origin".to_string());
        s.sub_url = Some("dep1.git".to_string());
        let project = Project::from_spec(&s, &manifest, None, false, 1).unwrap();
        assert_eq!(
            project.url.as_deref(),
            Some("https://example.com/group/dep1.git")
        );
    }

    #[test]
    fn remote_alone_uses_urlsub_of_refurl() {
        let manifest = ManifestSpec {
            remotes: vec![remote("origin", "https://example.com/group")],
            ..Default::default()
        };
        let mut s = spec("dep1");
        s.remote = Some("origin".to_string());
        let project =
            Project::from_spec(&s, &manifest, Some("https://other.com/x/main.git"), false, 1)
                .unwrap();
        assert_eq!(
            project.url.as_deref(),
            Some("https://example.com/group/dep1.git")
        );
    }

    #[test]
    fn no_remote_no_url_is_relative_sibling() {
        let manifest = ManifestSpec::default();
        let s = spec("dep1");
        let project =
            Project::from_spec(&s, &manifest, Some("https://other.com/x/main.git"), false, 1)
                .unwrap();
        assert_eq!(project.url.as_deref(), Some("../dep1.git"));
    }

    #[test]
    fn unknown_remote_fails() {
        let manifest = ManifestSpec::default();
        let mut s = spec("dep1");
        s.remote = Some("nope".to_string());
        let err = Project::from_spec(&s, &manifest, None, false, 1).unwrap_err();
        assert!(matches!(err, ResolveError::UnknownRemote { .. }));
    }

    #[test]
    fn resolve_url_without_refurl_fails() {
        let manifest = ManifestSpec::default();
        let s = spec("dep1");
        let err = Project::from_spec(&s, &manifest, None, true, 1).unwrap_err();
        assert!(matches!(err, ResolveError::NoAbsUrl { .. }));
    }

    #[test]
    fn resolve_url_joins_relative_against_refurl() {
        let manifest = ManifestSpec::default();
        let s = spec("dep1");
        let project =
            Project::from_spec(&s, &manifest, Some("https://host.com/group/main.git"), true, 1)
                .unwrap();
        assert_eq!(
            project.url.as_deref(),
            Some("https://host.com/dep1.git")
        );
    }

    #[test]
    fn path_defaults_to_name() {
        let manifest = ManifestSpec::default();
        let s = spec("dep1");
        let project = Project::from_spec(&s, &manifest, None, false, 1).unwrap();
        assert_eq!(project.path, "dep1");
    }

    #[test]
    fn resolution_is_pure() {
        let manifest = ManifestSpec {
            remotes: vec![remote("origin", "https://example.com/group")],
            ..Default::default()
        };
        let mut s = spec("dep1");
        s.remote = Some("origin".to_string());
        let a = Project::from_spec(&s, &manifest, None, false, 1).unwrap();
        let b = Project::from_spec(&s, &manifest, None, false, 1).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn duplicate_remote_names_rejected() {
        let manifest = ManifestSpec {
            remotes: vec![remote("origin", "a"), remote("origin", "b")],
            ..Default::default()
        };
        let err = manifest.validate(std::path::Path::new("git-ws.toml")).unwrap_err();
        assert!(matches!(err, ManifestError::Broken { .. }));
    }

    #[test]
    fn remote_and_url_both_set_rejected() {
        let mut s = spec("dep1");
        s.remote = Some("origin".to_string());
        s.url = Some("https://example.com/dep1.git".to_string());
        assert!(s.validate().is_err());
    }

    #[test]
    fn sub_url_without_remote_rejected() {
        let mut s = spec("dep1");
        s.sub_url = Some("dep1.git".to_string());
        assert!(s.validate().is_err());
    }
}
