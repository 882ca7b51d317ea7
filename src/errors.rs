//! Crate-wide error taxonomy.
//!
//! Every fallible operation in the core surfaces one of these variants.
//! Sub-enums group errors by subsystem; the top-level [`Error`] wraps each
//! sub-enum so callers can match broadly or narrowly as needed.

use std::path::PathBuf;
use thiserror::Error;

/// Errors about workspace/configuration state.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("git workspace has not been initialized yet")]
    Uninitialized,

    #[error("git workspace has already been initialized at {path:?}")]
    Initialized { path: PathBuf },

    #[error("workspace {path:?} is not empty; it contains: {items:?}")]
    WorkspaceNotEmpty { path: PathBuf, items: Vec<PathBuf> },

    #[error("{what} {path:?} refers outside of the workspace ({workspace:?})")]
    OutsideWorkspace {
        workspace: PathBuf,
        path: PathBuf,
        what: &'static str,
    },

    #[error("the configuration file {path:?} cannot be read: {details}")]
    InvalidConfigurationFile { path: PathBuf, details: String },

    #[error("the configuration location {location:?} is not known")]
    InvalidConfigurationLocation { location: String },

    #[error("the configuration option {option:?} is not known")]
    InvalidConfigurationOption { option: String },

    #[error("the configuration value for {option:?} is invalid: {details}")]
    InvalidConfigurationValue { option: String, details: String },
}

/// Errors about loading, parsing, or validating a manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("manifest has not been found at {path:?}")]
    NotFound { path: PathBuf },

    #[error("manifest {path:?} is broken: {details}")]
    Broken { path: PathBuf, details: String },

    #[error("manifest exists at {path:?}")]
    Exists { path: PathBuf },

    #[error("no compatible manifest codec for {path:?}")]
    IncompatibleFormat { path: PathBuf },
}

/// Errors during `ProjectSpec` -> `Project` resolution.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("relative url {url:?} for {name:?} was resolved without a reference url")]
    NoAbsUrl { name: String, url: String },

    #[error("unknown remote {remote:?} referenced by {name:?}")]
    UnknownRemote { name: String, remote: String },
}

/// Errors from the git adapter.
#[derive(Error, Debug)]
pub enum GitError {
    #[error("git executable not found or not usable")]
    NoGit,

    #[error("project {path:?} has not been cloned yet")]
    GitCloneMissing { path: PathBuf },

    #[error("clone at {path:?} has no 'origin' remote")]
    GitCloneMissingOrigin { path: PathBuf },

    #[error("clone at {path:?} has uncommitted changes")]
    GitCloneNotClean { path: PathBuf },

    #[error("tag {name:?} already exists")]
    GitTagExists { name: String },

    #[error("`git {args}` failed in {cwd:?}:\n{stderr}")]
    ProcessFailed {
        args: String,
        cwd: PathBuf,
        stderr: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the workspace file-reference manager.
#[derive(Error, Debug)]
pub enum FileRefError {
    #[error(
        "file reference destination {dest:?} is claimed by both {existing:?} and {incoming:?}"
    )]
    FileRefConflict {
        dest: PathBuf,
        existing: String,
        incoming: String,
    },

    #[error("file reference destination {dest:?} was modified since it was created")]
    FileRefModified { dest: PathBuf },
}

/// The top-level crate error.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    FileRef(#[from] FileRefError),

    #[error("operation requires a main project")]
    NoMain,

    #[error("{path:?} is not an empty directory")]
    NotEmpty { path: PathBuf },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("toml parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("toml serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
