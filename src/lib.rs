//! git-ws: a multi-repository workspace orchestrator.
//!
//! Clones a root project's declared dependencies into a flat workspace,
//! keeps them synchronized with their declared revisions, propagates
//! transitive dependencies through each clone's own manifest, and
//! maintains copy/link file references from clones into the workspace
//! root.

pub mod cli;
pub mod config;
pub mod core;
pub mod errors;
pub mod git;
pub mod pathlock;
pub mod telemetry;
pub mod url_utils;
pub mod util;
