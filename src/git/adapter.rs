//! Thin typed wrapper over the `git` process. Every fallible operation
//! returns a [`GitError`]; the adapter never retries — retry policy, if
//! any, lives in the orchestrator.

use crate::errors::GitError;
use crate::util::log_cmd;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Command;

/// One git-managed clone at a fixed path.
pub struct Git {
    path: PathBuf,
}

static STATUS_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.)(.)\s(?:(.+) -> )?(.+)$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Untracked,
    Ignored,
    Unmodified,
    Modified,
    TypeChanged,
    Added,
    Deleted,
    Renamed,
    Copied,
    UpdatedUnmerged,
}

impl FileState {
    fn from_code(c: char) -> Self {
        match c {
            '?' => FileState::Untracked,
            '!' => FileState::Ignored,
            ' ' => FileState::Unmodified,
            'M' => FileState::Modified,
            'T' => FileState::TypeChanged,
            'A' => FileState::Added,
            'D' => FileState::Deleted,
            'R' => FileState::Renamed,
            'C' => FileState::Copied,
            'U' => FileState::UpdatedUnmerged,
            _ => FileState::Modified,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileStatus {
    pub index: FileState,
    pub work: FileState,
    pub path: String,
    pub orig_path: Option<String>,
}

#[derive(Debug, Clone)]
pub enum StatusEntry {
    Branch(String),
    File(FileStatus),
}

impl Git {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Git { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn run(&self, args: &[&str]) -> Result<String, GitError> {
        self.run_in(&self.path, args)
    }

    fn run_in(&self, cwd: &Path, args: &[&str]) -> Result<String, GitError> {
        use crate::telemetry::{GitSpan, SpanExt};
        use std::time::Instant;

        let operation = args.first().copied().unwrap_or("git");
        let span = GitSpan::new(operation, &cwd.to_string_lossy());
        let _enter = span.enter();

        let mut cmd = Command::new("git");
        cmd.current_dir(cwd).args(args);
        log_cmd(&cmd);
        let started = Instant::now();
        let output = cmd.output().map_err(GitError::Io)?;
        let elapsed = started.elapsed();
        let success = output.status.success();

        crate::telemetry::GLOBAL_METRICS.record_git(operation, elapsed, success);
        span.record_success(success);
        span.record_duration_ms(elapsed.as_secs_f64() * 1000.0);

        if !success {
            return Err(GitError::ProcessFailed {
                args: args.join(" "),
                cwd: cwd.to_path_buf(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    }

    /// `git init` at `self.path`.
    pub fn init(&self) -> Result<(), GitError> {
        std::fs::create_dir_all(&self.path)?;
        self.run(&["init"])?;
        Ok(())
    }

    /// Plain `git clone url self.path`, optionally checking out `revision`
    /// and/or a shallow `depth`.
    pub fn clone(&self, url: &str, revision: Option<&str>, depth: Option<u32>) -> Result<(), GitError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let path_str = self.path.to_string_lossy().into_owned();
        let mut args: Vec<String> = vec!["clone".to_string()];
        if let Some(d) = depth {
            args.push("--depth".to_string());
            args.push(d.to_string());
        }
        if let Some(rev) = revision {
            args.push("-b".to_string());
            args.push(rev.to_string());
        }
        args.push("--".to_string());
        args.push(url.to_string());
        args.push(path_str);

        let mut cmd = Command::new("git");
        cmd.args(&args);
        log_cmd(&cmd);
        let output = cmd.output().map_err(GitError::Io)?;
        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if revision.is_some() && stderr.contains("Remote branch") {
            // Branch-named revision doesn't exist; fall back to a plain
            // clone and a later checkout by SHA.
            let mut args: Vec<String> = vec!["clone".to_string()];
            if let Some(d) = depth {
                args.push("--depth".to_string());
                args.push(d.to_string());
            }
            args.push("--".to_string());
            args.push(url.to_string());
            args.push(self.path.to_string_lossy().into_owned());
            let mut cmd = Command::new("git");
            cmd.args(&args);
            log_cmd(&cmd);
            let output = cmd.output().map_err(GitError::Io)?;
            if output.status.success() {
                if let Some(rev) = revision {
                    return self.checkout(Some(rev), None, None, false);
                }
                return Ok(());
            }
            return Err(GitError::ProcessFailed {
                args: args.join(" "),
                cwd: self.path.clone(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Err(GitError::ProcessFailed {
            args: args.join(" "),
            cwd: self.path.clone(),
            stderr: stderr.into_owned(),
        })
    }

    pub fn fetch(&self, shallow_depth: Option<u32>, unshallow: bool) -> Result<(), GitError> {
        let mut args: Vec<&str> = vec!["fetch", "origin"];
        let depth_str;
        if let Some(d) = shallow_depth {
            depth_str = d.to_string();
            args.push("--depth");
            args.push(&depth_str);
        } else if unshallow {
            args.push("--unshallow");
        }
        self.run(&args)?;
        Ok(())
    }

    pub fn checkout(
        &self,
        revision: Option<&str>,
        paths: Option<&[String]>,
        branch: Option<&str>,
        force: bool,
    ) -> Result<(), GitError> {
        let mut args: Vec<String> = vec!["checkout".to_string()];
        if force {
            args.push("-f".to_string());
        }
        if let Some(b) = branch {
            args.push("-B".to_string());
            args.push(b.to_string());
        }
        if let Some(rev) = revision {
            args.push(rev.to_string());
        }
        if let Some(p) = paths {
            if !p.is_empty() {
                args.push("--".to_string());
                args.extend(p.iter().cloned());
            }
        }
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(&arg_refs)?;
        Ok(())
    }

    pub fn merge(&self, reference: &str) -> Result<(), GitError> {
        self.run(&["merge", "--no-edit", reference])?;
        Ok(())
    }

    pub fn rebase(&self) -> Result<(), GitError> {
        self.run(&["rebase"])?;
        Ok(())
    }

    pub fn pull(&self) -> Result<(), GitError> {
        self.run(&["pull"])?;
        Ok(())
    }

    pub fn add(&self, paths: Option<&[String]>, force: bool, all: bool) -> Result<(), GitError> {
        let mut args: Vec<String> = vec!["add".to_string()];
        if force {
            args.push("-f".to_string());
        }
        if all {
            args.push("-A".to_string());
        } else if let Some(p) = paths {
            args.extend(p.iter().cloned());
        } else {
            args.push(".".to_string());
        }
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(&arg_refs)?;
        Ok(())
    }

    pub fn rm(&self, paths: &[String], cached: bool, force: bool, recursive: bool) -> Result<(), GitError> {
        let mut args: Vec<String> = vec!["rm".to_string()];
        if cached {
            args.push("--cached".to_string());
        }
        if force {
            args.push("-f".to_string());
        }
        if recursive {
            args.push("-r".to_string());
        }
        args.push("--".to_string());
        args.extend(paths.iter().cloned());
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(&arg_refs)?;
        Ok(())
    }

    pub fn reset(&self, paths: &[String]) -> Result<(), GitError> {
        let mut args: Vec<String> = vec!["reset".to_string()];
        if !paths.is_empty() {
            args.push("--".to_string());
            args.extend(paths.iter().cloned());
        }
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(&arg_refs)?;
        Ok(())
    }

    pub fn commit(&self, message: &str, paths: Option<&[String]>, all: bool) -> Result<(), GitError> {
        let mut args: Vec<String> = vec!["commit".to_string(), "-m".to_string(), message.to_string()];
        if all {
            args.push("-a".to_string());
        }
        if let Some(p) = paths {
            if !p.is_empty() {
                args.push("--".to_string());
                args.extend(p.iter().cloned());
            }
        }
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(&arg_refs)?;
        Ok(())
    }

    pub fn tag(&self, name: &str, message: Option<&str>, force: bool) -> Result<(), GitError> {
        if !force && self.get_tags(Some(name))?.contains(&name.to_string()) {
            return Err(GitError::GitTagExists {
                name: name.to_string(),
            });
        }
        let mut args: Vec<String> = vec!["tag".to_string()];
        if force {
            args.push("-f".to_string());
        }
        if let Some(msg) = message {
            args.push("-a".to_string());
            args.push(name.to_string());
            args.push("-m".to_string());
            args.push(msg.to_string());
        } else {
            args.push(name.to_string());
        }
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(&arg_refs)?;
        Ok(())
    }

    pub fn is_cloned(&self) -> bool {
        self.path.join(".git").exists()
    }

    pub fn require_cloned(&self) -> Result<(), GitError> {
        if self.is_cloned() {
            Ok(())
        } else {
            Err(GitError::GitCloneMissing {
                path: self.path.clone(),
            })
        }
    }

    pub fn get_sha(&self, revision: Option<&str>) -> Result<String, GitError> {
        self.run(&["rev-parse", revision.unwrap_or("HEAD")])
    }

    pub fn get_branch(&self) -> Result<Option<String>, GitError> {
        let name = self.run(&["symbolic-ref", "--short", "-q", "HEAD"]);
        match name {
            Ok(n) if !n.is_empty() => Ok(Some(n)),
            _ => Ok(None),
        }
    }

    pub fn get_tag(&self) -> Result<Option<String>, GitError> {
        match self.run(&["describe", "--tags", "--exact-match"]) {
            Ok(t) if !t.is_empty() => Ok(Some(t)),
            _ => Ok(None),
        }
    }

    pub fn get_tags(&self, pattern: Option<&str>) -> Result<Vec<String>, GitError> {
        let mut args = vec!["tag", "--list"];
        if let Some(p) = pattern {
            args.push(p);
        }
        let out = self.run(&args)?;
        Ok(out.lines().map(|s| s.to_string()).filter(|s| !s.is_empty()).collect())
    }

    pub fn get_url(&self) -> Result<Option<String>, GitError> {
        match self.run(&["remote", "get-url", "origin"]) {
            Ok(u) if !u.is_empty() => Ok(Some(u)),
            Ok(_) => Ok(None),
            Err(GitError::ProcessFailed { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn get_upstream_branch(&self) -> Result<Option<String>, GitError> {
        match self.run(&["rev-parse", "--abbrev-ref", "--symbolic-full-name", "@{u}"]) {
            Ok(u) if !u.is_empty() => Ok(Some(u)),
            _ => Ok(None),
        }
    }

    pub fn get_shallow(&self) -> bool {
        self.path.join(".git").join("shallow").exists()
    }

    pub fn has_index_changes(&self) -> Result<bool, GitError> {
        let out = self.run(&["diff", "--cached", "--name-only"])?;
        Ok(!out.is_empty())
    }

    pub fn has_work_changes(&self) -> Result<bool, GitError> {
        let out = self.run(&["diff", "--name-only"])?;
        Ok(!out.is_empty())
    }

    pub fn has_changes(&self) -> Result<bool, GitError> {
        Ok(self.has_index_changes()? || self.has_work_changes()? || !self.untracked()?.is_empty())
    }

    fn untracked(&self) -> Result<Vec<String>, GitError> {
        let out = self.run(&["ls-files", "--others", "--exclude-standard"])?;
        Ok(out.lines().map(|s| s.to_string()).filter(|s| !s.is_empty()).collect())
    }

    /// No uncommitted changes, no commits ahead of upstream, no stashes.
    pub fn is_empty(&self) -> Result<bool, GitError> {
        if self.has_changes()? {
            return Ok(false);
        }
        if let Ok(upstream) = self.run(&["rev-list", "--count", "@{u}..HEAD"]) {
            if upstream.trim() != "0" {
                return Ok(false);
            }
        }
        let stash = self.run(&["stash", "list"])?;
        Ok(stash.is_empty())
    }

    /// Parse `git status --porcelain=v1 -b` output into branch/file entries.
    pub fn status(&self, paths: Option<&[String]>) -> Result<Vec<StatusEntry>, GitError> {
        let mut args: Vec<String> = vec!["status".to_string(), "--porcelain=v1".to_string(), "-b".to_string()];
        if let Some(p) = paths {
            if !p.is_empty() {
                args.push("--".to_string());
                args.extend(p.iter().cloned());
            }
        }
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let out = self.run(&arg_refs)?;

        let mut entries = Vec::new();
        for line in out.lines() {
            if let Some(rest) = line.strip_prefix("## ") {
                entries.push(StatusEntry::Branch(rest.to_string()));
                continue;
            }
            if let Some(caps) = STATUS_LINE_RE.captures(line) {
                let index = FileState::from_code(caps[1].chars().next().unwrap());
                let work = FileState::from_code(caps[2].chars().next().unwrap());
                let orig_path = caps.get(3).map(|m| m.as_str().to_string());
                let path = caps[4].to_string();
                entries.push(StatusEntry::File(FileStatus {
                    index,
                    work,
                    path,
                    orig_path,
                }));
            }
        }
        Ok(entries)
    }

    pub fn diffstat(&self, paths: Option<&[String]>) -> Result<Vec<(String, String)>, GitError> {
        let mut args: Vec<String> = vec!["diff".to_string(), "--stat".to_string()];
        if let Some(p) = paths {
            if !p.is_empty() {
                args.push("--".to_string());
                args.extend(p.iter().cloned());
            }
        }
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let out = self.run(&arg_refs)?;
        Ok(out
            .lines()
            .filter_map(|line| line.split_once('|'))
            .map(|(path, stat)| (path.trim().to_string(), stat.trim().to_string()))
            .collect())
    }

    pub fn update_submodules(&self) -> Result<(), GitError> {
        self.run(&["submodule", "update", "--init", "--recursive"])?;
        Ok(())
    }
}
