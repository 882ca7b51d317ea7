//! Group filters: `+group`, `-group`, `-group@path`, `-@path` strings
//! compiled into `GroupSelect`s and evaluated against `(path, groups)`.

use crate::errors::ManifestError;
use std::collections::HashMap;
use std::path::PathBuf;

/// One compiled filter entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSelect {
    pub group: Option<String>,
    pub select: bool,
    pub path: Option<String>,
}

/// Parse a sequence of `group-filters` strings into `GroupSelect`s, in
/// order. Grammar: `("+"|"-") (group)? ("@" path)?`, where `group` is
/// omitted only when `@path` is present (`-@path` selects/deselects
/// everything at `path`).
pub fn parse(filters: &[String]) -> Result<Vec<GroupSelect>, ManifestError> {
    filters.iter().map(|s| parse_one(s)).collect()
}

fn parse_one(s: &str) -> Result<GroupSelect, ManifestError> {
    let broken = |details: String| ManifestError::Broken {
        path: PathBuf::new(),
        details,
    };

    let (select, rest) = match s.chars().next() {
        Some('+') => (true, &s[1..]),
        Some('-') => (false, &s[1..]),
        _ => {
            return Err(broken(format!(
                "group filter {s:?} must start with '+' or '-'"
            )))
        }
    };

    let (group_part, path_part) = match rest.split_once('@') {
        Some((g, p)) => (g, Some(p.to_string())),
        None => (rest, None),
    };

    let group = if group_part.is_empty() {
        None
    } else {
        Some(group_part.to_string())
    };

    if group.is_none() && path_part.is_none() {
        return Err(broken(format!(
            "group filter {s:?} names neither a group nor a path"
        )));
    }

    Ok(GroupSelect {
        group,
        select,
        path: path_part,
    })
}

fn glob_match(pattern: &str, text: &str) -> bool {
    fn inner(pat: &[char], txt: &[char]) -> bool {
        match pat.first() {
            None => txt.is_empty(),
            Some('*') => {
                inner(&pat[1..], txt)
                    || (!txt.is_empty() && inner(pat, &txt[1..]))
            }
            Some(c) => !txt.is_empty() && *c == txt[0] && inner(&pat[1..], &txt[1..]),
        }
    }
    let pat: Vec<char> = pattern.chars().collect();
    let txt: Vec<char> = text.chars().collect();
    inner(&pat, &txt)
}

/// Evaluate whether a project at `path` with `groups` is selected by
/// `filters`, given the level's `default` selection for an unlisted group.
pub fn evaluate(filters: &[GroupSelect], path: &str, groups: &[String], default: bool) -> bool {
    let mut table: HashMap<&str, bool> = HashMap::new();
    if groups.is_empty() {
        table.insert("", true);
    } else {
        for g in groups {
            table.insert(g.as_str(), default);
        }
    }

    for select in filters {
        if let Some(ref glob) = select.path {
            if !glob_match(glob, path) {
                continue;
            }
        }
        match &select.group {
            Some(g) => {
                if let Some(entry) = table.get_mut(g.as_str()) {
                    *entry = select.select;
                }
            }
            None => {
                for entry in table.values_mut() {
                    *entry = select.select;
                }
            }
        }
    }

    table.values().any(|v| *v)
}
