//! Pluggable manifest codec: `{is_compatible, load, dump, save, upgrade}`,
//! selected from a priority-ranked registry. The built-in TOML codec
//! preserves user comments and unknown keys on `save(update=true)` by
//! editing the existing `toml_edit::DocumentMut` in place rather than
//! serializing from scratch.

use crate::core::manifest::ManifestSpec;
use crate::errors::ManifestError;
use std::path::Path;
use toml_edit::{value, Array, ArrayOfTables, DocumentMut, Item, Table};

/// A manifest codec. `prio` breaks ties when more than one codec in a
/// registry claims compatibility with a path; higher wins.
pub trait ManifestCodec {
    fn prio(&self) -> i32;
    fn is_compatible(&self, path: &Path) -> bool;
    fn load(&self, path: &Path) -> Result<ManifestSpec, ManifestError>;
    fn dump(&self, spec: &ManifestSpec) -> Result<String, ManifestError>;
    fn save(&self, spec: &ManifestSpec, path: &Path, update: bool) -> Result<(), ManifestError>;
    fn upgrade(&self, path: &Path) -> Result<(), ManifestError>;
}

/// The default TOML codec described in the external-interfaces schema.
/// Registered at priority `-1` so any higher-priority, externally supplied
/// codec wins ties.
pub struct TomlCodec;

impl ManifestCodec for TomlCodec {
    fn prio(&self) -> i32 {
        -1
    }

    fn is_compatible(&self, path: &Path) -> bool {
        path.extension().and_then(|e| e.to_str()) == Some("toml")
    }

    fn load(&self, path: &Path) -> Result<ManifestSpec, ManifestError> {
        let text = std::fs::read_to_string(path).map_err(|_| ManifestError::NotFound {
            path: path.to_path_buf(),
        })?;
        let spec: ManifestSpec = toml::from_str(&text).map_err(|e| ManifestError::Broken {
            path: path.to_path_buf(),
            details: e.to_string(),
        })?;
        spec.validate(path)?;
        Ok(spec)
    }

    fn dump(&self, spec: &ManifestSpec) -> Result<String, ManifestError> {
        toml::to_string_pretty(spec).map_err(|e| ManifestError::Broken {
            path: path_placeholder(),
            details: e.to_string(),
        })
    }

    fn save(&self, spec: &ManifestSpec, path: &Path, update: bool) -> Result<(), ManifestError> {
        if update && path.exists() {
            let existing = std::fs::read_to_string(path).map_err(|e| ManifestError::Broken {
                path: path.to_path_buf(),
                details: e.to_string(),
            })?;
            let mut doc: DocumentMut = existing.parse().map_err(|e: toml_edit::TomlError| {
                ManifestError::Broken {
                    path: path.to_path_buf(),
                    details: e.to_string(),
                }
            })?;
            write_known_keys(&mut doc, spec);
            std::fs::write(path, doc.to_string()).map_err(|e| ManifestError::Broken {
                path: path.to_path_buf(),
                details: e.to_string(),
            })?;
        } else {
            let text = fresh_template(spec);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| ManifestError::Broken {
                    path: path.to_path_buf(),
                    details: e.to_string(),
                })?;
            }
            std::fs::write(path, text).map_err(|e| ManifestError::Broken {
                path: path.to_path_buf(),
                details: e.to_string(),
            })?;
        }
        Ok(())
    }

    fn upgrade(&self, _path: &Path) -> Result<(), ManifestError> {
        // Single schema version ("1.0") exists today; nothing to upgrade.
        Ok(())
    }
}

fn path_placeholder() -> std::path::PathBuf {
    std::path::PathBuf::from("<memory>")
}

/// Replace the keys this codec knows about inside an existing document,
/// leaving unrecognized keys and comments untouched.
fn write_known_keys(doc: &mut DocumentMut, spec: &ManifestSpec) {
    doc["version"] = value(spec.version.clone());

    if !spec.group_filters.is_empty() {
        let mut arr = Array::new();
        for g in &spec.group_filters {
            arr.push(g.as_str());
        }
        doc["group-filters"] = value(arr);
    }

    if !spec.remotes.is_empty() {
        let mut tables = ArrayOfTables::new();
        for remote in &spec.remotes {
            let mut t = Table::new();
            t["name"] = value(remote.name.clone());
            if let Some(ref base) = remote.url_base {
                t["url-base"] = value(base.clone());
            }
            tables.push(t);
        }
        doc["remotes"] = Item::ArrayOfTables(tables);
    }

    if spec.defaults != Default::default() {
        let mut t = Table::new();
        if let Some(ref r) = spec.defaults.remote {
            t["remote"] = value(r.clone());
        }
        if let Some(ref r) = spec.defaults.revision {
            t["revision"] = value(r.clone());
        }
        if !spec.defaults.groups.is_empty() {
            let mut arr = Array::new();
            for g in &spec.defaults.groups {
                arr.push(g.as_str());
            }
            t["groups"] = value(arr);
        }
        if !spec.defaults.with_groups.is_empty() {
            let mut arr = Array::new();
            for g in &spec.defaults.with_groups {
                arr.push(g.as_str());
            }
            t["with-groups"] = value(arr);
        }
        t["submodules"] = value(spec.defaults.submodules);
        doc["defaults"] = Item::Table(t);
    }

    if !spec.dependencies.is_empty() {
        let mut tables = ArrayOfTables::new();
        for dep in &spec.dependencies {
            tables.push(dependency_table(dep));
        }
        doc["dependencies"] = Item::ArrayOfTables(tables);
    }

    if !spec.linkfiles.is_empty() {
        let mut tables = ArrayOfTables::new();
        for fr in &spec.linkfiles {
            tables.push(fileref_table(fr));
        }
        doc["linkfiles"] = Item::ArrayOfTables(tables);
    }
    if !spec.copyfiles.is_empty() {
        let mut tables = ArrayOfTables::new();
        for fr in &spec.copyfiles {
            tables.push(fileref_table(fr));
        }
        doc["copyfiles"] = Item::ArrayOfTables(tables);
    }
}

fn fileref_table(fr: &crate::core::manifest::FileRef) -> Table {
    let mut t = Table::new();
    t["src"] = value(fr.src.clone());
    t["dest"] = value(fr.dest.clone());
    if !fr.groups.is_empty() {
        let mut arr = Array::new();
        for g in &fr.groups {
            arr.push(g.as_str());
        }
        t["groups"] = value(arr);
    }
    t
}

fn dependency_table(dep: &crate::core::manifest::ProjectSpec) -> Table {
    let mut t = Table::new();
    t["name"] = value(dep.name.clone());
    if let Some(ref r) = dep.remote {
        t["remote"] = value(r.clone());
    }
    if let Some(ref s) = dep.sub_url {
        t["sub-url"] = value(s.clone());
    }
    if let Some(ref u) = dep.url {
        t["url"] = value(u.clone());
    }
    if let Some(ref r) = dep.revision {
        t["revision"] = value(r.clone());
    }
    if let Some(ref p) = dep.path {
        t["path"] = value(p.clone());
    }
    t["manifest-path"] = value(dep.manifest_path.clone());
    if !dep.groups.is_empty() {
        let mut arr = Array::new();
        for g in &dep.groups {
            arr.push(g.as_str());
        }
        t["groups"] = value(arr);
    }
    if !dep.with_groups.is_empty() {
        let mut arr = Array::new();
        for g in &dep.with_groups {
            arr.push(g.as_str());
        }
        t["with-groups"] = value(arr);
    }
    if let Some(s) = dep.submodules {
        t["submodules"] = value(s);
    }
    t["recursive"] = value(dep.recursive);
    if !dep.linkfiles.is_empty() {
        let mut tables = ArrayOfTables::new();
        for fr in &dep.linkfiles {
            tables.push(fileref_table(fr));
        }
        t.insert("linkfiles", Item::ArrayOfTables(tables));
    }
    if !dep.copyfiles.is_empty() {
        let mut tables = ArrayOfTables::new();
        for fr in &dep.copyfiles {
            tables.push(fileref_table(fr));
        }
        t.insert("copyfiles", Item::ArrayOfTables(tables));
    }
    t
}

fn fresh_template(spec: &ManifestSpec) -> String {
    let mut doc = DocumentMut::new();
    write_known_keys(&mut doc, spec);
    format!(
        "# git workspace manifest\n# see the manifest schema for the full set of keys.\n{doc}"
    )
}

/// Registry of available codecs; picks the compatible one with the
/// highest `prio` for a path.
pub struct CodecRegistry {
    codecs: Vec<Box<dyn ManifestCodec>>,
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self {
            codecs: vec![Box::new(TomlCodec)],
        }
    }
}

impl CodecRegistry {
    pub fn for_path(&self, path: &Path) -> Result<&dyn ManifestCodec, ManifestError> {
        self.codecs
            .iter()
            .filter(|c| c.is_compatible(path))
            .max_by_key(|c| c.prio())
            .map(|c| c.as_ref())
            .ok_or_else(|| ManifestError::IncompatibleFormat {
                path: path.to_path_buf(),
            })
    }
}
