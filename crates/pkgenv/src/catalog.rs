// Copyright (c) Contributors to the pkgenv project.
// SPDX-License-Identifier: Apache-2.0

//! Catalogs that resolve tool and library identifiers to artifacts.
//!
//! A catalog pins each identifier to a concrete location on disk and a
//! sha256 digest. Resolution never retries: the first catalog that knows an
//! identifier wins, and an identifier no catalog knows is an error.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::{Error, Result};

#[cfg(test)]
#[path = "./catalog_test.rs"]
mod catalog_test;

/// Well-known filename for a catalog index.
pub const CATALOG_INDEX_FILENAME: &str = "catalog.yaml";

/// Whether an identifier names a tool or a library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Tool,
    Library,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Tool => f.write_str("tool"),
            ArtifactKind::Library => f.write_str("library"),
        }
    }
}

/// A resolved identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub identifier: String,
    pub kind: ArtifactKind,
    /// Name of the catalog that resolved it.
    pub catalog: String,
    pub root: PathBuf,
    /// Lowercase hex sha256.
    pub digest: String,
    pub bin_dirs: Vec<PathBuf>,
    pub include_dirs: Vec<PathBuf>,
    pub lib_dirs: Vec<PathBuf>,
    pub pkgconfig_dirs: Vec<PathBuf>,
}

impl Artifact {
    /// Build an artifact from an installation prefix, exposing the
    /// conventional subdirectories that exist under it.
    pub fn from_root(
        identifier: &str,
        kind: ArtifactKind,
        catalog: &str,
        root: PathBuf,
        digest: String,
    ) -> Self {
        let existing = |parts: &[&str]| -> Vec<PathBuf> {
            parts
                .iter()
                .map(|p| root.join(p))
                .filter(|p| p.is_dir())
                .collect()
        };
        let bin_dirs = existing(&["bin"]);
        let include_dirs = existing(&["include"]);
        let lib_dirs = existing(&["lib", "lib64"]);
        let pkgconfig_dirs = existing(&["lib/pkgconfig", "lib64/pkgconfig", "share/pkgconfig"]);

        Self {
            identifier: identifier.to_string(),
            kind,
            catalog: catalog.to_string(),
            root,
            digest,
            bin_dirs,
            include_dirs,
            lib_dirs,
            pkgconfig_dirs,
        }
    }
}

/// Source of artifacts.
pub trait Catalog: fmt::Debug {
    /// Name used in error messages and lock files.
    fn name(&self) -> &str;

    /// Look up an identifier; `Ok(None)` means this catalog does not know it.
    fn lookup(&self, identifier: &str, kind: ArtifactKind) -> Result<Option<Artifact>>;

    /// Identifiers this catalog can enumerate, used for suggestions.
    fn known_identifiers(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Catalog index API version.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub enum CatalogApiVersion {
    #[serde(rename = "pkgenv/v0/catalog")]
    V0,
}

/// Contents of a `catalog.yaml` index.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogIndex {
    pub api: CatalogApiVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub artifacts: BTreeMap<String, CatalogEntry>,
}

/// One pinned artifact in a catalog index.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Installation prefix, relative to the catalog directory unless absolute.
    pub path: PathBuf,
    pub sha256: String,
    /// Restricts the entry to tools or libraries; both when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ArtifactKind>,
}

/// A directory holding a `catalog.yaml` index of pinned artifacts.
#[derive(Debug, Clone)]
pub struct DirectoryCatalog {
    name: String,
    root: PathBuf,
    index: CatalogIndex,
}

impl DirectoryCatalog {
    /// Load the catalog index from `root/catalog.yaml`.
    pub fn load<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        let index_path = root.join(CATALOG_INDEX_FILENAME);
        let yaml = std::fs::read_to_string(&index_path).map_err(|e| Error::ReadFailed {
            path: index_path.clone(),
            error: e,
        })?;
        let index: CatalogIndex =
            serde_yaml::from_str(&yaml).map_err(|e| Error::InvalidYaml {
                kind: "catalog",
                error: e,
                yaml_content: yaml.clone(),
            })?;

        for (identifier, entry) in &index.artifacts {
            if !is_sha256_hex(&entry.sha256) {
                return Err(Error::ValidationFailed(format!(
                    "Catalog {index_path:?} pins '{identifier}' to an invalid sha256 '{}'",
                    entry.sha256
                )));
            }
        }

        let name = index.name.clone().unwrap_or_else(|| {
            root.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| root.display().to_string())
        });

        Ok(Self {
            name,
            root: root.to_path_buf(),
            index,
        })
    }
}

impl Catalog for DirectoryCatalog {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookup(&self, identifier: &str, kind: ArtifactKind) -> Result<Option<Artifact>> {
        let Some(entry) = self.index.artifacts.get(identifier) else {
            return Ok(None);
        };
        if entry.kind.is_some_and(|k| k != kind) {
            return Ok(None);
        }

        let root = if entry.path.is_absolute() {
            entry.path.clone()
        } else {
            self.root.join(&entry.path)
        };
        if !root.is_dir() {
            return Err(Error::ValidationFailed(format!(
                "Catalog '{}' pins '{identifier}' to missing directory {}",
                self.name,
                root.display()
            )));
        }

        Ok(Some(Artifact::from_root(
            identifier,
            kind,
            &self.name,
            root,
            entry.sha256.to_lowercase(),
        )))
    }

    fn known_identifiers(&self) -> Vec<String> {
        self.index.artifacts.keys().cloned().collect()
    }
}

/// Resolves identifiers against the host system.
///
/// Tools are looked up on the search path; libraries by their pkg-config
/// file under each prefix. The digest is the sha256 of the file found.
#[derive(Debug, Clone)]
pub struct HostCatalog {
    search_path: Option<OsString>,
    prefixes: Vec<PathBuf>,
}

impl HostCatalog {
    pub const NAME: &'static str = "host";

    pub fn new(search_path: Option<OsString>, prefixes: Vec<PathBuf>) -> Self {
        Self {
            search_path,
            prefixes,
        }
    }

    fn lookup_tool(&self, identifier: &str) -> Result<Option<Artifact>> {
        let cwd = std::env::current_dir()?;
        let found = match &self.search_path {
            Some(path) => which::which_in(identifier, Some(path), &cwd),
            None => which::which_in(identifier, std::env::var_os("PATH"), &cwd),
        };
        let Ok(exe) = found else {
            return Ok(None);
        };
        let Some(bin_dir) = exe.parent().map(Path::to_path_buf) else {
            return Ok(None);
        };

        debug!(identifier, exe = ?exe, "resolved host tool");
        let root = bin_dir.parent().map(Path::to_path_buf).unwrap_or_else(|| bin_dir.clone());
        Ok(Some(Artifact {
            identifier: identifier.to_string(),
            kind: ArtifactKind::Tool,
            catalog: Self::NAME.to_string(),
            root,
            digest: sha256_file(&exe)?,
            bin_dirs: vec![bin_dir],
            include_dirs: Vec::new(),
            lib_dirs: Vec::new(),
            pkgconfig_dirs: Vec::new(),
        }))
    }

    fn lookup_library(&self, identifier: &str) -> Result<Option<Artifact>> {
        let pc_name = format!("{identifier}.pc");
        let multiarch = format!("lib/{}-linux-gnu/pkgconfig", std::env::consts::ARCH);
        let candidates = [
            "lib/pkgconfig",
            "lib64/pkgconfig",
            multiarch.as_str(),
            "share/pkgconfig",
        ];

        for prefix in &self.prefixes {
            for dir in candidates {
                let pc_dir = prefix.join(dir);
                let pc_file = pc_dir.join(&pc_name);
                if !pc_file.is_file() {
                    continue;
                }

                debug!(identifier, pc = ?pc_file, "resolved host library");
                let lib_dir = match pc_dir.parent() {
                    Some(parent) if dir.starts_with("lib") => parent.to_path_buf(),
                    _ => prefix.join("lib"),
                };
                let include_dir = prefix.join("include");
                return Ok(Some(Artifact {
                    identifier: identifier.to_string(),
                    kind: ArtifactKind::Library,
                    catalog: Self::NAME.to_string(),
                    root: prefix.clone(),
                    digest: sha256_file(&pc_file)?,
                    bin_dirs: Vec::new(),
                    include_dirs: existing(vec![include_dir]),
                    lib_dirs: existing(vec![lib_dir]),
                    pkgconfig_dirs: vec![pc_dir],
                }));
            }
        }
        Ok(None)
    }
}

impl Catalog for HostCatalog {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn lookup(&self, identifier: &str, kind: ArtifactKind) -> Result<Option<Artifact>> {
        // Identifiers are names, never paths onto the host filesystem.
        if identifier.contains(std::path::is_separator) {
            return Ok(None);
        }
        match kind {
            ArtifactKind::Tool => self.lookup_tool(identifier),
            ArtifactKind::Library => self.lookup_library(identifier),
        }
    }
}

/// Ordered list of catalogs consulted during resolution.
#[derive(Debug, Default)]
pub struct CatalogSet {
    catalogs: Vec<Box<dyn Catalog>>,
}

impl CatalogSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalogs named by the configuration, in order, followed by the host
    /// catalog when enabled.
    pub fn from_config(config: &crate::Config) -> Result<Self> {
        let mut set = Self::new();
        for dir in &config.catalogs {
            set.push(DirectoryCatalog::load(dir)?);
        }
        if config.host_catalog {
            set.push(HostCatalog::new(None, config.host_prefixes.clone()));
        }
        Ok(set)
    }

    pub fn push<C: Catalog + 'static>(&mut self, catalog: C) {
        self.catalogs.push(Box::new(catalog));
    }

    pub fn names(&self) -> Vec<String> {
        self.catalogs.iter().map(|c| c.name().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.catalogs.is_empty()
    }

    /// Resolve one identifier; the first catalog that knows it wins.
    pub fn resolve(&self, identifier: &str, kind: ArtifactKind) -> Result<Artifact> {
        for catalog in &self.catalogs {
            if let Some(artifact) = catalog.lookup(identifier, kind)? {
                debug!(identifier, catalog = catalog.name(), digest = %artifact.digest, "resolved");
                return Ok(artifact);
            }
        }

        let known: Vec<String> = self
            .catalogs
            .iter()
            .flat_map(|c| c.known_identifiers())
            .collect();
        Err(Error::Resolution {
            identifier: identifier.to_string(),
            kind,
            catalogs: self.names(),
            similar: similar_identifiers(identifier, &known),
        })
    }
}

/// Known identifiers that look like a misspelling of `identifier`.
fn similar_identifiers(identifier: &str, known: &[String]) -> Vec<String> {
    let needle = identifier.to_lowercase();
    let mut similar: Vec<String> = known
        .iter()
        .filter(|k| {
            let k = k.to_lowercase();
            k != needle && (k.contains(&needle) || needle.contains(&k) || shares_prefix(&k, &needle, 3))
        })
        .cloned()
        .collect();
    similar.sort();
    similar.dedup();
    similar
}

fn shares_prefix(a: &str, b: &str, len: usize) -> bool {
    a.len() >= len && b.len() >= len && a.chars().take(len).eq(b.chars().take(len))
}

fn existing(dirs: Vec<PathBuf>) -> Vec<PathBuf> {
    dirs.into_iter().filter(|d| d.is_dir()).collect()
}

fn is_sha256_hex(value: &str) -> bool {
    value.len() == 64 && value.chars().all(|c| c.is_ascii_hexdigit())
}

/// Lowercase hex sha256 of a file's contents.
pub(crate) fn sha256_file(path: &Path) -> Result<String> {
    let content = std::fs::read(path).map_err(|e| Error::ReadFailed {
        path: path.to_path_buf(),
        error: e,
    })?;
    Ok(hex::encode(Sha256::digest(&content)))
}
