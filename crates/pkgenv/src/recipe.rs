// Copyright (c) Contributors to the pkgenv project.
// SPDX-License-Identifier: Apache-2.0

//! Build recipe files (`pkgenv.recipe.yaml`).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::metadata::DEFAULT_METADATA_FILE;
use crate::sources::{SKIP_CHECKSUM, SourceSpec};
use crate::stage::{Stage, StageKind};
use crate::{Error, Result};

#[cfg(test)]
#[path = "./recipe_test.rs"]
mod recipe_test;

/// API version for recipe files.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum RecipeApiVersion {
    #[default]
    #[serde(rename = "pkgenv/v0/recipe")]
    V0,
}

#[derive(Deserialize)]
struct RecipeApiVersionMapping {
    #[serde(default)]
    api: RecipeApiVersion,
}

/// A stage as written: a bare script, or a script with a network policy.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum StageDef {
    Script(String),
    Detailed {
        run: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        offline: Option<bool>,
    },
}

impl StageDef {
    fn to_stage(&self, kind: StageKind) -> Stage {
        match self {
            StageDef::Script(script) => Stage::new(kind, script.clone()),
            StageDef::Detailed { run, offline } => Stage {
                offline: offline.unwrap_or(kind.default_offline()),
                ..Stage::new(kind, run.clone())
            },
        }
    }
}

/// How the package is built: metadata for `.PKGINFO` plus ordered stages.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BuildRecipe {
    #[serde(default)]
    pub api: RecipeApiVersion,

    pub name: String,

    /// Informational only; the packaged version is derived from
    /// `version_from` and VCS history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default = "default_release")]
    pub release: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arch: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub license: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub build_depends: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provides: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<String>,

    /// Packaging options; a leading `!` disables one (`!strip`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,

    /// Metadata file holding the declared version, relative to the recipe.
    /// A leading `$srcdir/` resolves it inside the fetched sources instead.
    #[serde(default = "default_version_from")]
    pub version_from: PathBuf,

    #[serde(default)]
    pub stages: BTreeMap<StageKind, StageDef>,

    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

const SRCDIR_PREFIXES: [&str; 2] = ["$srcdir", "${srcdir}"];

fn default_release() -> u32 {
    1
}

fn default_version_from() -> PathBuf {
    PathBuf::from(DEFAULT_METADATA_FILE)
}

impl BuildRecipe {
    pub fn from_yaml<S: Into<String>>(yaml: S) -> Result<Self> {
        let yaml = yaml.into();
        let invalid = |e: serde_yaml::Error, yaml: &str| Error::InvalidYaml {
            kind: "recipe",
            error: e,
            yaml_content: yaml.to_string(),
        };

        let value: serde_yaml::Value = serde_yaml::from_str(&yaml).map_err(|e| invalid(e, &yaml))?;
        let with_version: RecipeApiVersionMapping =
            serde_yaml::from_value(value.clone()).map_err(|e| invalid(e, &yaml))?;

        match with_version.api {
            RecipeApiVersion::V0 => serde_yaml::from_value(value).map_err(|e| invalid(e, &yaml)),
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| Error::ReadFailed {
            path: path.to_path_buf(),
            error: e,
        })?;

        let mut recipe = Self::from_yaml(yaml)?;
        recipe.source_path = Some(path.to_path_buf());
        Ok(recipe)
    }

    /// Directory holding the recipe, or the current directory for recipes
    /// parsed from a string.
    pub fn startdir(&self) -> PathBuf {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Base directory and relative path of the version metadata file.
    pub fn version_location<'a>(
        &'a self,
        startdir: &'a Path,
        srcdir: &'a Path,
    ) -> (&'a Path, &'a Path) {
        for prefix in SRCDIR_PREFIXES {
            if let Ok(rest) = self.version_from.strip_prefix(prefix) {
                return (srcdir, rest);
            }
        }
        (startdir, &self.version_from)
    }

    /// Declared stages in execution order.
    pub fn stages(&self) -> Vec<Stage> {
        StageKind::ALL
            .iter()
            .filter_map(|kind| self.stages.get(kind).map(|def| def.to_stage(*kind)))
            .collect()
    }

    /// Structural checks plus the offline rule for every stage.
    ///
    /// Everything reported here is a configuration error: nothing has run yet.
    pub fn validate(&self) -> Result<()> {
        if !is_valid_package_name(&self.name) {
            return Err(Error::ValidationFailed(format!(
                "Invalid package name '{}': use lowercase letters, digits and '@._+-', not starting with '-' or '.'",
                self.name
            )));
        }
        if self.release == 0 {
            return Err(Error::ValidationFailed(
                "release must be at least 1".to_string(),
            ));
        }
        let (_, metadata_file) = self.version_location(Path::new("."), Path::new("."));
        if metadata_file.as_os_str().is_empty() {
            return Err(Error::ValidationFailed(
                "version_from must name a metadata file".to_string(),
            ));
        }

        for source in &self.sources {
            source.validate()?;
            if source.sha256 == SKIP_CHECKSUM && !source.is_vcs() {
                return Err(Error::ValidationFailed(format!(
                    "Source {} skips its checksum; only VCS sources may use SKIP",
                    source.url
                )));
            }
        }

        for option in &self.options {
            let name = option.strip_prefix('!').unwrap_or(option);
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(Error::ValidationFailed(format!(
                    "Invalid option '{option}'"
                )));
            }
        }

        for stage in self.stages() {
            if stage.script.trim().is_empty() {
                return Err(Error::ValidationFailed(format!(
                    "Stage '{}' has an empty script",
                    stage.kind
                )));
            }
            stage.check_offline()?;
        }
        Ok(())
    }

    /// Whether `option` is enabled; options are off unless listed.
    pub fn option_enabled(&self, option: &str) -> bool {
        self.options.iter().rev().find_map(|o| match o.strip_prefix('!') {
            Some(name) if name == option => Some(false),
            None if o == option => Some(true),
            _ => None,
        }) == Some(true)
    }
}

fn is_valid_package_name(name: &str) -> bool {
    match name.chars().next() {
        None | Some('-') | Some('.') => return false,
        _ => {}
    }
    name.chars().all(|c| {
        c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '@' | '.' | '_' | '+' | '-')
    })
}
