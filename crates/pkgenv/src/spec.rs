// Copyright (c) Contributors to the pkgenv project.
// SPDX-License-Identifier: Apache-2.0

//! Spec file parsing and data types for .pkgenv.yaml files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::environment::EnvOp;
use crate::system::ANY_SYSTEM;

#[cfg(test)]
#[path = "./spec_test.rs"]
mod spec_test;

/// API version for spec files.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum ApiVersion {
    #[default]
    #[serde(rename = "pkgenv/v0")]
    V0,
}

/// Helper for two-stage deserialization to determine API version first.
#[derive(Deserialize)]
struct ApiVersionMapping {
    #[serde(default)]
    api: ApiVersion,
}

/// Tools and libraries required on one system.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct SystemInputs {
    /// Tools whose executables must be on PATH (compilers, build tools).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub native_build_inputs: Vec<String>,

    /// Libraries whose headers and shared objects must be discoverable.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub build_inputs: Vec<String>,
}

impl SystemInputs {
    pub fn is_empty(&self) -> bool {
        self.native_build_inputs.is_empty() && self.build_inputs.is_empty()
    }

    /// Append another set of inputs after this one.
    pub fn extend(&mut self, other: &SystemInputs) {
        self.native_build_inputs
            .extend(other.native_build_inputs.iter().cloned());
        self.build_inputs.extend(other.build_inputs.iter().cloned());
    }
}

/// Main environment specification from a .pkgenv.yaml file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EnvSpec {
    /// API version identifier.
    #[serde(default)]
    pub api: ApiVersion,

    /// Optional human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// In-tree inheritance control.
    /// When false (default), stops walking up directory tree.
    /// When true, discovers .pkgenv.yaml files in parent directories.
    #[serde(default)]
    pub inherit: bool,

    /// Out-of-tree includes loaded before in-tree discovery.
    /// Can use absolute paths, home-relative (~/) paths, or relative paths.
    /// Relative paths are resolved relative to this file's directory.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub includes: Vec<String>,

    /// Inputs keyed by system identifier (`x86_64-linux`, or `*` for all).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub systems: BTreeMap<String, SystemInputs>,

    /// Plain variables exported into the environment.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,

    /// Environment variable operations (set, prepend, append, comment, priority).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub environment: Vec<EnvOp>,

    /// Path to the file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl EnvSpec {
    /// Parse spec from YAML string.
    pub fn from_yaml<S: Into<String>>(yaml: S) -> crate::Result<Self> {
        let yaml = yaml.into();

        // Stage 1: Parse to get API version
        let value: serde_yaml::Value =
            serde_yaml::from_str(&yaml).map_err(|e| crate::Error::InvalidYaml {
                kind: "environment",
                error: e,
                yaml_content: yaml.clone(),
            })?;

        let with_version: ApiVersionMapping =
            serde_yaml::from_value(value.clone()).map_err(|e| crate::Error::InvalidYaml {
                kind: "environment",
                error: e,
                yaml_content: yaml.clone(),
            })?;

        // Stage 2: Deserialize based on version
        match with_version.api {
            ApiVersion::V0 => {
                serde_yaml::from_value(value).map_err(|e| crate::Error::InvalidYaml {
                    kind: "environment",
                    error: e,
                    yaml_content: yaml,
                })
            }
        }
    }

    /// Load spec from file path.
    pub fn load<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| crate::Error::ReadFailed {
            path: path.to_path_buf(),
            error: e,
        })?;

        let mut spec = Self::from_yaml(yaml)?;
        spec.source_path = Some(path.to_path_buf());
        Ok(spec)
    }

    /// Validate spec after loading.
    pub fn validate(&self) -> crate::Result<()> {
        if self.source_path.is_none() {
            return Err(crate::Error::ValidationFailed(
                "source_path must be set".to_string(),
            ));
        }

        for (system, inputs) in &self.systems {
            for id in inputs
                .native_build_inputs
                .iter()
                .chain(inputs.build_inputs.iter())
            {
                if id.trim().is_empty() {
                    return Err(crate::Error::ValidationFailed(format!(
                        "Empty identifier declared for system '{system}'"
                    )));
                }
            }
        }

        for name in self
            .variables
            .keys()
            .map(String::as_str)
            .chain(self.environment.iter().filter_map(EnvOp::variable))
        {
            if !is_valid_variable_name(name) {
                return Err(crate::Error::ValidationFailed(format!(
                    "Invalid environment variable name '{name}'"
                )));
            }
        }

        Ok(())
    }

    /// Inputs that apply to `system`: the `*` entry followed by the
    /// system-specific entry.
    ///
    /// Returns `None` when neither entry exists.
    pub fn inputs_for(&self, system: &str) -> Option<SystemInputs> {
        let any = self.systems.get(ANY_SYSTEM);
        let specific = match system {
            ANY_SYSTEM => None,
            _ => self.systems.get(system),
        };
        if any.is_none() && specific.is_none() {
            return None;
        }

        let mut inputs = SystemInputs::default();
        if let Some(any) = any {
            inputs.extend(any);
        }
        if let Some(specific) = specific {
            inputs.extend(specific);
        }
        Some(inputs)
    }

    /// Resolve relative includes to absolute paths.
    pub fn resolve_includes(&self) -> crate::Result<Vec<PathBuf>> {
        let base_dir = self
            .source_path
            .as_ref()
            .and_then(|p| p.parent())
            .ok_or_else(|| {
                crate::Error::ValidationFailed(
                    "Cannot resolve includes without source_path".to_string(),
                )
            })?;

        self.includes
            .iter()
            .map(|include| crate::discovery::resolve_include_path(include, Some(base_dir)))
            .collect()
    }
}

/// POSIX portable variable name: letters, digits and underscores, not
/// starting with a digit.
pub(crate) fn is_valid_variable_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
