// Copyright (c) Contributors to the pkgenv project.
// SPDX-License-Identifier: Apache-2.0

//! Reading the declared version from project metadata (`Cargo.toml`).

use std::path::Path;

use crate::Error;

#[cfg(test)]
#[path = "./metadata_test.rs"]
mod metadata_test;

/// Default project metadata file, relative to the project directory.
pub const DEFAULT_METADATA_FILE: &str = "Cargo.toml";

/// Read the declared version from a Cargo manifest on disk.
pub fn read_declared_version(path: &Path) -> crate::Result<String> {
    let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::MetadataMissing {
            path: path.to_path_buf(),
        },
        _ => Error::ReadFailed {
            path: path.to_path_buf(),
            error: e,
        },
    })?;
    parse_declared_version(&content, path)
}

/// Extract the declared version from Cargo manifest text.
///
/// `package.version` is used directly; `version.workspace = true` falls back
/// to `workspace.package.version` in the same manifest.
pub fn parse_declared_version(content: &str, path: &Path) -> crate::Result<String> {
    let manifest: toml::Table = toml::from_str(content).map_err(|e| Error::MetadataInvalid {
        path: path.to_path_buf(),
        error: e,
    })?;

    let package_version = manifest
        .get("package")
        .and_then(|p| p.get("version"));
    let workspace_version = manifest
        .get("workspace")
        .and_then(|w| w.get("package"))
        .and_then(|p| p.get("version"));

    let value = match package_version {
        Some(toml::Value::Table(t)) if t.get("workspace").and_then(toml::Value::as_bool) == Some(true) => {
            workspace_version.ok_or_else(|| Error::MetadataMissing {
                path: path.to_path_buf(),
            })?
        }
        Some(v) => v,
        None => workspace_version.ok_or_else(|| Error::MetadataMissing {
            path: path.to_path_buf(),
        })?,
    };

    let version = value.as_str().ok_or_else(|| Error::MetadataMalformed {
        path: path.to_path_buf(),
        reason: format!("expected a string, found {}", value.type_str()),
    })?;
    validate_version(version).map_err(|reason| Error::MetadataMalformed {
        path: path.to_path_buf(),
        reason,
    })?;

    Ok(version.to_string())
}

/// Check a version string is usable as the static part of a package version.
fn validate_version(version: &str) -> Result<(), String> {
    if version.is_empty() {
        return Err("version is empty".to_string());
    }
    if let Some(c) = version
        .chars()
        .find(|c| c.is_whitespace() || matches!(c, '-' | ':' | '/'))
    {
        return Err(format!("version '{version}' contains invalid character {c:?}"));
    }
    if !version.starts_with(|c: char| c.is_ascii_alphanumeric()) {
        return Err(format!("version '{version}' must start with a letter or digit"));
    }
    Ok(())
}
