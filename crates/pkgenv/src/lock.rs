// Copyright (c) Contributors to the pkgenv project.
// SPDX-License-Identifier: Apache-2.0

//! Lock files recording what an environment resolved to.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{ArtifactKind, sha256_file};
use crate::{ComposedEnvironment, Error, MaterializedEnvironment};

#[cfg(test)]
#[path = "./lock_test.rs"]
mod lock_test;

/// Lock file API version.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub enum LockApiVersion {
    #[serde(rename = "pkgenv/v0/lock")]
    V0,
}

/// Environment files and resolved inputs at the time of locking.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct LockFile {
    pub api: LockApiVersion,
    pub generated: GenerationMetadata,
    pub sources: Vec<SourceFile>,
    pub inputs: Vec<LockedInput>,
}

/// Metadata about when and where the lock was generated.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct GenerationMetadata {
    pub timestamp: DateTime<Utc>,
    pub pkgenv_version: String,
    pub hostname: String,
    pub system: String,
}

/// Environment file tracked by the lock.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub sha256: String,
    pub mtime: DateTime<Utc>,
}

/// A resolved tool or library.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct LockedInput {
    pub identifier: String,
    pub kind: ArtifactKind,
    pub catalog: String,
    pub digest: String,
}

impl LockFile {
    pub fn load<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| Error::ReadFailed {
            path: path.to_path_buf(),
            error: e,
        })?;
        serde_yaml::from_str(&yaml).map_err(|e| Error::InvalidYaml {
            kind: "lock",
            error: e,
            yaml_content: yaml,
        })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let yaml = serde_yaml::to_string(self).map_err(|e| {
            Error::ValidationFailed(format!("Failed to serialize lock file: {e}"))
        })?;
        std::fs::write(path, yaml)?;
        Ok(())
    }
}

/// Generate a lock file from a composed environment and its resolution.
pub fn generate_lock(
    composed: &ComposedEnvironment,
    materialized: &MaterializedEnvironment,
) -> crate::Result<LockFile> {
    let mut sources = Vec::new();
    for path in &composed.source_files {
        let sha256 = sha256_file(path)?;
        let mtime = std::fs::metadata(path)?
            .modified()
            .ok()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(Utc::now);

        sources.push(SourceFile {
            path: path.clone(),
            sha256,
            mtime,
        });
    }

    Ok(LockFile {
        api: LockApiVersion::V0,
        generated: GenerationMetadata {
            timestamp: Utc::now(),
            pkgenv_version: env!("CARGO_PKG_VERSION").to_string(),
            hostname: hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| "unknown".to_string()),
            system: materialized.system.clone(),
        },
        sources,
        inputs: locked_inputs(materialized),
    })
}

fn locked_inputs(materialized: &MaterializedEnvironment) -> Vec<LockedInput> {
    materialized
        .artifacts
        .iter()
        .map(|a| LockedInput {
            identifier: a.identifier.clone(),
            kind: a.kind,
            catalog: a.catalog.clone(),
            digest: a.digest.clone(),
        })
        .collect()
}

/// Compare a lock against the current environment.
///
/// An empty result means the environment still resolves exactly as locked.
pub fn verify_lock(
    lock: &LockFile,
    composed: &ComposedEnvironment,
    materialized: &MaterializedEnvironment,
) -> crate::Result<Vec<LockChange>> {
    let mut changes = Vec::new();

    for source in &lock.sources {
        if !composed.source_files.contains(&source.path) || !source.path.exists() {
            changes.push(LockChange {
                kind: LockChangeKind::SourceFileRemoved,
                reference: source.path.display().to_string(),
                expected: Some(source.sha256.clone()),
                actual: None,
            });
            continue;
        }
        let actual = sha256_file(&source.path)?;
        if actual != source.sha256 {
            changes.push(LockChange {
                kind: LockChangeKind::SourceFileChanged,
                reference: source.path.display().to_string(),
                expected: Some(source.sha256.clone()),
                actual: Some(actual),
            });
        }
    }
    for path in &composed.source_files {
        if !lock.sources.iter().any(|s| &s.path == path) {
            changes.push(LockChange {
                kind: LockChangeKind::SourceFileAdded,
                reference: path.display().to_string(),
                expected: None,
                actual: None,
            });
        }
    }

    let current = locked_inputs(materialized);
    let find = |inputs: &[LockedInput], needle: &LockedInput| -> Option<LockedInput> {
        inputs
            .iter()
            .find(|i| i.identifier == needle.identifier && i.kind == needle.kind)
            .cloned()
    };
    for locked in &lock.inputs {
        match find(&current, locked) {
            None => changes.push(LockChange {
                kind: LockChangeKind::InputRemoved,
                reference: locked.identifier.clone(),
                expected: Some(locked.digest.clone()),
                actual: None,
            }),
            Some(actual) if actual.digest != locked.digest || actual.catalog != locked.catalog => {
                changes.push(LockChange {
                    kind: LockChangeKind::InputDigestChanged,
                    reference: locked.identifier.clone(),
                    expected: Some(format!("{}@{}", locked.catalog, locked.digest)),
                    actual: Some(format!("{}@{}", actual.catalog, actual.digest)),
                })
            }
            Some(_) => {}
        }
    }
    for input in &current {
        if find(&lock.inputs, input).is_none() {
            changes.push(LockChange {
                kind: LockChangeKind::InputAdded,
                reference: input.identifier.clone(),
                expected: None,
                actual: Some(input.digest.clone()),
            });
        }
    }

    Ok(changes)
}

/// A single detected change between lock and current environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockChange {
    pub kind: LockChangeKind,
    pub reference: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

/// Types of lock mismatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockChangeKind {
    InputDigestChanged,
    InputAdded,
    InputRemoved,
    SourceFileChanged,
    SourceFileAdded,
    SourceFileRemoved,
}

impl std::fmt::Display for LockChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            LockChangeKind::InputDigestChanged => "input changed",
            LockChangeKind::InputAdded => "input added",
            LockChangeKind::InputRemoved => "input removed",
            LockChangeKind::SourceFileChanged => "file changed",
            LockChangeKind::SourceFileAdded => "file added",
            LockChangeKind::SourceFileRemoved => "file removed",
        };
        f.write_str(label)
    }
}
