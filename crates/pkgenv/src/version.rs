// Copyright (c) Contributors to the pkgenv project.
// SPDX-License-Identifier: Apache-2.0

//! Version strings derived from project metadata and VCS history.

use std::fmt;
use std::path::Path;

use tracing::{debug, info};

use crate::metadata::read_declared_version;
use crate::vcs::Vcs;

#[cfg(test)]
#[path = "./version_test.rs"]
mod version_test;

/// `<declared_version>_r<commit_count>.<short_commit_hash>`
///
/// Recomputed on every invocation and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionString(String);

impl VersionString {
    pub fn new(declared: &str, commit_count: u64, short_hash: &str) -> Self {
        Self(format!("{declared}_r{commit_count}.{short_hash}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for VersionString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Compute the version of the project in `project_dir`.
///
/// `metadata_file` is resolved relative to `project_dir`. History is read
/// from the directory holding the metadata file, so a manifest inside a
/// checkout is versioned by that checkout.
pub async fn resolve_version(
    project_dir: &Path,
    metadata_file: &Path,
    vcs: &dyn Vcs,
) -> crate::Result<VersionString> {
    let metadata_path = project_dir.join(metadata_file);
    let declared = read_declared_version(&metadata_path)?;
    let history_dir = match metadata_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => project_dir,
    };
    debug!(dir = ?history_dir, "reading history");
    let count = vcs.commit_count(history_dir).await?;
    let hash = vcs.short_revision(history_dir).await?;

    let version = VersionString::new(&declared, count, &hash);
    info!(%version, "resolved version");
    Ok(version)
}
