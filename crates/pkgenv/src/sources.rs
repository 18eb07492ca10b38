// Copyright (c) Contributors to the pkgenv project.
// SPDX-License-Identifier: Apache-2.0

//! Fetching and verifying a recipe's source list.
//!
//! Sources are fetched into `srcdir` before the first stage runs. Files are
//! checked against their pinned sha256. VCS checkouts must pin `SKIP`; their
//! revision fragment identifies the content.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::vcs::Vcs;
use crate::{Error, Result};

#[cfg(test)]
#[path = "./sources_test.rs"]
mod sources_test;

/// Checksum placeholder accepted for VCS sources.
pub const SKIP_CHECKSUM: &str = "SKIP";

const VCS_PREFIX: &str = "git+";

/// One entry of the recipe's `sources` list.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SourceSpec {
    /// `https://...`, `git+<url>#tag=<rev>`, or a path relative to the recipe.
    pub url: String,
    /// Lowercase hex sha256, or `SKIP` for VCS sources.
    pub sha256: String,
    /// Name inside `srcdir`; derived from the URL when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// Where a source comes from, parsed from its URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    Http(String),
    Vcs { url: String, revision: Option<String> },
    Local(PathBuf),
}

impl SourceSpec {
    pub fn is_vcs(&self) -> bool {
        self.url.starts_with(VCS_PREFIX)
    }

    pub fn location(&self) -> Result<SourceLocation> {
        if let Some(rest) = self.url.strip_prefix(VCS_PREFIX) {
            let (url, fragment) = match rest.split_once('#') {
                Some((url, fragment)) => (url, Some(fragment)),
                None => (rest, None),
            };
            let revision = match fragment {
                None => None,
                Some(fragment) => {
                    let (key, value) = fragment.split_once('=').ok_or_else(|| {
                        Error::ValidationFailed(format!(
                            "Invalid fragment '#{fragment}' in source {}",
                            self.url
                        ))
                    })?;
                    if !matches!(key, "branch" | "tag" | "commit") || value.is_empty() {
                        return Err(Error::ValidationFailed(format!(
                            "Unsupported fragment '#{fragment}' in source {}; use branch=, tag= or commit=",
                            self.url
                        )));
                    }
                    Some(value.to_string())
                }
            };
            return Ok(SourceLocation::Vcs {
                url: url.to_string(),
                revision,
            });
        }
        if self.url.starts_with("https://") || self.url.starts_with("http://") {
            return Ok(SourceLocation::Http(self.url.clone()));
        }
        let path = self.url.strip_prefix("file://").unwrap_or(&self.url);
        Ok(SourceLocation::Local(PathBuf::from(path)))
    }

    /// Name of the fetched file or checkout directory inside `srcdir`.
    pub fn target_name(&self) -> String {
        if let Some(name) = &self.filename {
            return name.clone();
        }
        let trimmed = self.url.split(['#', '?']).next().unwrap_or(&self.url);
        let last = trimmed.trim_end_matches('/').rsplit('/').next().unwrap_or(trimmed);
        let last = if self.is_vcs() {
            last.strip_suffix(".git").unwrap_or(last)
        } else {
            last
        };
        let sanitized: String = last
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if sanitized.is_empty() || sanitized.chars().all(|c| c == '.') {
            format!("source-{}", &hex::encode(Sha256::digest(self.url.as_bytes()))[..16])
        } else {
            sanitized
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::ValidationFailed("Source with empty url".to_string()));
        }
        if self.sha256 != SKIP_CHECKSUM
            && !(self.sha256.len() == 64 && self.sha256.chars().all(|c| c.is_ascii_hexdigit()))
        {
            return Err(Error::ValidationFailed(format!(
                "Source {} has an invalid sha256 '{}'",
                self.url, self.sha256
            )));
        }
        if self.is_vcs() && self.sha256 != SKIP_CHECKSUM {
            return Err(Error::ValidationFailed(format!(
                "Source {} is a VCS checkout and cannot be verified by sha256; use SKIP and pin a #tag= or #commit=",
                self.url
            )));
        }
        if let Some(name) = &self.filename {
            if name.is_empty() || name.contains('/') || name == "." || name == ".." {
                return Err(Error::ValidationFailed(format!(
                    "Source {} has an invalid filename '{name}'",
                    self.url
                )));
            }
        }
        self.location().map(|_| ())
    }
}

/// Fetch every source into `srcdir`, verifying checksums.
///
/// Relative local paths resolve against `startdir`. Returns the fetched
/// paths in source order.
pub async fn fetch_sources(
    sources: &[SourceSpec],
    startdir: &Path,
    srcdir: &Path,
    vcs: &dyn Vcs,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(srcdir).await?;
    let mut fetched = Vec::with_capacity(sources.len());
    for source in sources {
        source.validate()?;
        let dest = srcdir.join(source.target_name());
        match source.location()? {
            SourceLocation::Vcs { url, revision } => {
                if fs::try_exists(&dest).await? {
                    fs::remove_dir_all(&dest).await?;
                }
                info!(url = %url, revision = ?revision, "checking out source");
                vcs.checkout(&url, revision.as_deref(), &dest).await?;
            }
            SourceLocation::Http(url) => {
                fetch_http(&url, &source.sha256, &dest).await?;
            }
            SourceLocation::Local(path) => {
                let path = if path.is_absolute() {
                    path
                } else {
                    startdir.join(path)
                };
                copy_local(&path, &source.url, &source.sha256, &dest).await?;
            }
        }
        fetched.push(dest);
    }
    Ok(fetched)
}

async fn fetch_http(url: &str, expected_sha256: &str, dest: &Path) -> Result<()> {
    if fs::try_exists(dest).await? {
        debug!(path = ?dest, "checking previously fetched file");
        if let Ok(actual) = hash_file(dest).await {
            if actual.eq_ignore_ascii_case(expected_sha256) {
                info!(path = ?dest, "source already present");
                return Ok(());
            }
        }
    }

    info!(url = %url, "fetching source");
    let response = reqwest::get(url).await.map_err(|e| Error::FetchFailed {
        url: url.to_string(),
        message: e.to_string(),
    })?;
    if !response.status().is_success() {
        return Err(Error::FetchFailed {
            url: url.to_string(),
            message: format!("HTTP {}", response.status()),
        });
    }
    let bytes = response.bytes().await.map_err(|e| Error::FetchFailed {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    verify(url, expected_sha256, &hex::encode(Sha256::digest(&bytes)))?;

    let mut file = fs::File::create(dest).await?;
    file.write_all(&bytes).await?;
    file.flush().await?;
    info!(path = ?dest, size = bytes.len(), "download complete");
    Ok(())
}

async fn copy_local(path: &Path, url: &str, expected_sha256: &str, dest: &Path) -> Result<()> {
    let bytes = fs::read(path).await.map_err(|e| Error::ReadFailed {
        path: path.to_path_buf(),
        error: e,
    })?;
    verify(url, expected_sha256, &hex::encode(Sha256::digest(&bytes)))?;
    if path != dest {
        fs::write(dest, &bytes).await?;
    }
    debug!(from = ?path, to = ?dest, "copied local source");
    Ok(())
}

fn verify(url: &str, expected: &str, actual: &str) -> Result<()> {
    if expected == SKIP_CHECKSUM {
        return Err(Error::ValidationFailed(format!(
            "Source {url} skips its checksum; only VCS sources may use SKIP"
        )));
    }
    if !actual.eq_ignore_ascii_case(expected) {
        return Err(Error::ChecksumMismatch {
            url: url.to_string(),
            expected: expected.to_lowercase(),
            actual: actual.to_string(),
        });
    }
    Ok(())
}

async fn hash_file(path: &Path) -> std::io::Result<String> {
    let bytes = fs::read(path).await?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}
