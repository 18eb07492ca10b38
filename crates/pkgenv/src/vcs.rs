// Copyright (c) Contributors to the pkgenv project.
// SPDX-License-Identifier: Apache-2.0

//! Version-control backends.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::{Error, Result};

#[cfg(test)]
#[path = "./vcs_test.rs"]
mod vcs_test;

/// Version-control operations needed for versioning and source checkout.
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Number of commits reachable from the current revision.
    async fn commit_count(&self, dir: &Path) -> Result<u64>;

    /// Abbreviated identifier of the current revision.
    async fn short_revision(&self, dir: &Path) -> Result<String>;

    /// Clone `url` into `dest`, optionally checking out `rev`.
    async fn checkout(&self, url: &str, rev: Option<&str>, dest: &Path) -> Result<()>;
}

/// The `git` command-line client.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
}

impl Default for GitCli {
    fn default() -> Self {
        Self {
            program: PathBuf::from("git"),
        }
    }
}

impl GitCli {
    /// Use a specific git executable.
    pub fn with_program<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn output(&self, dir: &Path, args: &[&str]) -> Result<std::process::Output> {
        debug!(program = ?self.program, dir = ?dir, ?args, "running vcs command");
        Command::new(&self.program)
            .arg("-C")
            .arg(dir)
            .args(args)
            .output()
            .await
            .map_err(|e| Error::VcsUnavailable {
                program: self.program.display().to_string(),
                error: e,
            })
    }

    /// Run a read-only history query. Any failure means the working copy
    /// has no usable history.
    async fn query(&self, dir: &Path, args: &[&str]) -> Result<String> {
        let output = self.output(dir, args).await?;
        if !output.status.success() {
            return Err(Error::VcsNoHistory {
                path: dir.to_path_buf(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn command_line(&self, args: &[&str]) -> String {
        format!("{} {}", self.program.display(), args.join(" "))
    }
}

#[async_trait]
impl Vcs for GitCli {
    async fn commit_count(&self, dir: &Path) -> Result<u64> {
        let args = ["rev-list", "--count", "HEAD"];
        let out = self.query(dir, &args).await?;
        out.parse().map_err(|_| Error::VcsFailed {
            command: self.command_line(&args),
            code: None,
            message: format!("unexpected commit count '{out}'"),
        })
    }

    async fn short_revision(&self, dir: &Path) -> Result<String> {
        let out = self.query(dir, &["rev-parse", "--short", "HEAD"]).await?;
        if out.is_empty() {
            return Err(Error::VcsNoHistory {
                path: dir.to_path_buf(),
                message: "empty revision".to_string(),
            });
        }
        Ok(out)
    }

    async fn checkout(&self, url: &str, rev: Option<&str>, dest: &Path) -> Result<()> {
        let parent = dest.parent().unwrap_or(Path::new("."));
        let dest_arg = dest.to_string_lossy();
        let clone = ["clone", "--quiet", url, dest_arg.as_ref()];
        let output = self.output(parent, &clone).await?;
        if !output.status.success() {
            return Err(Error::VcsFailed {
                command: self.command_line(&clone),
                code: output.status.code(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        if let Some(rev) = rev {
            let switch = ["checkout", "--quiet", rev];
            let output = self.output(dest, &switch).await?;
            if !output.status.success() {
                return Err(Error::VcsFailed {
                    command: self.command_line(&switch),
                    code: output.status.code(),
                    message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                });
            }
        }
        Ok(())
    }
}
