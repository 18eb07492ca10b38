// Copyright (c) Contributors to the pkgenv project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `pkgenv version` command.

use std::path::PathBuf;

use clap::Args;
use miette::Result;

/// Print the computed version string
#[derive(Debug, Args)]
pub struct CmdVersion {
    /// Project directory
    #[clap(default_value = ".")]
    path: PathBuf,

    /// Metadata file holding the declared version, relative to the project
    #[clap(long, default_value = pkgenv::metadata::DEFAULT_METADATA_FILE)]
    metadata: PathBuf,
}

impl CmdVersion {
    pub async fn run(&mut self) -> Result<i32> {
        let vcs = pkgenv::GitCli::default();
        let version = pkgenv::resolve_version(&self.path, &self.metadata, &vcs).await?;
        println!("{version}");
        Ok(0)
    }
}
