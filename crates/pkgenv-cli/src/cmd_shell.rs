// Copyright (c) Contributors to the pkgenv project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `pkgenv shell` command.

use clap::Args;
use miette::Result;

/// Enter interactive shell in environment
#[derive(Debug, Args)]
pub struct CmdShell {
    #[clap(flatten)]
    discovery: crate::DiscoveryFlags,

    #[clap(flatten)]
    config: crate::ConfigFlags,

    /// Shell to use
    #[clap(long)]
    shell: Option<String>,
}

impl CmdShell {
    pub async fn run(&mut self) -> Result<i32> {
        // Without an explicit shell, load picks the configured one or $SHELL.
        let command = self.shell.clone().into_iter().collect();

        let mut load_cmd = super::cmd_load::CmdLoad {
            discovery: self.discovery.clone(),
            config: self.config.clone(),
            dry_run: false,
            command,
        };

        load_cmd.run().await
    }
}
