// Copyright (c) Contributors to the pkgenv project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `pkgenv load` command.

use clap::Args;
use colored::Colorize;
use miette::Result;

/// Run a command inside the environment
#[derive(Debug, Args)]
pub struct CmdLoad {
    #[clap(flatten)]
    pub discovery: crate::DiscoveryFlags,

    #[clap(flatten)]
    pub config: crate::ConfigFlags,

    /// Show what would be loaded without entering
    #[clap(long)]
    pub dry_run: bool,

    /// Command to run (default: $SHELL)
    #[clap(last = true)]
    pub command: Vec<String>,
}

impl CmdLoad {
    pub async fn run(&mut self) -> Result<i32> {
        let resolved = crate::resolve(&self.discovery, &self.config)?;
        let command = self.entry_command(&resolved.config);

        if self.dry_run {
            print!("{}", dry_run_report(&resolved, &command));
            return Ok(0);
        }

        tracing::info!(
            system = %resolved.env.system,
            inputs = resolved.env.artifacts.len(),
            "entering environment"
        );
        Ok(pkgenv::run_in_environment(&resolved.env, &command, None).await?)
    }

    /// The trailing command, or the configured shell, `$SHELL`, `/bin/sh`.
    fn entry_command(&self, config: &pkgenv::Config) -> Vec<String> {
        if !self.command.is_empty() {
            return self.command.clone();
        }
        vec![
            config
                .shell
                .clone()
                .or_else(|| std::env::var("SHELL").ok())
                .unwrap_or_else(|| "/bin/sh".to_string()),
        ]
    }
}

/// Files, inputs and startup script of the environment `command` would enter.
fn dry_run_report(resolved: &crate::Resolved, command: &[String]) -> String {
    let mut out = format!("{}\n", "Discovered files:".bold());
    for path in resolved.specs.iter().filter_map(|s| s.source_path.as_ref()) {
        out.push_str(&format!("  - {}\n", path.display()));
    }
    out.push_str(&format!("\n{} input(s):\n", resolved.env.artifacts.len()));
    for artifact in &resolved.env.artifacts {
        out.push_str(&format!(
            "  - {} {} ({})\n",
            artifact.kind,
            artifact.identifier.green(),
            artifact.catalog
        ));
    }
    out.push_str(&format!("\n{}\n", "Startup script:".bold()));
    out.push_str(&resolved.env.startup_script());
    out.push_str(&format!("\n{} {}\n", "Would run:".bold(), command.join(" ")));
    out
}
