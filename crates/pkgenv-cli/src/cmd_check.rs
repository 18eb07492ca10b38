// Copyright (c) Contributors to the pkgenv project.
// SPDX-License-Identifier: Apache-2.0

//! Verify that the current environment matches the lock file.

use clap::Args;
use colored::Colorize;
use miette::Result;

/// Verify environment matches lock file
#[derive(Debug, Args)]
pub struct CmdCheck {
    #[clap(flatten)]
    discovery: crate::DiscoveryFlags,

    #[clap(flatten)]
    config: crate::ConfigFlags,

    /// Exit with error on mismatch
    #[clap(long)]
    strict: bool,
}

impl CmdCheck {
    pub async fn run(&mut self) -> Result<i32> {
        let resolved = crate::resolve(&self.discovery, &self.config)?;
        let lock_path = self.discovery.file.join(pkgenv::PKGENV_LOCK_FILENAME);

        if !lock_path.exists() {
            if self.strict {
                return Err(miette::miette!("No lock file found at {:?}", lock_path));
            }
            println!("{} No lock file found", "Warning:".yellow());
            return Ok(2);
        }

        let lock = pkgenv::LockFile::load(&lock_path)?;
        let changes = pkgenv::verify_lock(&lock, &resolved.composed, &resolved.env)?;

        if changes.is_empty() {
            println!("{} Environment matches lock file", "✓".green());
            return Ok(0);
        }

        if self.strict {
            eprintln!("{} Environment differs from lock file:", "Error:".red());
        } else {
            println!("{} Environment differs from lock file:", "Warning:".yellow());
        }

        for change in &changes {
            match change.kind {
                pkgenv::LockChangeKind::InputDigestChanged => {
                    println!("  - Input '{}' resolves differently", change.reference);
                    if let (Some(exp), Some(act)) = (&change.expected, &change.actual) {
                        println!("    Expected: {}", exp);
                        println!("    Actual:   {}", act);
                    }
                }
                pkgenv::LockChangeKind::SourceFileChanged => {
                    println!("  - Source file '{}' was modified", change.reference);
                }
                _ => {
                    println!("  - {}: {}", change.kind, change.reference);
                }
            }
        }

        if self.strict {
            return Ok(1);
        }

        println!("\nRun 'pkgenv lock --update' to update the lock file");
        Ok(0)
    }
}
