// Copyright (c) Contributors to the pkgenv project.
// SPDX-License-Identifier: Apache-2.0

//! Generate or update lock files for pkgenv environments.

use clap::Args;
use miette::Result;

/// Generate or update lock file
#[derive(Debug, Args)]
pub struct CmdLock {
    #[clap(flatten)]
    discovery: crate::DiscoveryFlags,

    #[clap(flatten)]
    config: crate::ConfigFlags,

    /// Update existing lock file
    #[clap(long)]
    update: bool,

    /// Verify lock is current (exit 1 if not)
    #[clap(long)]
    check: bool,
}

impl CmdLock {
    pub async fn run(&mut self) -> Result<i32> {
        let resolved = crate::resolve(&self.discovery, &self.config)?;
        let lock_path = self.discovery.file.join(pkgenv::PKGENV_LOCK_FILENAME);

        if self.check {
            if !lock_path.exists() {
                eprintln!("No lock file found at {:?}", lock_path);
                return Ok(2);
            }

            let lock = pkgenv::LockFile::load(&lock_path)?;
            let changes = pkgenv::verify_lock(&lock, &resolved.composed, &resolved.env)?;

            if !changes.is_empty() {
                eprintln!("Lock file is out of date:");
                for change in &changes {
                    eprintln!("  - {}: {}", change.kind, change.reference);
                }
                return Ok(1);
            }

            println!("Lock file is up to date");
            return Ok(0);
        }

        if lock_path.exists() && !self.update {
            return Err(miette::miette!(
                "Lock file already exists at {:?}. Use --update to regenerate it",
                lock_path
            ));
        }

        let lock = pkgenv::generate_lock(&resolved.composed, &resolved.env)?;
        lock.save(&lock_path)?;
        println!(
            "Generated lock file: {:?} ({} input(s))",
            lock_path,
            lock.inputs.len()
        );

        Ok(0)
    }
}
