// Copyright (c) Contributors to the pkgenv project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `pkgenv build` command.

use std::path::{Path, PathBuf};

use clap::Args;
use colored::Colorize;
use miette::Result;

/// Run a build recipe inside the environment
#[derive(Debug, Args)]
pub struct CmdBuild {
    /// Recipe file, or a directory containing pkgenv.recipe.yaml
    #[clap(short = 'r', long, default_value = ".")]
    recipe: PathBuf,

    #[clap(flatten)]
    discovery: crate::DiscoveryFlags,

    #[clap(flatten)]
    config: crate::ConfigFlags,

    /// Skip the check stage
    #[clap(long)]
    nocheck: bool,

    /// Do not fetch sources; use what is already in srcdir
    #[clap(long)]
    skip_fetch: bool,

    /// Working directory holding src/ and pkg/
    #[clap(long, env = "PKGENV_BUILD_DIR")]
    build_dir: Option<PathBuf>,
}

impl CmdBuild {
    pub async fn run(&mut self) -> Result<i32> {
        let recipe_path = recipe_path(&self.recipe);
        let recipe = pkgenv::BuildRecipe::load(&recipe_path)?;

        let specs = match self.discovery.discover() {
            Ok(specs) => specs,
            Err(err) if self.discovery.includes.is_empty() && is_not_found(&err) => {
                tracing::warn!("no .pkgenv.yaml found; building with the base environment only");
                Vec::new()
            }
            Err(err) => return Err(err),
        };
        let resolved = crate::resolve_specs(specs, &self.config)?;

        let build_dir = self
            .build_dir
            .clone()
            .or_else(|| resolved.config.build_dir.clone());
        let mut options = pkgenv::BuildOptions::for_recipe(&recipe, build_dir.as_deref());
        options.skip_check = self.nocheck;
        options.skip_fetch = self.skip_fetch;

        let runner = pkgenv::ShellRunner::default();
        let vcs = pkgenv::GitCli::default();

        match pkgenv::run_recipe(&recipe, &resolved.env, &runner, &vcs, &options).await {
            Ok(report) => {
                println!(
                    "{} {} {}",
                    "Built".green().bold(),
                    report.name,
                    report.version.to_string().cyan()
                );
                println!("  stages: {}", join_stages(&report.stages));
                println!("  target: {}", report.pkgdir.display());
                if let Some(pkginfo) = &report.pkginfo {
                    println!("  metadata: {}", pkginfo.display());
                }
                Ok(0)
            }
            Err(
                err @ (pkgenv::Error::StageFailed { .. } | pkgenv::Error::StageTerminated { .. }),
            ) => {
                let code = err.exit_code();
                eprintln!("{:?}", miette::Report::new(err));
                Ok(code)
            }
            Err(err) => Err(err.into()),
        }
    }
}

fn recipe_path(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(pkgenv::RECIPE_FILENAME)
    } else {
        path.to_path_buf()
    }
}

fn is_not_found(err: &miette::Report) -> bool {
    matches!(
        err.downcast_ref::<pkgenv::Error>(),
        Some(pkgenv::Error::NotFoundInTree(_) | pkgenv::Error::NotFoundAtPath(_))
    )
}

fn join_stages(stages: &[pkgenv::StageKind]) -> String {
    stages
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}
