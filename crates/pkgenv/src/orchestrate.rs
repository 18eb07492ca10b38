// Copyright (c) Contributors to the pkgenv project.
// SPDX-License-Identifier: Apache-2.0

//! Runs a build recipe's stages inside a materialized environment.
//!
//! A run always starts from scratch: the target root is emptied, sources are
//! fetched, the version is resolved and every declared stage runs in order.
//! The first failing stage aborts the run; nothing is kept for resuming.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::materialize::MaterializedEnvironment;
use crate::pkginfo::{PkgInfo, installed_size};
use crate::recipe::BuildRecipe;
use crate::sources::fetch_sources;
use crate::stage::{StageContext, StageKind, StageRunner};
use crate::system::system_arch;
use crate::vcs::Vcs;
use crate::version::{VersionString, resolve_version};

#[cfg(test)]
#[path = "./orchestrate_test.rs"]
mod orchestrate_test;

/// Default build directory name, next to the recipe.
pub const DEFAULT_BUILD_DIR: &str = ".pkgenv-build";

/// Directories and switches for one run.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Directory holding the recipe; relative sources and `version_from`
    /// resolve against it unless `version_from` starts with `$srcdir/`.
    pub startdir: PathBuf,
    pub srcdir: PathBuf,
    /// Target root that `package` installs into.
    pub pkgdir: PathBuf,
    /// Skip the `check` stage.
    pub skip_check: bool,
    /// Use whatever is already in `srcdir`.
    pub skip_fetch: bool,
}

impl BuildOptions {
    /// `src/` and `pkg/` under `build_dir`, which defaults to
    /// `.pkgenv-build` in the recipe directory.
    pub fn for_recipe(recipe: &BuildRecipe, build_dir: Option<&Path>) -> Self {
        let startdir = recipe.startdir();
        let build_dir = match build_dir {
            Some(dir) if dir.is_absolute() => dir.to_path_buf(),
            Some(dir) => startdir.join(dir),
            None => startdir.join(DEFAULT_BUILD_DIR),
        };
        Self {
            srcdir: build_dir.join("src"),
            pkgdir: build_dir.join("pkg"),
            startdir,
            skip_check: false,
            skip_fetch: false,
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub name: String,
    pub version: VersionString,
    /// Stages that ran, in order.
    pub stages: Vec<StageKind>,
    pub pkgdir: PathBuf,
    /// Written after `package` succeeds.
    pub pkginfo: Option<PathBuf>,
}

/// Execute `recipe` inside `env`.
///
/// The recipe is validated (including the offline rule) before anything is
/// touched. A stage exiting non-zero stops the run with
/// [`crate::Error::StageFailed`]; later stages are not invoked.
pub async fn run_recipe(
    recipe: &BuildRecipe,
    env: &MaterializedEnvironment,
    runner: &dyn StageRunner,
    vcs: &dyn Vcs,
    options: &BuildOptions,
) -> crate::Result<BuildReport> {
    recipe.validate()?;
    let stages = recipe.stages();
    if stages.is_empty() {
        warn!(recipe = %recipe.name, "recipe declares no stages");
    }

    reset_dir(&options.pkgdir).await?;
    tokio::fs::create_dir_all(&options.srcdir).await?;

    if !options.skip_fetch && !recipe.sources.is_empty() {
        fetch_sources(&recipe.sources, &options.startdir, &options.srcdir, vcs).await?;
    }

    let (version_dir, metadata_file) = recipe.version_location(&options.startdir, &options.srcdir);
    let version = resolve_version(version_dir, metadata_file, vcs).await?;
    let arch = system_arch(&env.system).to_string();

    let ctx = StageContext {
        env,
        startdir: options.startdir.clone(),
        srcdir: options.srcdir.clone(),
        pkgdir: options.pkgdir.clone(),
        variables: BTreeMap::from([
            ("pkgname".to_string(), recipe.name.clone()),
            ("pkgver".to_string(), version.to_string()),
            ("pkgrel".to_string(), recipe.release.to_string()),
            ("CARCH".to_string(), arch.clone()),
        ]),
    };

    let mut ran = Vec::with_capacity(stages.len());
    for stage in &stages {
        if stage.kind == StageKind::Check && options.skip_check {
            info!("skipping check stage");
            continue;
        }
        stage.run(&ctx, runner).await?;
        ran.push(stage.kind);
    }

    let pkginfo = if ran.contains(&StageKind::Package) {
        let size = installed_size(&options.pkgdir)?;
        let info = PkgInfo::new(recipe, &version, &arch, build_date(env), size);
        Some(info.write(&options.pkgdir)?)
    } else {
        None
    };

    info!(name = %recipe.name, %version, stages = ran.len(), "build finished");
    Ok(BuildReport {
        name: recipe.name.clone(),
        version,
        stages: ran,
        pkgdir: options.pkgdir.clone(),
        pkginfo,
    })
}

async fn reset_dir(dir: &Path) -> crate::Result<()> {
    if tokio::fs::try_exists(dir).await? {
        tokio::fs::remove_dir_all(dir).await?;
    }
    tokio::fs::create_dir_all(dir).await?;
    Ok(())
}

/// `SOURCE_DATE_EPOCH` from the environment when set, else now.
fn build_date(env: &MaterializedEnvironment) -> i64 {
    env.var("SOURCE_DATE_EPOCH")
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(|| chrono::Utc::now().timestamp())
}
