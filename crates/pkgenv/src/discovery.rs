// Copyright (c) Contributors to the pkgenv project.
// SPDX-License-Identifier: Apache-2.0

//! Finding the environment files that apply to a directory.
//!
//! Layering order, first to last:
//!
//! 1. `--include` files, then `PKGENV_INCLUDE` files
//! 2. `.pkgenv.yaml` files from the outermost inherited directory down to
//!    the start directory
//! 3. `.pkgenv.local.yaml` in the start directory
//!
//! Every file is preceded by the files it includes. A file reached more than
//! once (two files including a shared base) is layered at its first
//! position only; a file that includes itself, directly or not, is an error.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;

#[cfg(test)]
#[path = "./discovery_test.rs"]
mod discovery_test;

use crate::{EnvSpec, Error, PKGENV_FILENAME, PKGENV_LOCAL_FILENAME, Result};

/// Options for discovery behavior.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryOptions {
    /// Only consider the start directory (`--no-inherit`, `PKGENV_NO_INHERIT`).
    pub no_inherit: bool,

    /// Walk parents even if the start file says `inherit: false`
    /// (`--inherit`, `PKGENV_INHERIT`).
    pub force_inherit: bool,

    /// `--include` arguments.
    pub cli_includes: Vec<String>,

    /// Entries of `PKGENV_INCLUDE`.
    pub env_includes: Vec<String>,
}

/// Discover all environment files for `start_path`, in layering order.
pub fn discover_specs<P: AsRef<Path>>(
    start_path: P,
    options: &DiscoveryOptions,
) -> Result<Vec<EnvSpec>> {
    let start = resolve_start_path(start_path.as_ref());
    let mut layers = Layers::default();

    for include in options.cli_includes.iter().chain(&options.env_includes) {
        let path = resolve_include_path(include, None)?;
        layers.add_file(path)?;
    }

    for spec in tree_specs(&start, options)? {
        layers.add_loaded(spec)?;
    }

    let local_path = start.join(PKGENV_LOCAL_FILENAME);
    if local_path.is_file() {
        debug!(path = ?local_path, "loading local override");
        layers.add_loaded(EnvSpec::load(&local_path)?)?;
    }

    for spec in &layers.specs {
        spec.validate()?;
    }
    Ok(layers.specs)
}

/// Environment files in layering order, built one call at a time.
#[derive(Debug, Default)]
struct Layers {
    specs: Vec<EnvSpec>,
    /// Files already layered, by canonical path.
    layered: HashSet<PathBuf>,
    /// Files whose includes are being resolved right now.
    active: Vec<PathBuf>,
}

impl Layers {
    fn add_file(&mut self, path: PathBuf) -> Result<()> {
        if self.enter(&path)? {
            let spec = EnvSpec::load(&path)?;
            self.finish(path, spec)?;
        }
        Ok(())
    }

    fn add_loaded(&mut self, spec: EnvSpec) -> Result<()> {
        let path = spec
            .source_path
            .as_deref()
            .map(|source| dunce::canonicalize(source).unwrap_or_else(|_| source.to_path_buf()));
        match path {
            Some(path) => {
                if self.enter(&path)? {
                    self.finish(path, spec)?;
                }
            }
            None => self.specs.push(spec),
        }
        Ok(())
    }

    /// Whether `path` still needs layering.
    fn enter(&mut self, path: &Path) -> Result<bool> {
        if self.active.iter().any(|p| p == path) {
            return Err(Error::CircularInclude(path.to_path_buf()));
        }
        if !self.layered.insert(path.to_path_buf()) {
            debug!(path = ?path, "already layered");
            return Ok(false);
        }
        Ok(true)
    }

    /// Layer the includes of `spec`, then `spec` itself.
    fn finish(&mut self, path: PathBuf, spec: EnvSpec) -> Result<()> {
        self.active.push(path);
        let base_dir = spec.source_path.as_deref().and_then(Path::parent);
        for include in &spec.includes {
            let include_path = resolve_include_path(include, base_dir)?;
            debug!(path = ?include_path, "following include");
            self.add_file(include_path)?;
        }
        self.active.pop();
        self.specs.push(spec);
        Ok(())
    }
}

/// Resolve starting path, preferring $PWD to preserve symlinks.
fn resolve_start_path(start_path: &Path) -> PathBuf {
    if start_path.is_absolute() {
        return start_path.to_owned();
    }
    match std::env::var_os("PWD") {
        Some(pwd) => PathBuf::from(pwd).join(start_path),
        None => std::env::current_dir().unwrap_or_default().join(start_path),
    }
}

/// `.pkgenv.yaml` files from `start` upwards while `inherit` allows it,
/// returned outermost first.
fn tree_specs(start: &Path, options: &DiscoveryOptions) -> Result<Vec<EnvSpec>> {
    let mut chain = Vec::new();
    for (depth, dir) in start.ancestors().enumerate() {
        let path = dir.join(PKGENV_FILENAME);
        if !path.is_file() {
            if depth == 0 && options.no_inherit {
                return Err(Error::NotFoundAtPath(start.to_path_buf()));
            }
            continue;
        }

        let spec = EnvSpec::load(&path)?;
        let walk_up = if depth == 0 {
            options.force_inherit || (!options.no_inherit && spec.inherit)
        } else {
            spec.inherit
        };
        debug!(path = ?path, depth, "found environment file");
        chain.push(spec);
        if !walk_up {
            break;
        }
    }

    if chain.is_empty() {
        return Err(Error::NotFoundInTree(start.to_path_buf()));
    }
    chain.reverse();
    Ok(chain)
}

/// Resolve an include (absolute, `~/`-relative, or relative to `base_dir`)
/// to a canonical path.
pub(crate) fn resolve_include_path(include: &str, base_dir: Option<&Path>) -> Result<PathBuf> {
    let path = if let Some(rest) = include.strip_prefix('~') {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::ValidationFailed("Cannot resolve ~ without HOME".to_string()))?;
        home.join(rest.trim_start_matches('/'))
    } else if Path::new(include).is_absolute() {
        PathBuf::from(include)
    } else {
        let base = base_dir.ok_or_else(|| {
            Error::ValidationFailed(format!(
                "Cannot resolve relative include '{include}' without base directory"
            ))
        })?;
        base.join(include)
    };

    dunce::canonicalize(&path).map_err(|e| Error::IncludeNotFound { path, error: e })
}
