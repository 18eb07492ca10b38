// Copyright (c) Contributors to the pkgenv project.
// SPDX-License-Identifier: Apache-2.0

//! Materialization of a composed environment into concrete variables.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tokio::process::Command;
use tracing::{debug, info};

use crate::ComposedEnvironment;
use crate::catalog::{Artifact, ArtifactKind, CatalogSet};
use crate::environment::{apply_env_ops, escape};
use crate::stage::StageStatus;

#[cfg(test)]
#[path = "./materialize_test.rs"]
mod materialize_test;

/// Caller variables kept in pure mode.
const PURE_PASSTHROUGH: &[&str] = &["HOME", "USER", "LOGNAME", "TERM", "LANG", "TMPDIR"];

/// Dynamic-library search path variable for this platform.
#[cfg(target_os = "macos")]
pub const DYLIB_PATH_VAR: &str = "DYLD_LIBRARY_PATH";
#[cfg(not(target_os = "macos"))]
pub const DYLIB_PATH_VAR: &str = "LD_LIBRARY_PATH";

/// Set in every materialized environment.
pub const ACTIVE_VAR: &str = "PKGENV_ACTIVE";

/// Options for materialization.
#[derive(Debug, Clone, Default)]
pub struct MaterializeOptions {
    /// Start from an empty environment, keeping only a few session variables.
    pub pure: bool,
    /// The caller's environment; search paths are prepended to its values.
    pub base_env: BTreeMap<String, String>,
}

impl MaterializeOptions {
    /// Options capturing the current process environment.
    pub fn from_process(pure: bool) -> Self {
        Self {
            pure,
            base_env: std::env::vars().collect(),
        }
    }
}

/// Resolved inputs and the variables that expose them.
///
/// This is the whole state a build or shell needs; nothing is read from the
/// process environment once it exists.
#[derive(Debug, Clone, Default)]
pub struct MaterializedEnvironment {
    pub system: String,
    pub pure: bool,
    /// Inherited caller variables (only the passthrough set in pure mode).
    pub base: BTreeMap<String, String>,
    /// Variables set by pkgenv; these win over `base`.
    pub vars: BTreeMap<String, String>,
    /// Resolved tools followed by resolved libraries, in declaration order.
    pub artifacts: Vec<Artifact>,
}

impl MaterializedEnvironment {
    pub fn var(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .or_else(|| self.base.get(name))
            .map(String::as_str)
    }

    /// The complete environment a child process receives.
    pub fn full_env(&self) -> BTreeMap<String, String> {
        let mut env = self.base.clone();
        env.extend(self.vars.iter().map(|(k, v)| (k.clone(), v.clone())));
        env
    }

    pub fn artifacts_of(&self, kind: ArtifactKind) -> impl Iterator<Item = &Artifact> {
        self.artifacts.iter().filter(move |a| a.kind == kind)
    }

    /// Configure `command` to run inside this environment.
    pub fn apply(&self, command: &mut Command) {
        command.env_clear().envs(self.full_env());
    }

    /// POSIX script exporting the pkgenv-managed variables.
    pub fn startup_script(&self) -> String {
        let mut script = format!("# pkgenv environment for {}\n", self.system);
        for artifact in &self.artifacts {
            script.push_str(&format!(
                "# {} {} -> {} ({})\n",
                artifact.kind, artifact.identifier, artifact.catalog, artifact.digest
            ));
        }
        for (name, value) in &self.vars {
            script.push_str(&format!("export {name}=\"{}\"\n", escape(value)));
        }
        script
    }
}

/// Resolve every input of `composed` and build its environment.
///
/// Fails on the first identifier no catalog knows.
pub fn materialize(
    composed: &ComposedEnvironment,
    catalogs: &CatalogSet,
    options: &MaterializeOptions,
) -> crate::Result<MaterializedEnvironment> {
    let base: BTreeMap<String, String> = if options.pure {
        options
            .base_env
            .iter()
            .filter(|(k, _)| PURE_PASSTHROUGH.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    } else {
        options.base_env.clone()
    };

    let mut artifacts = Vec::new();
    for id in &composed.native_build_inputs {
        artifacts.push(catalogs.resolve(id, ArtifactKind::Tool)?);
    }
    for id in &composed.build_inputs {
        artifacts.push(catalogs.resolve(id, ArtifactKind::Library)?);
    }
    info!(
        system = %composed.system,
        tools = composed.native_build_inputs.len(),
        libraries = composed.build_inputs.len(),
        "resolved environment inputs"
    );

    let bin_dirs = unique_dirs(artifacts.iter().flat_map(|a| &a.bin_dirs));
    let include_dirs = unique_dirs(artifacts.iter().flat_map(|a| &a.include_dirs));
    let lib_dirs = unique_dirs(artifacts.iter().flat_map(|a| &a.lib_dirs));
    let pkgconfig_dirs = unique_dirs(artifacts.iter().flat_map(|a| &a.pkgconfig_dirs));

    // Pure environments never extend the caller's values.
    let inherited = if options.pure { None } else { Some(&base) };

    let mut vars = BTreeMap::new();
    let search_paths: [(&str, &Vec<PathBuf>); 5] = [
        ("PATH", &bin_dirs),
        ("CPATH", &include_dirs),
        ("LIBRARY_PATH", &lib_dirs),
        (DYLIB_PATH_VAR, &lib_dirs),
        ("PKG_CONFIG_PATH", &pkgconfig_dirs),
    ];
    for (name, dirs) in search_paths {
        if let Some(value) = join_search_path(dirs, inherited_value(inherited, name))? {
            debug!(name, value = %value, "search path");
            vars.insert(name.to_string(), value);
        }
    }
    // A pure environment still needs a PATH key, even if empty.
    if options.pure {
        vars.entry("PATH".to_string()).or_default();
    }

    vars.insert(ACTIVE_VAR.to_string(), "1".to_string());
    vars.extend(
        composed
            .variables
            .iter()
            .map(|(k, v)| (k.clone(), v.clone())),
    );

    // Operations see the inherited value when they prepend or append to a
    // variable pkgenv has not set itself.
    for name in composed.environment.iter().filter_map(|op| op.variable()) {
        if !vars.contains_key(name) {
            if let Some(value) = inherited_value(inherited, name) {
                vars.insert(name.to_string(), value.to_string());
            }
        }
    }
    apply_env_ops(&composed.environment, &mut vars);

    Ok(MaterializedEnvironment {
        system: composed.system.clone(),
        pure: options.pure,
        base,
        vars,
        artifacts,
    })
}

fn unique_dirs<'a>(dirs: impl Iterator<Item = &'a PathBuf>) -> Vec<PathBuf> {
    let mut unique: Vec<PathBuf> = Vec::new();
    for dir in dirs {
        if !unique.contains(dir) {
            unique.push(dir.clone());
        }
    }
    unique
}

fn inherited_value<'a>(base: Option<&'a BTreeMap<String, String>>, name: &str) -> Option<&'a str> {
    base.and_then(|b| b.get(name)).map(String::as_str)
}

/// Join `dirs` ahead of an existing search path value.
///
/// Returns `None` when there is nothing to set.
fn join_search_path(dirs: &[PathBuf], existing: Option<&str>) -> crate::Result<Option<String>> {
    if dirs.is_empty() {
        return Ok(None);
    }
    let mut parts: Vec<PathBuf> = dirs.to_vec();
    if let Some(existing) = existing.filter(|e| !e.is_empty()) {
        parts.extend(std::env::split_paths(existing));
    }
    let joined = std::env::join_paths(parts).map_err(|e| {
        crate::Error::ValidationFailed(format!("Cannot build search path: {e}"))
    })?;
    joined
        .into_string()
        .map(Some)
        .map_err(|_| crate::Error::ValidationFailed("Search path is not valid UTF-8".to_string()))
}

/// Run `argv` inside `env`, returning the exit code to report.
///
/// A child killed by a signal reports `128 + signal`.
pub async fn run_in_environment(
    env: &MaterializedEnvironment,
    argv: &[String],
    cwd: Option<&std::path::Path>,
) -> crate::Result<i32> {
    let (program, args) = argv.split_first().ok_or_else(|| {
        crate::Error::ValidationFailed("No command given to run in the environment".to_string())
    })?;

    // Resolve the program against the environment's PATH, not the caller's.
    let search = env.var("PATH").unwrap_or_default().to_string();
    let cwd_path = match cwd {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir()?,
    };
    let resolved = which::which_in(program, Some(&search), &cwd_path)
        .unwrap_or_else(|_| PathBuf::from(program));

    let mut command = Command::new(&resolved);
    command.args(args).current_dir(&cwd_path);
    env.apply(&mut command);

    debug!(program = ?resolved, "entering environment");
    let status = command.status().await?;
    Ok(match StageStatus::from_exit_status(status) {
        StageStatus::Exited(code) => code,
        StageStatus::Signaled(signal) => 128 + signal,
    })
}
