// Copyright (c) Contributors to the pkgenv project.
// SPDX-License-Identifier: Apache-2.0

//! User configuration, layered from defaults, files and `PKGENV_*` variables.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "./config_test.rs"]
mod config_test;

/// Prefix of environment variables that override configuration keys.
pub const ENV_PREFIX: &str = "PKGENV";

/// Keys that hold colon-separated lists when set from the environment.
const LIST_KEYS: &[&str] = &["catalogs", "host_prefixes"];

/// Resolved pkgenv configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Catalog directories, consulted in order.
    pub catalogs: Vec<PathBuf>,

    /// Fall back to the host toolchain after the configured catalogs.
    pub host_catalog: bool,

    /// Prefixes searched for host libraries.
    pub host_prefixes: Vec<PathBuf>,

    /// Start children from an empty environment instead of the caller's.
    pub pure: bool,

    /// Shell for `pkgenv shell`; `$SHELL` when unset.
    pub shell: Option<String>,

    /// Working directory for builds; `.pkgenv-build` next to the recipe when unset.
    pub build_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalogs: Vec::new(),
            host_catalog: true,
            host_prefixes: vec![PathBuf::from("/usr/local"), PathBuf::from("/usr")],
            pure: false,
            shell: None,
            build_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from the user config file, an optional explicit
    /// file and the process environment.
    pub fn load(explicit: Option<&Path>) -> crate::Result<Self> {
        let mut files = Vec::new();
        if let Some(user) = default_config_path() {
            files.push((user, false));
        }
        if let Some(explicit) = explicit {
            files.push((explicit.to_path_buf(), true));
        }
        Self::load_from(&files, None)
    }

    /// Load configuration from `(path, required)` files followed by
    /// environment variables. `env` replaces the process environment when
    /// given.
    pub fn load_from(
        files: &[(PathBuf, bool)],
        env: Option<config::Map<String, String>>,
    ) -> crate::Result<Self> {
        let mut builder = config::Config::builder();
        for (path, required) in files {
            tracing::debug!(path = ?path, required, "adding config source");
            builder = builder.add_source(config::File::from(path.as_path()).required(*required));
        }

        let mut environment = config::Environment::with_prefix(ENV_PREFIX)
            .try_parsing(true)
            .list_separator(":");
        for key in LIST_KEYS {
            environment = environment.with_list_parse_key(key);
        }
        builder = builder.add_source(environment.source(env));

        let config = builder.build()?.try_deserialize()?;
        Ok(config)
    }
}

/// `$XDG_CONFIG_HOME/pkgenv/config.yaml` (or the platform equivalent).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("pkgenv").join("config.yaml"))
}
