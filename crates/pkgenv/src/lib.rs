// Copyright (c) Contributors to the pkgenv project.
// SPDX-License-Identifier: Apache-2.0

//! pkgenv - Reproducible Environment and Build Recipe Resolver
//!
//! This crate provides the core library for materializing declarative
//! development environments (`.pkgenv.yaml`) and for running package
//! build recipes (`pkgenv.recipe.yaml`) inside them.
//!
//! # Overview
//!
//! An environment file names the tools (native build inputs) and libraries
//! (build inputs) a project needs, per system. Each identifier is resolved
//! against the configured catalogs into a content-addressed artifact and the
//! results are exposed through `PATH`, header and library search paths.
//!
//! A build recipe declares package metadata and four ordered stages
//! (`prepare`, `build`, `check`, `package`). The orchestrator fetches
//! sources, runs each stage in the materialized environment and stops at
//! the first failure.
//!
//! # Example
//!
//! ```yaml
//! # .pkgenv.yaml
//! api: pkgenv/v0
//! description: "Rust toolchain for the pomodoro module"
//!
//! systems:
//!   "*":
//!     native_build_inputs: [cargo, rustc, git]
//!   x86_64-linux:
//!     build_inputs: [openssl]
//!
//! variables:
//!   RUST_BACKTRACE: "1"
//! ```

pub mod catalog;
pub mod compose;
pub mod config;
pub mod discovery;
pub mod environment;
pub mod error;
pub mod lock;
pub mod materialize;
pub mod metadata;
pub mod orchestrate;
pub mod pkginfo;
pub mod recipe;
pub mod sources;
pub mod spec;
pub mod stage;
pub mod system;
pub mod vcs;
pub mod version;

pub use catalog::{Artifact, ArtifactKind, Catalog, CatalogSet, DirectoryCatalog, HostCatalog};
pub use compose::{ComposedEnvironment, compose_specs};
pub use config::Config;
pub use discovery::{DiscoveryOptions, discover_specs};
pub use environment::{EnvOp, generate_startup_script};
pub use error::{Error, Result};
pub use lock::{LockChange, LockChangeKind, LockFile, generate_lock, verify_lock};
pub use materialize::{MaterializeOptions, MaterializedEnvironment, materialize, run_in_environment};
pub use orchestrate::{BuildOptions, BuildReport, run_recipe};
pub use recipe::BuildRecipe;
pub use spec::{ApiVersion, EnvSpec, SystemInputs};
pub use stage::{ShellRunner, Stage, StageContext, StageKind, StageRunner};
pub use system::current_system;
pub use vcs::{GitCli, Vcs};
pub use version::{VersionString, resolve_version};

/// Well-known filename for environment specs.
pub const PKGENV_FILENAME: &str = ".pkgenv.yaml";

/// Well-known filename for local overrides.
pub const PKGENV_LOCAL_FILENAME: &str = ".pkgenv.local.yaml";

/// Well-known filename for lock files.
pub const PKGENV_LOCK_FILENAME: &str = ".pkgenv.lock.yaml";

/// Well-known filename for build recipes.
pub const RECIPE_FILENAME: &str = "pkgenv.recipe.yaml";
