// Copyright (c) Contributors to the pkgenv project.
// SPDX-License-Identifier: Apache-2.0

//! Error types for pkgenv operations.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

use crate::stage::StageKind;

/// Convenience Result type with pkgenv Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during pkgenv operations.
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// No .pkgenv.yaml found in directory tree
    #[error("No .pkgenv.yaml found in {0:?} or any parent directory")]
    #[diagnostic(
        code(pkgenv::not_found_in_tree),
        help("Create a .pkgenv.yaml file with 'pkgenv init' or specify a path with -f")
    )]
    NotFoundInTree(PathBuf),

    /// .pkgenv.yaml not found at specified path
    #[error(".pkgenv.yaml not found at {0:?}")]
    #[diagnostic(code(pkgenv::not_found_at_path))]
    NotFoundAtPath(PathBuf),

    /// Invalid YAML in an environment, recipe, catalog or lock file
    #[error("Invalid YAML in {kind} file: {error}")]
    #[diagnostic(
        code(pkgenv::invalid_yaml),
        help("Check YAML syntax and ensure the 'api' field matches the file kind")
    )]
    InvalidYaml {
        kind: &'static str,
        #[source]
        error: serde_yaml::Error,
        yaml_content: String,
    },

    /// Failed to read file
    #[error("Failed to read file: {path:?}")]
    #[diagnostic(code(pkgenv::read_failed))]
    ReadFailed {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// Include file not found
    #[error("Include file not found: {path:?}")]
    #[diagnostic(
        code(pkgenv::include_not_found),
        help("Check that the include path is correct and the file exists")
    )]
    IncludeNotFound {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// Circular include detected
    #[error("Circular include detected: {0:?}")]
    #[diagnostic(
        code(pkgenv::circular_include),
        help("Remove the circular reference in your includes")
    )]
    CircularInclude(PathBuf),

    /// Validation error
    #[error("Validation failed: {0}")]
    #[diagnostic(code(pkgenv::validation_failed))]
    ValidationFailed(String),

    /// Identifier not known to any configured catalog
    #[error("Unknown {kind} identifier '{identifier}' (searched: {})", catalogs.join(", "))]
    #[diagnostic(
        code(pkgenv::resolution_failed),
        help("{}", suggestion_message(similar))
    )]
    Resolution {
        identifier: String,
        kind: crate::catalog::ArtifactKind,
        catalogs: Vec<String>,
        similar: Vec<String>,
    },

    /// The environment declares nothing for the running system
    #[error("No inputs declared for system '{system}'")]
    #[diagnostic(
        code(pkgenv::unsupported_system),
        help("{}", unsupported_system_message(system, declared))
    )]
    UnsupportedSystem {
        system: String,
        declared: Vec<String>,
    },

    /// Version field missing from project metadata
    #[error("No version found in {path:?}")]
    #[diagnostic(
        code(pkgenv::metadata_missing),
        help("Set [package] version (or [workspace.package] version) in the manifest")
    )]
    MetadataMissing { path: PathBuf },

    /// Version field present but unusable
    #[error("Malformed version in {path:?}: {reason}")]
    #[diagnostic(code(pkgenv::metadata_malformed))]
    MetadataMalformed { path: PathBuf, reason: String },

    /// Project metadata is not valid TOML
    #[error("Invalid project metadata {path:?}: {error}")]
    #[diagnostic(code(pkgenv::metadata_invalid))]
    MetadataInvalid {
        path: PathBuf,
        #[source]
        error: toml::de::Error,
    },

    /// Working copy has no history to derive a revision from
    #[error("No VCS history available in {path:?}: {message}")]
    #[diagnostic(
        code(pkgenv::vcs_no_history),
        help("Run from inside a git checkout with at least one commit")
    )]
    VcsNoHistory { path: PathBuf, message: String },

    /// VCS client could not be started
    #[error("Failed to run {program}")]
    #[diagnostic(code(pkgenv::vcs_unavailable), help("Make sure the VCS client is installed and on PATH"))]
    VcsUnavailable {
        program: String,
        #[source]
        error: std::io::Error,
    },

    /// VCS command ran but failed outside of the history case
    #[error("{command} failed with exit code {code:?}: {message}")]
    #[diagnostic(code(pkgenv::vcs_failed))]
    VcsFailed {
        command: String,
        code: Option<i32>,
        message: String,
    },

    /// A build stage exited with a non-zero status
    #[error("Stage '{stage}' failed with exit code {code}")]
    #[diagnostic(
        code(pkgenv::stage_failed),
        help("Fix the failing stage and re-run; all stages run again from the start")
    )]
    StageFailed { stage: StageKind, code: i32 },

    /// A build stage was terminated by a signal
    #[error("Stage '{stage}' was terminated by signal {signal}")]
    #[diagnostic(code(pkgenv::stage_terminated))]
    StageTerminated { stage: StageKind, signal: i32 },

    /// An offline stage uses a network fetcher
    #[error("Stage '{stage}' is offline but invokes '{command}'")]
    #[diagnostic(
        code(pkgenv::offline_violation),
        help("Move network access into the prepare stage or mark the stage 'offline: false'")
    )]
    OfflineViolation { stage: StageKind, command: String },

    /// Source download failed
    #[error("Fetch failed for {url}: {message}")]
    #[diagnostic(code(pkgenv::fetch_failed))]
    FetchFailed { url: String, message: String },

    /// Source checksum did not match the recipe
    #[error("Checksum mismatch for {url}: expected {expected}, got {actual}")]
    #[diagnostic(
        code(pkgenv::checksum_mismatch),
        help("Update the sha256 entry in the recipe if the source changed intentionally")
    )]
    ChecksumMismatch {
        url: String,
        expected: String,
        actual: String,
    },

    /// Configuration could not be loaded
    #[error("Failed to load configuration: {0}")]
    #[diagnostic(code(pkgenv::config_error))]
    Config(#[from] config::ConfigError),

    /// IO error passthrough
    #[error(transparent)]
    #[diagnostic(code(pkgenv::io_error))]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Process exit code to report for this error.
    ///
    /// Stage failures propagate the stage's own exit code; a stage killed by
    /// a signal follows the shell convention of `128 + signal`.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::StageFailed { code, .. } => *code,
            Error::StageTerminated { signal, .. } => 128 + signal,
            _ => 1,
        }
    }
}

fn suggestion_message(similar: &[String]) -> String {
    if similar.is_empty() {
        "Check the identifier spelling and the configured catalogs".to_string()
    } else {
        format!("Did you mean one of: {}?", similar.join(", "))
    }
}

fn unsupported_system_message(system: &str, declared: &[String]) -> String {
    if declared.is_empty() {
        format!("The file declares no systems; add an entry for '{system}' or '*'")
    } else {
        format!(
            "Declared systems: {}. Add an entry for '{system}' or '*'",
            declared.join(", ")
        )
    }
}
