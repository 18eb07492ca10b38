// Copyright (c) Contributors to the pkgenv project.
// SPDX-License-Identifier: Apache-2.0

//! Build stages and the runners that execute them.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::process::ExitStatus;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info};

use crate::materialize::MaterializedEnvironment;
use crate::{Error, Result};

#[cfg(test)]
#[path = "./stage_test.rs"]
mod stage_test;

/// Address that refuses connections, used as proxy for offline stages.
const OFFLINE_PROXY: &str = "http://127.0.0.1:9";

/// Commands that reach the network on their own.
const NETWORK_COMMANDS: &[&[&str]] = &[
    &["curl"],
    &["wget"],
    &["git", "clone"],
    &["git", "fetch"],
    &["git", "pull"],
    &["cargo", "fetch"],
    &["cargo", "install"],
    &["npm", "install"],
    &["npm", "ci"],
    &["pip", "install"],
    &["pip3", "install"],
];

/// The four recipe stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Prepare,
    Build,
    Check,
    Package,
}

impl StageKind {
    pub const ALL: [StageKind; 4] = [
        StageKind::Prepare,
        StageKind::Build,
        StageKind::Check,
        StageKind::Package,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StageKind::Prepare => "prepare",
            StageKind::Build => "build",
            StageKind::Check => "check",
            StageKind::Package => "package",
        }
    }

    /// Only `prepare` may use the network unless the recipe says otherwise.
    pub fn default_offline(self) -> bool {
        !matches!(self, StageKind::Prepare)
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stage ready to run: its kind, shell script and network policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub kind: StageKind,
    pub script: String,
    pub offline: bool,
}

/// How a stage process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    Exited(i32),
    Signaled(i32),
}

impl StageStatus {
    pub fn from_exit_status(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return StageStatus::Exited(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return StageStatus::Signaled(signal);
            }
        }
        StageStatus::Exited(1)
    }
}

impl Stage {
    pub fn new(kind: StageKind, script: impl Into<String>) -> Self {
        Self {
            kind,
            script: script.into(),
            offline: kind.default_offline(),
        }
    }

    /// Reject offline stages whose script invokes a network fetcher.
    pub fn check_offline(&self) -> Result<()> {
        if !self.offline {
            return Ok(());
        }
        match find_network_command(&self.script) {
            Some(command) => Err(Error::OfflineViolation {
                stage: self.kind,
                command,
            }),
            None => Ok(()),
        }
    }

    /// Run the stage through `runner`, turning a non-zero exit into an error.
    pub async fn run(&self, ctx: &StageContext<'_>, runner: &dyn StageRunner) -> Result<()> {
        info!(stage = %self.kind, offline = self.offline, "running stage");
        match runner.run(self, ctx).await? {
            StageStatus::Exited(0) => {
                info!(stage = %self.kind, "stage finished");
                Ok(())
            }
            StageStatus::Exited(code) => Err(Error::StageFailed {
                stage: self.kind,
                code,
            }),
            StageStatus::Signaled(signal) => Err(Error::StageTerminated {
                stage: self.kind,
                signal,
            }),
        }
    }
}

/// Everything a stage sees besides its own script.
#[derive(Debug, Clone)]
pub struct StageContext<'a> {
    pub env: &'a MaterializedEnvironment,
    /// Directory holding the recipe.
    pub startdir: PathBuf,
    /// Directory sources are fetched into; stages run here.
    pub srcdir: PathBuf,
    /// Target root that `package` installs into.
    pub pkgdir: PathBuf,
    /// Recipe variables such as `pkgname` and `pkgver`.
    pub variables: BTreeMap<String, String>,
}

impl StageContext<'_> {
    /// Variables exported to `stage`: the materialized environment, then
    /// the recipe variables and directories, then offline guards.
    pub fn stage_env(&self, stage: &Stage) -> BTreeMap<String, String> {
        let mut vars = self.env.full_env();
        vars.extend(self.variables.iter().map(|(k, v)| (k.clone(), v.clone())));
        vars.insert("startdir".into(), self.startdir.display().to_string());
        vars.insert("srcdir".into(), self.srcdir.display().to_string());
        vars.insert("pkgdir".into(), self.pkgdir.display().to_string());

        if stage.offline {
            vars.insert("CARGO_NET_OFFLINE".into(), "true".into());
            vars.insert("GIT_ALLOW_PROTOCOL".into(), "file".into());
            for proxy in ["http_proxy", "https_proxy", "HTTP_PROXY", "HTTPS_PROXY", "ALL_PROXY"] {
                vars.insert(proxy.into(), OFFLINE_PROXY.into());
            }
            vars.remove("no_proxy");
            vars.remove("NO_PROXY");
        }
        vars
    }
}

/// Executes one stage and reports how its process ended.
#[async_trait]
pub trait StageRunner: Send + Sync {
    async fn run(&self, stage: &Stage, ctx: &StageContext<'_>) -> Result<StageStatus>;
}

/// Runs stage scripts with a POSIX shell in `-e` mode.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: PathBuf,
}

impl Default for ShellRunner {
    fn default() -> Self {
        // Not $SHELL: interactive shells may source profiles that change the environment.
        Self {
            shell: PathBuf::from("/bin/sh"),
        }
    }
}

impl ShellRunner {
    pub fn with_shell<P: Into<PathBuf>>(shell: P) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

#[async_trait]
impl StageRunner for ShellRunner {
    async fn run(&self, stage: &Stage, ctx: &StageContext<'_>) -> Result<StageStatus> {
        tokio::fs::create_dir_all(&ctx.srcdir).await?;

        let mut command = Command::new(&self.shell);
        command
            .arg("-e")
            .arg("-c")
            .arg(&stage.script)
            .current_dir(&ctx.srcdir)
            .env_clear()
            .envs(ctx.stage_env(stage));

        debug!(shell = ?self.shell, srcdir = ?ctx.srcdir, "spawning stage");
        let status = command.status().await?;
        Ok(StageStatus::from_exit_status(status))
    }
}

/// Words that run the command after them: shell keywords and wrappers.
const COMMAND_PREFIXES: &[&str] = &[
    "if", "then", "elif", "else", "while", "until", "do", "!", "time", "nohup", "nice", "xargs",
    "sudo", "env", "exec", "command", "builtin", "timeout",
];

/// First network fetcher invoked by `script`, as written.
pub(crate) fn find_network_command(script: &str) -> Option<String> {
    for line in script.lines() {
        let line = strip_comment(line);
        for segment in line.split(['|', ';', '&', '(', ')', '`', '{', '}']) {
            let words = command_words(segment);
            let Some(program) = words.first() else {
                continue;
            };
            for pattern in NETWORK_COMMANDS {
                if words.len() >= pattern.len() && basename(program) == pattern[0] {
                    let rest = &pattern[1..];
                    let matches = match rest.first() {
                        None => true,
                        // subcommand may follow global flags, e.g. `cargo --locked fetch`
                        Some(sub) => words[1..].iter().find(|w| !w.starts_with('-')) == Some(sub),
                    };
                    if matches {
                        return Some(pattern.join(" "));
                    }
                }
            }
        }
    }
    None
}

/// The invoked program and its arguments, with leading assignments and
/// prefixes removed. Flags and numeric arguments of a prefix go too
/// (`xargs -n 1 wget`, `timeout 30 curl`).
fn command_words(segment: &str) -> Vec<&str> {
    let mut words = segment.split_whitespace().peekable();
    let mut after_prefix = false;
    while let Some(word) = words.peek() {
        let is_assignment = word.contains('=') && !word.starts_with(['=', '-']);
        let is_prefix_arg =
            after_prefix && (word.starts_with('-') || word.chars().all(|c| c.is_ascii_digit()));
        if COMMAND_PREFIXES.contains(word) {
            after_prefix = true;
        } else if !is_assignment && !is_prefix_arg {
            break;
        }
        words.next();
    }
    words.collect()
}

/// Drop a trailing `# comment` (a `#` at the start of a word).
fn strip_comment(line: &str) -> &str {
    let mut prev = ' ';
    for (i, c) in line.char_indices() {
        if c == '#' && prev.is_whitespace() {
            return &line[..i];
        }
        prev = c;
    }
    line
}

fn basename(word: &str) -> &str {
    word.rsplit('/').next().unwrap_or(word)
}
