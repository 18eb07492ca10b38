// Copyright (c) Contributors to the pkgenv project.
// SPDX-License-Identifier: Apache-2.0

//! pkgenv - reproducible build environments and recipes

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::Result;

mod cmd_build;
mod cmd_check;
mod cmd_init;
mod cmd_load;
mod cmd_lock;
mod cmd_shell;
mod cmd_show;
mod cmd_version;

use cmd_build::CmdBuild;
use cmd_check::CmdCheck;
use cmd_init::CmdInit;
use cmd_load::CmdLoad;
use cmd_lock::CmdLock;
use cmd_shell::CmdShell;
use cmd_show::CmdShow;
use cmd_version::CmdVersion;

#[derive(Parser)]
#[clap(
    name = "pkgenv",
    about = "Reproducible build environments and recipes",
    version,
    long_about = "Resolve declared tools and libraries into an isolated environment and run build recipes inside it"
)]
struct Opt {
    #[clap(flatten)]
    logging: Logging,

    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Parser)]
struct Logging {
    /// Increase verbosity (-v, -vv, -vvv)
    #[clap(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[clap(short, long, global = true)]
    quiet: bool,
}

/// Where to look for environment files.
#[derive(Parser, Clone, Debug)]
pub struct DiscoveryFlags {
    /// Start discovery from PATH
    #[clap(short = 'f', long, default_value = ".")]
    pub file: PathBuf,

    /// Enable in-tree discovery
    #[clap(long)]
    pub inherit: bool,

    /// Disable in-tree discovery
    #[clap(short = 'n', long)]
    pub no_inherit: bool,

    /// Additional .pkgenv.yaml to include
    #[clap(short = 'i', long = "include")]
    pub includes: Vec<String>,
}

impl DiscoveryFlags {
    /// Discovery options from these flags and the `PKGENV_INCLUDE`,
    /// `PKGENV_INHERIT` and `PKGENV_NO_INHERIT` variables.
    pub fn options(&self) -> pkgenv::DiscoveryOptions {
        let env_includes = std::env::var("PKGENV_INCLUDE")
            .ok()
            .map(|s| {
                s.split(':')
                    .filter(|p| !p.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        pkgenv::DiscoveryOptions {
            no_inherit: self.no_inherit || env_flag("PKGENV_NO_INHERIT"),
            force_inherit: self.inherit || env_flag("PKGENV_INHERIT"),
            cli_includes: self.includes.clone(),
            env_includes,
        }
    }

    pub fn discover(&self) -> Result<Vec<pkgenv::EnvSpec>> {
        Ok(pkgenv::discover_specs(&self.file, &self.options())?)
    }
}

/// Configuration and catalog selection.
#[derive(Parser, Clone, Debug, Default)]
pub struct ConfigFlags {
    /// Configuration file layered over the user configuration
    #[clap(long, env = "PKGENV_CONFIG")]
    pub config: Option<PathBuf>,

    /// Additional catalog directory, consulted before configured ones
    #[clap(long = "catalog", short = 'c')]
    pub catalogs: Vec<PathBuf>,

    /// Do not fall back to the host toolchain
    #[clap(long)]
    pub no_host: bool,

    /// Start from an empty environment instead of the caller's
    #[clap(long)]
    pub pure: bool,
}

impl ConfigFlags {
    pub fn load(&self) -> Result<pkgenv::Config> {
        let mut config = pkgenv::Config::load(self.config.as_deref())?;
        if !self.catalogs.is_empty() {
            let mut catalogs = self.catalogs.clone();
            catalogs.append(&mut config.catalogs);
            config.catalogs = catalogs;
        }
        if self.no_host {
            config.host_catalog = false;
        }
        config.pure |= self.pure;
        Ok(config)
    }
}

/// Everything derived from the environment files on the way to a
/// materialized environment.
pub struct Resolved {
    pub config: pkgenv::Config,
    pub specs: Vec<pkgenv::EnvSpec>,
    pub composed: pkgenv::ComposedEnvironment,
    pub env: pkgenv::MaterializedEnvironment,
}

/// Discover, compose and materialize the environment for the current system.
pub fn resolve(discovery: &DiscoveryFlags, config: &ConfigFlags) -> Result<Resolved> {
    let specs = discovery.discover()?;
    resolve_specs(specs, config)
}

/// Compose and materialize already discovered specs.
pub fn resolve_specs(specs: Vec<pkgenv::EnvSpec>, config: &ConfigFlags) -> Result<Resolved> {
    let config = config.load()?;
    let system = pkgenv::current_system();
    let composed = pkgenv::compose_specs(&specs, &system)?;
    let catalogs = pkgenv::CatalogSet::from_config(&config)?;
    let options = pkgenv::MaterializeOptions::from_process(config.pure);
    let env = pkgenv::materialize(&composed, &catalogs, &options)?;
    Ok(Resolved {
        config,
        specs,
        composed,
        env,
    })
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .is_some_and(|v| matches!(v.as_str(), "1" | "true" | "yes" | "on"))
}

#[derive(Subcommand)]
enum Command {
    /// Create a new .pkgenv.yaml file
    Init(CmdInit),

    /// Display resolved environment configuration
    Show(CmdShow),

    /// Run a command inside the environment
    Load(CmdLoad),

    /// Enter interactive shell in environment
    Shell(CmdShell),

    /// Run a build recipe inside the environment
    Build(CmdBuild),

    /// Print the computed version string
    Version(CmdVersion),

    /// Generate or update lock file
    Lock(CmdLock),

    /// Verify environment matches lock file
    Check(CmdCheck),
}

impl Opt {
    async fn run(self) -> Result<i32> {
        let log_level = match (self.logging.quiet, self.logging.verbose) {
            (true, _) => tracing::Level::ERROR,
            (false, 0) => tracing::Level::WARN,
            (false, 1) => tracing::Level::INFO,
            (false, 2) => tracing::Level::DEBUG,
            (false, _) => tracing::Level::TRACE,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .init();

        match self.cmd {
            Command::Init(mut cmd) => cmd.run().await,
            Command::Show(mut cmd) => cmd.run().await,
            Command::Load(mut cmd) => cmd.run().await,
            Command::Shell(mut cmd) => cmd.run().await,
            Command::Build(mut cmd) => cmd.run().await,
            Command::Version(mut cmd) => cmd.run().await,
            Command::Lock(mut cmd) => cmd.run().await,
            Command::Check(mut cmd) => cmd.run().await,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let opt = Opt::parse();
    let code = opt.run().await?;
    std::process::exit(code);
}
