// Copyright (c) Contributors to the pkgenv project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `pkgenv show` command.

use clap::Args;
use colored::Colorize;
use miette::{IntoDiagnostic, Result};

/// Display resolved environment configuration
#[derive(Debug, Args)]
pub struct CmdShow {
    #[clap(flatten)]
    discovery: crate::DiscoveryFlags,

    #[clap(flatten)]
    config: crate::ConfigFlags,

    /// Show discovered files
    #[clap(long)]
    files: bool,

    /// Show declared and resolved inputs
    #[clap(long)]
    inputs: bool,

    /// Show all information
    #[clap(long)]
    all: bool,

    /// Print the environment as a POSIX startup script
    #[clap(long, conflicts_with = "format")]
    script: bool,

    /// Only compose; do not resolve identifiers against catalogs
    #[clap(long)]
    unresolved: bool,

    /// Output format: table, yaml, json
    #[clap(long, default_value = "table")]
    format: String,
}

impl CmdShow {
    pub async fn run(&mut self) -> Result<i32> {
        let specs = self.discovery.discover()?;

        let (composed, env) = if self.unresolved {
            let composed = pkgenv::compose_specs(&specs, &pkgenv::current_system())?;
            (composed, None)
        } else {
            let resolved = crate::resolve_specs(specs.clone(), &self.config)?;
            (resolved.composed, Some(resolved.env))
        };

        if self.script {
            match &env {
                Some(env) => print!("{}", env.startup_script()),
                None => print!("{}", pkgenv::generate_startup_script(&composed.environment)),
            }
            return Ok(0);
        }

        let show_files = self.files || self.all || (!self.inputs && !self.files);
        let show_inputs = self.inputs || self.all || (!self.inputs && !self.files);

        match self.format.as_str() {
            "yaml" => self.show_yaml(&specs, &composed, env.as_ref())?,
            "json" => self.show_json(&specs, &composed, env.as_ref())?,
            _ => {
                if show_files {
                    self.show_files_table(&specs);
                }
                if show_files && show_inputs {
                    println!();
                }
                if show_inputs {
                    self.show_inputs_table(&composed, env.as_ref());
                }
            }
        }

        Ok(0)
    }

    fn show_files_table(&self, specs: &[pkgenv::EnvSpec]) {
        println!("{}", "Discovered Files:".bold());
        println!();

        for (i, spec) in specs.iter().enumerate() {
            let path = spec
                .source_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<unknown>".to_string());

            let inherit_marker = if spec.inherit { " [inherit]" } else { "" };
            let includes_marker = if !spec.includes.is_empty() {
                format!(" [includes: {}]", spec.includes.len())
            } else {
                String::new()
            };

            println!(
                "  {}. {}{}{}",
                i + 1,
                path.cyan(),
                inherit_marker.yellow(),
                includes_marker.blue()
            );

            if let Some(desc) = &spec.description {
                println!("     {}", desc.dimmed());
            }
        }

        println!();
        println!("Total: {} file(s)", specs.len());
    }

    fn show_inputs_table(
        &self,
        composed: &pkgenv::ComposedEnvironment,
        env: Option<&pkgenv::MaterializedEnvironment>,
    ) {
        println!("{} {}", "Inputs for".bold(), composed.system.bold());
        println!();

        if !composed.has_inputs() {
            println!("  {}", "(no inputs)".dimmed());
        }

        let resolved = |id: &str, kind: pkgenv::ArtifactKind| -> String {
            env.and_then(|e| {
                e.artifacts
                    .iter()
                    .find(|a| a.identifier == id && a.kind == kind)
            })
            .map(|a| format!(" {} {}", a.catalog.yellow(), short_digest(&a.digest).dimmed()))
            .unwrap_or_default()
        };

        for id in &composed.native_build_inputs {
            println!(
                "  {} {}{}",
                "tool".blue(),
                id.green(),
                resolved(id, pkgenv::ArtifactKind::Tool)
            );
        }
        for id in &composed.build_inputs {
            println!(
                "  {} {}{}",
                "lib ".blue(),
                id.green(),
                resolved(id, pkgenv::ArtifactKind::Library)
            );
        }

        if !composed.variables.is_empty() {
            println!();
            println!("{}", "Variables:".bold());
            println!();
            for (name, value) in &composed.variables {
                println!("  {} = {}", name.cyan(), value.green());
            }
        }

        if !composed.environment.is_empty() {
            println!();
            println!("{}", "Environment Operations:".bold());
            println!();

            for (i, op) in composed.environment.iter().enumerate() {
                match op {
                    pkgenv::EnvOp::Set(s) => {
                        println!("  {}. {} = {}", i + 1, s.set.cyan(), s.value.green());
                    }
                    pkgenv::EnvOp::Prepend(p) => {
                        println!(
                            "  {}. {} = {} + ${}",
                            i + 1,
                            p.prepend.cyan(),
                            p.value.green(),
                            p.prepend
                        );
                    }
                    pkgenv::EnvOp::Append(a) => {
                        println!(
                            "  {}. {} = ${} + {}",
                            i + 1,
                            a.append.cyan(),
                            a.append,
                            a.value.green()
                        );
                    }
                    pkgenv::EnvOp::Comment(c) => {
                        println!("  # {}", c.comment.dimmed());
                    }
                    pkgenv::EnvOp::Priority(p) => {
                        println!("  [priority: {}]", p.priority.to_string().yellow());
                    }
                }
            }
        }
    }

    fn document(
        &self,
        specs: &[pkgenv::EnvSpec],
        composed: &pkgenv::ComposedEnvironment,
        env: Option<&pkgenv::MaterializedEnvironment>,
    ) -> serde_json::Value {
        let files: Vec<String> = specs
            .iter()
            .filter_map(|s| s.source_path.as_ref().map(|p| p.display().to_string()))
            .collect();
        let resolved: Vec<serde_json::Value> = env
            .map(|e| {
                e.artifacts
                    .iter()
                    .map(|a| {
                        serde_json::json!({
                            "identifier": a.identifier,
                            "kind": a.kind.to_string(),
                            "catalog": a.catalog,
                            "root": a.root.display().to_string(),
                            "sha256": a.digest,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        serde_json::json!({
            "system": composed.system,
            "discovered_files": files,
            "native_build_inputs": composed.native_build_inputs,
            "build_inputs": composed.build_inputs,
            "variables": composed.variables,
            "environment": composed.environment,
            "resolved": resolved,
            "exported": env.map(|e| e.vars.clone()).unwrap_or_default(),
        })
    }

    fn show_yaml(
        &self,
        specs: &[pkgenv::EnvSpec],
        composed: &pkgenv::ComposedEnvironment,
        env: Option<&pkgenv::MaterializedEnvironment>,
    ) -> Result<()> {
        let yaml = serde_yaml::to_string(&self.document(specs, composed, env)).into_diagnostic()?;
        print!("{yaml}");
        Ok(())
    }

    fn show_json(
        &self,
        specs: &[pkgenv::EnvSpec],
        composed: &pkgenv::ComposedEnvironment,
        env: Option<&pkgenv::MaterializedEnvironment>,
    ) -> Result<()> {
        let json =
            serde_json::to_string_pretty(&self.document(specs, composed, env)).into_diagnostic()?;
        println!("{json}");
        Ok(())
    }
}

fn short_digest(digest: &str) -> &str {
    digest.get(..12).unwrap_or(digest)
}
