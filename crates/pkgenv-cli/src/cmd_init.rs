// Copyright (c) Contributors to the pkgenv project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `pkgenv init` command.

use std::path::PathBuf;

use clap::Args;
use miette::Result;

/// Create a new .pkgenv.yaml file
#[derive(Debug, Args)]
pub struct CmdInit {
    /// Directory to create file in
    #[clap(default_value = ".")]
    path: PathBuf,

    /// Enable in-tree inheritance
    #[clap(long)]
    inherit: bool,

    /// Add a tool needed on PATH
    #[clap(long = "tool")]
    tools: Vec<String>,

    /// Add a library needed for compilation
    #[clap(long = "library")]
    libraries: Vec<String>,

    /// Also write a pkgenv.recipe.yaml for a cargo project
    #[clap(long)]
    recipe: bool,
}

impl CmdInit {
    pub async fn run(&mut self) -> Result<i32> {
        let spec_path = self.path.join(pkgenv::PKGENV_FILENAME);
        if spec_path.exists() {
            return Err(miette::miette!(
                ".pkgenv.yaml already exists at {:?}",
                spec_path
            ));
        }

        let recipe_path = self.path.join(pkgenv::RECIPE_FILENAME);
        if self.recipe && recipe_path.exists() {
            return Err(miette::miette!(
                "{} already exists at {:?}",
                pkgenv::RECIPE_FILENAME,
                recipe_path
            ));
        }

        std::fs::write(&spec_path, self.environment_template())
            .map_err(|e| miette::miette!("Failed to write .pkgenv.yaml: {}", e))?;
        println!("Created .pkgenv.yaml at {:?}", spec_path);

        if self.recipe {
            std::fs::write(&recipe_path, self.recipe_template())
                .map_err(|e| miette::miette!("Failed to write {}: {}", pkgenv::RECIPE_FILENAME, e))?;
            println!("Created {} at {:?}", pkgenv::RECIPE_FILENAME, recipe_path);
        }

        println!();
        println!("Next steps:");
        println!("  1. Edit the file to list your tools and libraries");
        println!("  2. Run 'pkgenv show' to preview the environment");
        println!("  3. Run 'pkgenv shell' to enter it");

        Ok(0)
    }

    fn environment_template(&self) -> String {
        let system_section = if self.tools.is_empty() && self.libraries.is_empty() {
            "systems:\n\
            \x20 \"*\":\n\
            \x20   native_build_inputs: []\n\
            \x20   build_inputs: []\n\
            # x86_64-linux:\n\
            #   build_inputs: [gtk3]\n"
                .to_string()
        } else {
            format!(
                "systems:\n\
                \x20 \"*\":\n\
                \x20   native_build_inputs: [{}]\n\
                \x20   build_inputs: [{}]\n",
                self.tools.join(", "),
                self.libraries.join(", ")
            )
        };

        format!(
            "# pkgenv environment file\n\
            \n\
            api: pkgenv/v0\n\
            \n\
            # description: \"My project environment\"\n\
            \n\
            # When true, parent directories' .pkgenv.yaml files are loaded first\n\
            inherit: {}\n\
            \n\
            # includes:\n\
            #   - ~/.config/pkgenv/defaults.pkgenv.yaml\n\
            #   - ../shared/common.pkgenv.yaml\n\
            \n\
            # Tools (on PATH) and libraries (headers, shared objects, pkg-config)\n\
            {}\
            \n\
            # variables:\n\
            #   RUSTFLAGS: \"-C debuginfo=0\"\n\
            \n\
            # environment:\n\
            #   - prepend: PKG_CONFIG_PATH\n\
            #     value: /opt/local/lib/pkgconfig\n",
            self.inherit, system_section,
        )
    }

    fn recipe_template(&self) -> String {
        let name = std::fs::canonicalize(&self.path)
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_lowercase()))
            .unwrap_or_else(|| "my-package".to_string());
        format!(
            "api: pkgenv/v0/recipe\n\
            name: {name}\n\
            release: 1\n\
            # description: \"\"\n\
            arch: [x86_64]\n\
            license: [MIT]\n\
            build_depends: [cargo]\n\
            version_from: Cargo.toml\n\
            \n\
            stages:\n\
            \x20 prepare: cargo fetch --locked --manifest-path \"$startdir/Cargo.toml\"\n\
            \x20 build: cargo build --frozen --release --manifest-path \"$startdir/Cargo.toml\"\n\
            \x20 check: cargo test --frozen --manifest-path \"$startdir/Cargo.toml\"\n\
            \x20 package: install -Dm755 \"$startdir/target/release/{name}\" \"$pkgdir/usr/bin/{name}\"\n"
        )
    }
}
