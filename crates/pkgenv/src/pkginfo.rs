// Copyright (c) Contributors to the pkgenv project.
// SPDX-License-Identifier: Apache-2.0

//! The `.PKGINFO` metadata file written into the target root.

use std::path::{Path, PathBuf};

use crate::recipe::BuildRecipe;
use crate::version::VersionString;

#[cfg(test)]
#[path = "./pkginfo_test.rs"]
mod pkginfo_test;

pub const PKGINFO_FILENAME: &str = ".PKGINFO";

/// Package metadata for one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkgInfo {
    pub name: String,
    /// `<VersionString>-<release>`
    pub version: String,
    pub description: Option<String>,
    pub arch: String,
    pub build_date: i64,
    /// Total size in bytes of the files under the target root.
    pub size: u64,
    pub license: Vec<String>,
    pub depends: Vec<String>,
    pub build_depends: Vec<String>,
    pub provides: Vec<String>,
    pub conflicts: Vec<String>,
    pub options: Vec<String>,
}

impl PkgInfo {
    pub fn new(
        recipe: &BuildRecipe,
        version: &VersionString,
        arch: &str,
        build_date: i64,
        size: u64,
    ) -> Self {
        Self {
            name: recipe.name.clone(),
            version: format!("{version}-{}", recipe.release),
            description: recipe.description.clone(),
            arch: arch.to_string(),
            build_date,
            size,
            license: recipe.license.clone(),
            depends: recipe.depends.clone(),
            build_depends: recipe.build_depends.clone(),
            provides: recipe.provides.clone(),
            conflicts: recipe.conflicts.clone(),
            options: recipe.options.clone(),
        }
    }

    /// `key = value` lines, repeated keys for lists.
    pub fn render(&self) -> String {
        let mut out = String::from("# Generated by pkgenv\n");
        let mut line = |key: &str, value: &str| {
            out.push_str(key);
            out.push_str(" = ");
            out.push_str(value);
            out.push('\n');
        };
        line("pkgname", &self.name);
        line("pkgver", &self.version);
        if let Some(desc) = &self.description {
            line("pkgdesc", desc);
        }
        line("builddate", &self.build_date.to_string());
        line("size", &self.size.to_string());
        line("arch", &self.arch);
        for value in &self.license {
            line("license", value);
        }
        for value in &self.depends {
            line("depend", value);
        }
        for value in &self.build_depends {
            line("makedepend", value);
        }
        for value in &self.provides {
            line("provides", value);
        }
        for value in &self.conflicts {
            line("conflict", value);
        }
        for value in &self.options {
            line("makepkgopt", value);
        }
        out
    }

    /// Write `.PKGINFO` into `pkgdir`, returning its path.
    pub fn write(&self, pkgdir: &Path) -> crate::Result<PathBuf> {
        let path = pkgdir.join(PKGINFO_FILENAME);
        std::fs::write(&path, self.render())?;
        Ok(path)
    }
}

/// Sum of file sizes under `dir`, not following symlinks.
pub fn installed_size(dir: &Path) -> crate::Result<u64> {
    let mut total = 0;
    let mut pending = vec![dir.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                total += entry.metadata()?.len();
            }
        }
    }
    Ok(total)
}
