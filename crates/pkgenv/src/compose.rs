// Copyright (c) Contributors to the pkgenv project.
// SPDX-License-Identifier: Apache-2.0

//! Composition logic for merging multiple specs into a single environment.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::EnvSpec;
use crate::environment::EnvOp;

#[cfg(test)]
#[path = "./compose_test.rs"]
mod compose_test;

/// Composed environment from multiple specs, for one system.
#[derive(Debug, Clone, Default)]
pub struct ComposedEnvironment {
    /// System the inputs were selected for.
    pub system: String,

    /// Tool identifiers in first-declared order, without duplicates.
    pub native_build_inputs: Vec<String>,

    /// Library identifiers in first-declared order, without duplicates.
    pub build_inputs: Vec<String>,

    /// Merged plain variables (later specs win).
    pub variables: BTreeMap<String, String>,

    /// Merged environment variable operations (in order).
    pub environment: Vec<EnvOp>,

    /// Source files that contributed to this composition.
    pub source_files: Vec<PathBuf>,
}

impl ComposedEnvironment {
    /// Check if the environment declares any tools or libraries.
    pub fn has_inputs(&self) -> bool {
        !self.native_build_inputs.is_empty() || !self.build_inputs.is_empty()
    }

    /// Get the number of source files.
    pub fn source_count(&self) -> usize {
        self.source_files.len()
    }
}

/// Compose multiple specs into a single environment for `system`.
///
/// Specs are processed in order, with later specs layering on top of earlier
/// ones. Fails with [`crate::Error::UnsupportedSystem`] when at least one spec
/// declares systems but none of them covers `system`.
pub fn compose_specs(specs: &[EnvSpec], system: &str) -> crate::Result<ComposedEnvironment> {
    let mut composed = ComposedEnvironment {
        system: system.to_string(),
        ..Default::default()
    };

    let mut declared = Vec::new();
    let mut matched = false;

    for spec in specs {
        declared.extend(spec.systems.keys().cloned());

        if let Some(inputs) = spec.inputs_for(system) {
            matched = true;
            push_unique(&mut composed.native_build_inputs, &inputs.native_build_inputs);
            push_unique(&mut composed.build_inputs, &inputs.build_inputs);
        }

        composed
            .variables
            .extend(spec.variables.iter().map(|(k, v)| (k.clone(), v.clone())));

        composed
            .environment
            .extend(spec.environment.iter().cloned());

        if let Some(path) = &spec.source_path {
            composed.source_files.push(path.clone());
        }
    }

    if !matched && !declared.is_empty() {
        declared.sort();
        declared.dedup();
        return Err(crate::Error::UnsupportedSystem {
            system: system.to_string(),
            declared,
        });
    }

    Ok(composed)
}

fn push_unique(target: &mut Vec<String>, items: &[String]) {
    for item in items {
        if !target.contains(item) {
            target.push(item.clone());
        }
    }
}
