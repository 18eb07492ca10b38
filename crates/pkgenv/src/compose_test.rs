// Copyright (c) Contributors to the pkgenv project.
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::path::PathBuf;

use rstest::rstest;

use super::*;
use crate::environment::{EnvOp, PriorityEnv, SetEnv};
use crate::spec::SystemInputs;

const LINUX: &str = "x86_64-linux";

fn make_spec(system: &str, tools: Vec<&str>, libs: Vec<&str>, source_path: Option<&str>) -> EnvSpec {
    let mut systems = BTreeMap::new();
    systems.insert(
        system.to_string(),
        SystemInputs {
            native_build_inputs: tools.into_iter().map(String::from).collect(),
            build_inputs: libs.into_iter().map(String::from).collect(),
        },
    );
    EnvSpec {
        systems,
        source_path: source_path.map(PathBuf::from),
        ..Default::default()
    }
}

#[rstest]
fn test_compose_empty() {
    let composed = compose_specs(&[], LINUX).unwrap();

    assert!(!composed.has_inputs());
    assert!(composed.source_files.is_empty());
    assert_eq!(composed.system, LINUX);
}

#[rstest]
fn test_compose_single() {
    let specs = vec![make_spec(LINUX, vec!["cargo", "rustc"], vec!["openssl"], Some("/p/.pkgenv.yaml"))];
    let composed = compose_specs(&specs, LINUX).unwrap();

    assert_eq!(composed.native_build_inputs, vec!["cargo", "rustc"]);
    assert_eq!(composed.build_inputs, vec!["openssl"]);
    assert_eq!(composed.source_files, vec![PathBuf::from("/p/.pkgenv.yaml")]);
}

#[rstest]
fn test_compose_multiple_preserves_order() {
    let specs = vec![
        make_spec("*", vec!["git"], vec![], Some("/parent/.pkgenv.yaml")),
        make_spec(LINUX, vec!["cargo"], vec![], Some("/parent/child/.pkgenv.yaml")),
    ];
    let composed = compose_specs(&specs, LINUX).unwrap();

    assert_eq!(composed.native_build_inputs, vec!["git", "cargo"]);
    assert_eq!(composed.source_count(), 2);
}

#[rstest]
fn test_compose_deduplicates_identifiers() {
    let specs = vec![
        make_spec(LINUX, vec!["cargo", "git"], vec!["zlib"], None),
        make_spec(LINUX, vec!["git", "make"], vec!["zlib"], None),
    ];
    let composed = compose_specs(&specs, LINUX).unwrap();

    assert_eq!(composed.native_build_inputs, vec!["cargo", "git", "make"]);
    assert_eq!(composed.build_inputs, vec!["zlib"]);
}

#[rstest]
fn test_compose_other_system_is_unsupported() {
    let specs = vec![make_spec("aarch64-darwin", vec!["cargo"], vec![], None)];
    let result = compose_specs(&specs, LINUX);

    match result {
        Err(crate::Error::UnsupportedSystem { system, declared }) => {
            assert_eq!(system, LINUX);
            assert_eq!(declared, vec!["aarch64-darwin"]);
        }
        other => panic!("Expected UnsupportedSystem, got: {:?}", other),
    }
}

#[rstest]
fn test_compose_variables_later_wins() {
    let mut first = EnvSpec::default();
    first.variables.insert("MODE".into(), "debug".into());
    first.variables.insert("KEEP".into(), "yes".into());
    let mut second = EnvSpec::default();
    second.variables.insert("MODE".into(), "release".into());

    let composed = compose_specs(&[first, second], LINUX).unwrap();
    assert_eq!(composed.variables["MODE"], "release");
    assert_eq!(composed.variables["KEEP"], "yes");
}

#[rstest]
fn test_compose_environment_operations() {
    let spec1 = EnvSpec {
        environment: vec![EnvOp::Set(SetEnv {
            set: "FOO".to_string(),
            value: "one".to_string(),
        })],
        ..Default::default()
    };
    let spec2 = EnvSpec {
        environment: vec![EnvOp::Priority(PriorityEnv { priority: 10 })],
        ..Default::default()
    };

    let composed = compose_specs(&[spec1, spec2], LINUX).unwrap();
    assert_eq!(composed.environment.len(), 2);
}
