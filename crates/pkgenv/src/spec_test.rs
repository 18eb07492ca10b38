// Copyright (c) Contributors to the pkgenv project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;

use super::*;

#[rstest]
fn test_parse_minimal_spec() {
    let yaml = r#"
api: pkgenv/v0
"#;
    let spec = EnvSpec::from_yaml(yaml).expect("Should parse minimal spec");
    assert_eq!(spec.api, ApiVersion::V0);
    assert!(!spec.inherit);
    assert!(spec.systems.is_empty());
    assert!(spec.includes.is_empty());
}

#[rstest]
fn test_parse_full_spec() {
    let yaml = r#"
api: pkgenv/v0
description: "Rust development shell"
inherit: true
includes:
  - ~/config/base.pkgenv.yaml
  - /team/shared.pkgenv.yaml
systems:
  "*":
    native_build_inputs: [cargo, rustc]
  x86_64-linux:
    native_build_inputs: [pkg-config]
    build_inputs: [openssl]
variables:
  RUST_SRC_PATH: /opt/rust/src
environment:
  - prepend: PATH
    value: /opt/extra/bin
"#;
    let spec = EnvSpec::from_yaml(yaml).expect("Should parse full spec");
    assert_eq!(spec.description.as_deref(), Some("Rust development shell"));
    assert!(spec.inherit);
    assert_eq!(spec.includes.len(), 2);
    assert_eq!(spec.systems.len(), 2);
    assert_eq!(spec.variables["RUST_SRC_PATH"], "/opt/rust/src");
    assert_eq!(spec.environment.len(), 1);
}

#[rstest]
fn test_inputs_for_merges_wildcard_first() {
    let yaml = r#"
api: pkgenv/v0
systems:
  "*":
    native_build_inputs: [cargo]
  x86_64-linux:
    native_build_inputs: [pkg-config]
    build_inputs: [openssl]
"#;
    let spec = EnvSpec::from_yaml(yaml).unwrap();

    let linux = spec.inputs_for("x86_64-linux").expect("linux inputs");
    assert_eq!(linux.native_build_inputs, vec!["cargo", "pkg-config"]);
    assert_eq!(linux.build_inputs, vec!["openssl"]);

    let darwin = spec.inputs_for("aarch64-darwin").expect("wildcard applies");
    assert_eq!(darwin.native_build_inputs, vec!["cargo"]);
    assert!(darwin.build_inputs.is_empty());
}

#[rstest]
fn test_inputs_for_unknown_system() {
    let yaml = r#"
api: pkgenv/v0
systems:
  x86_64-linux:
    native_build_inputs: [cargo]
"#;
    let spec = EnvSpec::from_yaml(yaml).unwrap();
    assert!(spec.inputs_for("aarch64-darwin").is_none());
}

#[rstest]
fn test_wrong_api_version_is_rejected() {
    let yaml = r#"
api: legacyenv/v0
"#;
    let result = EnvSpec::from_yaml(yaml);
    assert!(matches!(result, Err(crate::Error::InvalidYaml { .. })));
}

#[rstest]
fn test_parse_invalid_yaml() {
    let yaml = r#"
api: pkgenv/v0
systems: [
  unclosed bracket
"#;
    let result = EnvSpec::from_yaml(yaml);
    assert!(result.is_err(), "Should fail on invalid YAML");
}

#[rstest]
#[case("PATH", true)]
#[case("_private", true)]
#[case("LIB2", true)]
#[case("2LIB", false)]
#[case("WITH-DASH", false)]
#[case("", false)]
fn test_variable_names(#[case] name: &str, #[case] valid: bool) {
    assert_eq!(is_valid_variable_name(name), valid);
}

#[rstest]
fn test_validate_rejects_bad_variable() {
    let mut spec = EnvSpec::from_yaml("api: pkgenv/v0\nvariables:\n  BAD-NAME: x\n").unwrap();
    spec.source_path = Some(PathBuf::from("/tmp/.pkgenv.yaml"));
    assert!(matches!(
        spec.validate(),
        Err(crate::Error::ValidationFailed(_))
    ));
}

#[rstest]
fn test_validate_requires_source_path() {
    let spec = EnvSpec::default();
    assert!(spec.validate().is_err());
}

#[rstest]
fn test_default_spec() {
    let spec = EnvSpec::default();
    assert_eq!(spec.api, ApiVersion::V0);
    assert!(!spec.inherit);
    assert!(spec.systems.is_empty());
    assert!(spec.variables.is_empty());
    assert!(spec.source_path.is_none());
}

#[rstest]
fn test_missing_api_defaults_to_v0() {
    let spec = EnvSpec::from_yaml("description: no api tag\n").unwrap();
    assert_eq!(spec.api, ApiVersion::V0);
    assert_eq!(spec.description.as_deref(), Some("no api tag"));
}
