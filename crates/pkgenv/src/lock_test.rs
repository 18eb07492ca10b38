// Copyright (c) Contributors to the pkgenv project.
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use rstest::rstest;
use tempfile::TempDir;

use crate::lock::{LockApiVersion, LockChangeKind, LockFile, generate_lock, verify_lock};
use crate::{Artifact, ArtifactKind, EnvSpec, MaterializedEnvironment, compose_specs};

const DIGEST_A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
const DIGEST_B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

fn artifact(identifier: &str, kind: ArtifactKind, digest: &str) -> Artifact {
    Artifact {
        identifier: identifier.to_string(),
        kind,
        catalog: "pinned".to_string(),
        root: PathBuf::from("/opt").join(identifier),
        digest: digest.to_string(),
        bin_dirs: Vec::new(),
        include_dirs: Vec::new(),
        lib_dirs: Vec::new(),
        pkgconfig_dirs: Vec::new(),
    }
}

fn materialized(artifacts: Vec<Artifact>) -> MaterializedEnvironment {
    MaterializedEnvironment {
        system: "x86_64-linux".to_string(),
        artifacts,
        ..Default::default()
    }
}

fn write_spec(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join(crate::PKGENV_FILENAME);
    std::fs::write(&path, content).unwrap();
    path
}

const SPEC: &str = r#"
api: pkgenv/v0
systems:
  "*":
    native_build_inputs: [cargo]
    build_inputs: [gtk3]
"#;

#[rstest]
fn test_generate_records_sources_and_inputs() {
    let tmp = TempDir::new().unwrap();
    let path = write_spec(&tmp, SPEC);
    let composed = compose_specs(&[EnvSpec::load(&path).unwrap()], "x86_64-linux").unwrap();
    let env = materialized(vec![
        artifact("cargo", ArtifactKind::Tool, DIGEST_A),
        artifact("gtk3", ArtifactKind::Library, DIGEST_B),
    ]);

    let lock = generate_lock(&composed, &env).unwrap();
    assert_eq!(lock.api, LockApiVersion::V0);
    assert_eq!(lock.generated.system, "x86_64-linux");
    assert_eq!(lock.sources.len(), 1);
    assert_eq!(lock.sources[0].path, path);
    assert_eq!(lock.sources[0].sha256.len(), 64);
    assert_eq!(lock.inputs.len(), 2);
    assert_eq!(lock.inputs[1].kind, ArtifactKind::Library);

    assert!(verify_lock(&lock, &composed, &env).unwrap().is_empty());
}

#[rstest]
fn test_save_and_load() {
    let tmp = TempDir::new().unwrap();
    let path = write_spec(&tmp, SPEC);
    let composed = compose_specs(&[EnvSpec::load(&path).unwrap()], "x86_64-linux").unwrap();
    let env = materialized(vec![artifact("cargo", ArtifactKind::Tool, DIGEST_A)]);

    let lock = generate_lock(&composed, &env).unwrap();
    let lock_path = tmp.path().join(crate::PKGENV_LOCK_FILENAME);
    lock.save(&lock_path).unwrap();

    let loaded = LockFile::load(&lock_path).unwrap();
    assert_eq!(loaded, lock);
    assert!(std::fs::read_to_string(&lock_path).unwrap().contains("api: pkgenv/v0/lock"));
}

#[rstest]
fn test_changed_spec_file_is_reported() {
    let tmp = TempDir::new().unwrap();
    let path = write_spec(&tmp, SPEC);
    let composed = compose_specs(&[EnvSpec::load(&path).unwrap()], "x86_64-linux").unwrap();
    let env = materialized(Vec::new());
    let lock = generate_lock(&composed, &env).unwrap();

    std::fs::write(&path, format!("{SPEC}\ndescription: edited\n")).unwrap();

    let changes = verify_lock(&lock, &composed, &env).unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].kind, LockChangeKind::SourceFileChanged);
}

#[rstest]
fn test_input_changes_are_reported() {
    let tmp = TempDir::new().unwrap();
    let path = write_spec(&tmp, SPEC);
    let composed = compose_specs(&[EnvSpec::load(&path).unwrap()], "x86_64-linux").unwrap();
    let locked = materialized(vec![
        artifact("cargo", ArtifactKind::Tool, DIGEST_A),
        artifact("gtk3", ArtifactKind::Library, DIGEST_A),
    ]);
    let lock = generate_lock(&composed, &locked).unwrap();

    let current = materialized(vec![
        artifact("cargo", ArtifactKind::Tool, DIGEST_B),
        artifact("pkgconf", ArtifactKind::Tool, DIGEST_A),
    ]);
    let mut kinds: Vec<(LockChangeKind, String)> = verify_lock(&lock, &composed, &current)
        .unwrap()
        .into_iter()
        .map(|c| (c.kind, c.reference))
        .collect();
    kinds.sort_by_key(|(_, r)| r.clone());

    assert_eq!(
        kinds,
        vec![
            (LockChangeKind::InputDigestChanged, "cargo".to_string()),
            (LockChangeKind::InputRemoved, "gtk3".to_string()),
            (LockChangeKind::InputAdded, "pkgconf".to_string()),
        ]
    );
}

#[rstest]
fn test_removed_and_added_source_files() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    let old_path = write_spec(&first, SPEC);
    let new_path = write_spec(&second, SPEC);
    let env = materialized(Vec::new());

    let old = compose_specs(&[EnvSpec::load(&old_path).unwrap()], "x86_64-linux").unwrap();
    let lock = generate_lock(&old, &env).unwrap();

    let new = compose_specs(&[EnvSpec::load(&new_path).unwrap()], "x86_64-linux").unwrap();
    let kinds: Vec<LockChangeKind> = verify_lock(&lock, &new, &env)
        .unwrap()
        .into_iter()
        .map(|c| c.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![LockChangeKind::SourceFileRemoved, LockChangeKind::SourceFileAdded]
    );
}
