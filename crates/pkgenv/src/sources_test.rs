// Copyright (c) Contributors to the pkgenv project.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Mutex;

use async_trait::async_trait;
use rstest::rstest;
use tempfile::TempDir;

use super::*;

// sha256("hello\n")
const HELLO_SHA256: &str = "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03";

fn source(url: &str, sha256: &str) -> SourceSpec {
    SourceSpec {
        url: url.to_string(),
        sha256: sha256.to_string(),
        filename: None,
    }
}

/// Records checkouts and creates the destination directory.
#[derive(Default)]
struct RecordingVcs {
    checkouts: Mutex<Vec<(String, Option<String>, PathBuf)>>,
}

#[async_trait]
impl Vcs for RecordingVcs {
    async fn commit_count(&self, _dir: &Path) -> Result<u64> {
        Ok(1)
    }

    async fn short_revision(&self, _dir: &Path) -> Result<String> {
        Ok("abc1234".to_string())
    }

    async fn checkout(&self, url: &str, rev: Option<&str>, dest: &Path) -> Result<()> {
        std::fs::create_dir_all(dest)?;
        self.checkouts.lock().unwrap().push((
            url.to_string(),
            rev.map(str::to_string),
            dest.to_path_buf(),
        ));
        Ok(())
    }
}

#[rstest]
#[case("git+https://example.com/app.git#tag=v0.3.0", "https://example.com/app.git", Some("v0.3.0"))]
#[case("git+https://example.com/app.git#commit=abc1234", "https://example.com/app.git", Some("abc1234"))]
#[case("git+file:///srv/app", "file:///srv/app", None)]
fn test_vcs_location(#[case] url: &str, #[case] expected_url: &str, #[case] revision: Option<&str>) {
    let location = source(url, SKIP_CHECKSUM).location().unwrap();
    assert_eq!(
        location,
        SourceLocation::Vcs {
            url: expected_url.to_string(),
            revision: revision.map(str::to_string),
        }
    );
}

#[rstest]
#[case("git+https://example.com/app.git#version=1")]
#[case("git+https://example.com/app.git#tag")]
#[case("git+https://example.com/app.git#tag=")]
fn test_invalid_vcs_fragment(#[case] url: &str) {
    assert!(source(url, SKIP_CHECKSUM).validate().is_err());
}

#[rstest]
#[case("https://example.com/dl/app-0.3.0.tar.gz?raw=1", "app-0.3.0.tar.gz")]
#[case("git+https://example.com/app.git#tag=v1", "app")]
#[case("patches/fix build.patch", "fix_build.patch")]
fn test_target_name(#[case] url: &str, #[case] expected: &str) {
    assert_eq!(source(url, HELLO_SHA256).target_name(), expected);
}

#[rstest]
fn test_explicit_filename_wins() {
    let spec = SourceSpec {
        filename: Some("app.tar.gz".to_string()),
        ..source("https://example.com/download?id=7", HELLO_SHA256)
    };
    assert_eq!(spec.target_name(), "app.tar.gz");
}

#[rstest]
fn test_invalid_checksum_rejected() {
    let result = source("https://example.com/a.tar.gz", "not-a-digest").validate();
    assert!(matches!(result, Err(Error::ValidationFailed(_))));
}

#[tokio::test]
async fn test_local_source_is_copied_and_verified() {
    let start = TempDir::new().unwrap();
    std::fs::write(start.path().join("hello.txt"), "hello\n").unwrap();
    let srcdir = start.path().join("src");

    let fetched = fetch_sources(
        &[source("hello.txt", HELLO_SHA256)],
        start.path(),
        &srcdir,
        &RecordingVcs::default(),
    )
    .await
    .unwrap();

    assert_eq!(fetched, vec![srcdir.join("hello.txt")]);
    assert_eq!(std::fs::read_to_string(&fetched[0]).unwrap(), "hello\n");
}

#[tokio::test]
async fn test_local_source_checksum_mismatch() {
    let start = TempDir::new().unwrap();
    std::fs::write(start.path().join("hello.txt"), "goodbye\n").unwrap();

    let result = fetch_sources(
        &[source("hello.txt", HELLO_SHA256)],
        start.path(),
        &start.path().join("src"),
        &RecordingVcs::default(),
    )
    .await;

    match result {
        Err(Error::ChecksumMismatch { expected, actual, .. }) => {
            assert_eq!(expected, HELLO_SHA256);
            assert_ne!(actual, HELLO_SHA256);
        }
        other => panic!("expected checksum mismatch, got {other:?}"),
    }
}

#[tokio::test]
async fn test_local_source_cannot_skip_checksum() {
    let start = TempDir::new().unwrap();
    std::fs::write(start.path().join("hello.txt"), "hello\n").unwrap();

    let result = fetch_sources(
        &[source("hello.txt", SKIP_CHECKSUM)],
        start.path(),
        &start.path().join("src"),
        &RecordingVcs::default(),
    )
    .await;
    assert!(matches!(result, Err(Error::ValidationFailed(_))));
}

#[tokio::test]
async fn test_vcs_source_is_checked_out() {
    let start = TempDir::new().unwrap();
    let srcdir = start.path().join("src");
    let vcs = RecordingVcs::default();

    let fetched = fetch_sources(
        &[source("git+https://example.com/app.git#tag=v0.3.0", SKIP_CHECKSUM)],
        start.path(),
        &srcdir,
        &vcs,
    )
    .await
    .unwrap();

    assert_eq!(fetched, vec![srcdir.join("app")]);
    let checkouts = vcs.checkouts.lock().unwrap();
    assert_eq!(
        *checkouts,
        vec![(
            "https://example.com/app.git".to_string(),
            Some("v0.3.0".to_string()),
            srcdir.join("app"),
        )]
    );
}

#[rstest]
fn test_vcs_source_must_skip_checksum() {
    let pinned = source("git+https://example.com/app.git#tag=v0.3.0", HELLO_SHA256);
    assert!(matches!(pinned.validate(), Err(Error::ValidationFailed(_))));

    let skipped = source("git+https://example.com/app.git#tag=v0.3.0", SKIP_CHECKSUM);
    skipped.validate().unwrap();
}

#[tokio::test]
async fn test_vcs_source_with_checksum_is_not_checked_out() {
    let start = TempDir::new().unwrap();
    let vcs = RecordingVcs::default();

    let result = fetch_sources(
        &[source("git+file:///srv/app", &"0".repeat(64))],
        start.path(),
        &start.path().join("src"),
        &vcs,
    )
    .await;

    assert!(matches!(result, Err(Error::ValidationFailed(_))));
    assert!(vcs.checkouts.lock().unwrap().is_empty());
}
