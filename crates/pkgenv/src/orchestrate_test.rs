// Copyright (c) Contributors to the pkgenv project.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Mutex;

use async_trait::async_trait;
use rstest::{fixture, rstest};
use tempfile::TempDir;

use super::*;
use crate::pkginfo::PKGINFO_FILENAME;
use crate::stage::{Stage, StageStatus};
use crate::{Error, Result};

/// Records each stage it is asked to run and fails the configured one.
#[derive(Default)]
struct RecordingRunner {
    fail: Option<(StageKind, i32)>,
    calls: Mutex<Vec<(StageKind, BTreeMap<String, String>)>>,
}

impl RecordingRunner {
    fn failing(kind: StageKind, code: i32) -> Self {
        Self {
            fail: Some((kind, code)),
            ..Default::default()
        }
    }

    fn kinds(&self) -> Vec<StageKind> {
        self.calls.lock().unwrap().iter().map(|(k, _)| *k).collect()
    }
}

#[async_trait]
impl StageRunner for RecordingRunner {
    async fn run(&self, stage: &Stage, ctx: &StageContext<'_>) -> Result<StageStatus> {
        self.calls
            .lock()
            .unwrap()
            .push((stage.kind, ctx.stage_env(stage)));
        if stage.kind == StageKind::Package {
            std::fs::write(ctx.pkgdir.join("payload"), "x")?;
        }
        Ok(match self.fail {
            Some((kind, code)) if kind == stage.kind => StageStatus::Exited(code),
            _ => StageStatus::Exited(0),
        })
    }
}

struct FakeVcs(Option<(u64, &'static str)>);

#[async_trait]
impl Vcs for FakeVcs {
    async fn commit_count(&self, dir: &Path) -> Result<u64> {
        self.0.map(|(c, _)| c).ok_or_else(|| Error::VcsNoHistory {
            path: dir.to_path_buf(),
            message: "no commits".to_string(),
        })
    }

    async fn short_revision(&self, dir: &Path) -> Result<String> {
        self.0.map(|(_, r)| r.to_string()).ok_or_else(|| Error::VcsNoHistory {
            path: dir.to_path_buf(),
            message: "no commits".to_string(),
        })
    }

    async fn checkout(&self, _url: &str, _rev: Option<&str>, dest: &Path) -> Result<()> {
        std::fs::create_dir_all(dest)?;
        Ok(())
    }
}

const RECIPE: &str = r#"
api: pkgenv/v0/recipe
name: waybar-pomodoro
license: [MIT]
stages:
  prepare: cargo fetch --locked
  build: cargo build --frozen --release
  check: cargo test --frozen
  package: install -Dm755 target/release/waybar-pomodoro "$pkgdir/usr/bin/waybar-pomodoro"
"#;

/// A project directory with a manifest and a recipe.
#[fixture]
fn project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join("Cargo.toml"),
        "[package]\nname = \"waybar-pomodoro\"\nversion = \"0.3.0\"\n",
    )
    .unwrap();
    std::fs::write(tmp.path().join(crate::RECIPE_FILENAME), RECIPE).unwrap();
    tmp
}

fn load(project: &TempDir) -> (BuildRecipe, BuildOptions) {
    let recipe = BuildRecipe::load(project.path().join(crate::RECIPE_FILENAME)).unwrap();
    let options = BuildOptions::for_recipe(&recipe, None);
    (recipe, options)
}

fn environment() -> MaterializedEnvironment {
    MaterializedEnvironment {
        system: "x86_64-linux".to_string(),
        vars: BTreeMap::from([
            ("PATH".to_string(), "/usr/bin:/bin".to_string()),
            ("SOURCE_DATE_EPOCH".to_string(), "1700000000".to_string()),
        ]),
        ..Default::default()
    }
}

const HISTORY: FakeVcs = FakeVcs(Some((42, "abc1234")));

#[rstest]
#[tokio::test]
async fn test_all_stages_run_in_order(project: TempDir) {
    let (recipe, options) = load(&project);
    let runner = RecordingRunner::default();

    let report = run_recipe(&recipe, &environment(), &runner, &HISTORY, &options)
        .await
        .unwrap();

    assert_eq!(runner.kinds(), StageKind::ALL.to_vec());
    assert_eq!(report.stages, StageKind::ALL.to_vec());
    assert_eq!(report.version.as_str(), "0.3.0_r42.abc1234");

    let pkginfo = report.pkginfo.expect("package stage writes .PKGINFO");
    assert_eq!(pkginfo, options.pkgdir.join(PKGINFO_FILENAME));
    let content = std::fs::read_to_string(pkginfo).unwrap();
    assert!(content.contains("pkgver = 0.3.0_r42.abc1234-1"));
    assert!(content.contains("builddate = 1700000000"));
    assert!(content.contains("size = 1\n"));
}

#[rstest]
#[tokio::test]
async fn test_stages_receive_recipe_variables(project: TempDir) {
    let (recipe, options) = load(&project);
    let runner = RecordingRunner::default();
    run_recipe(&recipe, &environment(), &runner, &HISTORY, &options)
        .await
        .unwrap();

    let calls = runner.calls.lock().unwrap();
    let (_, build_env) = &calls[1];
    assert_eq!(build_env["pkgname"], "waybar-pomodoro");
    assert_eq!(build_env["pkgver"], "0.3.0_r42.abc1234");
    assert_eq!(build_env["pkgrel"], "1");
    assert_eq!(build_env["CARCH"], "x86_64");
    assert_eq!(build_env["pkgdir"], options.pkgdir.display().to_string());
    assert_eq!(build_env["CARGO_NET_OFFLINE"], "true");

    let (_, prepare_env) = &calls[0];
    assert!(!prepare_env.contains_key("CARGO_NET_OFFLINE"));
}

#[rstest]
#[tokio::test]
async fn test_failing_stage_halts_the_run(project: TempDir) {
    let (recipe, options) = load(&project);
    let runner = RecordingRunner::failing(StageKind::Build, 1);

    let err = run_recipe(&recipe, &environment(), &runner, &HISTORY, &options)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::StageFailed { stage: StageKind::Build, code: 1 }));
    assert_eq!(err.exit_code(), 1);
    assert_eq!(runner.kinds(), vec![StageKind::Prepare, StageKind::Build]);
    assert!(!options.pkgdir.join(PKGINFO_FILENAME).exists());
}

#[rstest]
#[tokio::test]
async fn test_rerun_repeats_every_stage(project: TempDir) {
    let (recipe, options) = load(&project);

    let failing = RecordingRunner::failing(StageKind::Check, 2);
    let err = run_recipe(&recipe, &environment(), &failing, &HISTORY, &options)
        .await
        .unwrap_err();
    assert_eq!(err.exit_code(), 2);

    let fixed = RecordingRunner::default();
    run_recipe(&recipe, &environment(), &fixed, &HISTORY, &options)
        .await
        .unwrap();
    assert_eq!(fixed.kinds(), StageKind::ALL.to_vec());
}

#[rstest]
#[tokio::test]
async fn test_skip_check(project: TempDir) {
    let (recipe, mut options) = load(&project);
    options.skip_check = true;
    let runner = RecordingRunner::failing(StageKind::Check, 1);

    let report = run_recipe(&recipe, &environment(), &runner, &HISTORY, &options)
        .await
        .unwrap();
    assert_eq!(
        report.stages,
        vec![StageKind::Prepare, StageKind::Build, StageKind::Package]
    );
}

#[rstest]
#[tokio::test]
async fn test_pkgdir_is_emptied_before_the_run(project: TempDir) {
    let (recipe, options) = load(&project);
    std::fs::create_dir_all(&options.pkgdir).unwrap();
    std::fs::write(options.pkgdir.join("stale"), "old").unwrap();

    run_recipe(&recipe, &environment(), &RecordingRunner::default(), &HISTORY, &options)
        .await
        .unwrap();
    assert!(!options.pkgdir.join("stale").exists());
    assert!(options.pkgdir.join("payload").exists());
}

#[rstest]
#[tokio::test]
async fn test_offline_violation_runs_nothing(project: TempDir) {
    let (mut recipe, options) = load(&project);
    recipe.stages.insert(
        StageKind::Check,
        crate::recipe::StageDef::Script("wget https://example.com/fixtures.tar".to_string()),
    );
    let runner = RecordingRunner::default();

    let err = run_recipe(&recipe, &environment(), &runner, &HISTORY, &options)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::OfflineViolation { stage: StageKind::Check, .. }));
    assert!(runner.kinds().is_empty());
}

#[rstest]
#[tokio::test]
async fn test_missing_history_fails_before_stages(project: TempDir) {
    let (recipe, options) = load(&project);
    let runner = RecordingRunner::default();

    let err = run_recipe(&recipe, &environment(), &runner, &FakeVcs(None), &options)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::VcsNoHistory { .. }));
    assert!(runner.kinds().is_empty());
}

#[rstest]
#[tokio::test]
async fn test_recipe_without_package_writes_no_pkginfo(project: TempDir) {
    let (mut recipe, options) = load(&project);
    recipe.stages.remove(&StageKind::Package);

    let report = run_recipe(&recipe, &environment(), &RecordingRunner::default(), &HISTORY, &options)
        .await
        .unwrap();
    assert!(report.pkginfo.is_none());
}

#[rstest]
fn test_build_dir_defaults_next_to_recipe(project: TempDir) {
    let (_, options) = load(&project);
    assert_eq!(options.srcdir, project.path().join(DEFAULT_BUILD_DIR).join("src"));
    assert_eq!(options.pkgdir, project.path().join(DEFAULT_BUILD_DIR).join("pkg"));
}

/// Checks out a crate at version 0.4.1 and records where history was read.
#[derive(Default)]
struct UpstreamVcs {
    queried: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl Vcs for UpstreamVcs {
    async fn commit_count(&self, dir: &Path) -> Result<u64> {
        self.queried.lock().unwrap().push(dir.to_path_buf());
        Ok(2)
    }

    async fn short_revision(&self, dir: &Path) -> Result<String> {
        self.queried.lock().unwrap().push(dir.to_path_buf());
        Ok("1a2b3c4".to_string())
    }

    async fn checkout(&self, _url: &str, _rev: Option<&str>, dest: &Path) -> Result<()> {
        std::fs::create_dir_all(dest)?;
        std::fs::write(
            dest.join("Cargo.toml"),
            "[package]\nname = \"upstream\"\nversion = \"0.4.1\"\n",
        )?;
        Ok(())
    }
}

#[tokio::test]
async fn test_version_comes_from_the_fetched_checkout() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join(crate::RECIPE_FILENAME);
    std::fs::write(
        &path,
        r#"
name: upstream
version_from: $srcdir/upstream/Cargo.toml
sources:
  - url: git+file:///srv/upstream.git#tag=v0.4.1
    sha256: SKIP
stages:
  build: "true"
"#,
    )
    .unwrap();
    let recipe = BuildRecipe::load(&path).unwrap();
    let options = BuildOptions::for_recipe(&recipe, None);
    let vcs = UpstreamVcs::default();

    let report = run_recipe(&recipe, &environment(), &RecordingRunner::default(), &vcs, &options)
        .await
        .unwrap();

    assert_eq!(report.version.as_str(), "0.4.1_r2.1a2b3c4");
    let checkout = options.srcdir.join("upstream");
    assert_eq!(*vcs.queried.lock().unwrap(), vec![checkout.clone(), checkout]);
}
