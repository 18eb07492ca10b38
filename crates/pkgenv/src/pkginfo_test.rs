// Copyright (c) Contributors to the pkgenv project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;
use tempfile::TempDir;

use super::*;

fn recipe() -> BuildRecipe {
    BuildRecipe::from_yaml(
        r#"
api: pkgenv/v0/recipe
name: waybar-pomodoro
release: 2
description: A pomodoro timer for waybar
arch: [x86_64]
license: [MIT]
depends: [gcc-libs]
build_depends: [cargo, git]
provides: [pomodoro]
options: ["!lto"]
"#,
    )
    .unwrap()
}

#[rstest]
fn test_render_contains_every_field() {
    let version = VersionString::new("0.3.0", 42, "abc1234");
    let info = PkgInfo::new(&recipe(), &version, "x86_64", 1_700_000_000, 1024);

    let rendered = info.render();
    let lines: Vec<&str> = rendered.lines().collect();
    assert_eq!(lines[0], "# Generated by pkgenv");
    assert!(lines.contains(&"pkgname = waybar-pomodoro"));
    assert!(lines.contains(&"pkgver = 0.3.0_r42.abc1234-2"));
    assert!(lines.contains(&"pkgdesc = A pomodoro timer for waybar"));
    assert!(lines.contains(&"builddate = 1700000000"));
    assert!(lines.contains(&"size = 1024"));
    assert!(lines.contains(&"license = MIT"));
    assert!(lines.contains(&"depend = gcc-libs"));
    assert!(lines.contains(&"makedepend = cargo"));
    assert!(lines.contains(&"makedepend = git"));
    assert!(lines.contains(&"provides = pomodoro"));
    assert!(lines.contains(&"makepkgopt = !lto"));
}

#[rstest]
fn test_installed_size_and_write() {
    let tmp = TempDir::new().unwrap();
    std::fs::create_dir_all(tmp.path().join("usr/bin")).unwrap();
    std::fs::write(tmp.path().join("usr/bin/tool"), vec![0u8; 100]).unwrap();
    std::fs::write(tmp.path().join("README"), "abc").unwrap();
    assert_eq!(installed_size(tmp.path()).unwrap(), 103);

    let version = VersionString::new("1.0", 1, "deadbee");
    let info = PkgInfo::new(&recipe(), &version, "x86_64", 0, 103);
    let path = info.write(tmp.path()).unwrap();
    assert_eq!(path, tmp.path().join(PKGINFO_FILENAME));
    assert_eq!(std::fs::read_to_string(path).unwrap(), info.render());
}
