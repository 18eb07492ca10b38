// Copyright (c) Contributors to the pkgenv project.
// SPDX-License-Identifier: Apache-2.0

//! System identifiers used as keys in the `systems:` table.

/// Key that applies to every system.
pub const ANY_SYSTEM: &str = "*";

/// Identifier of the running host, e.g. `x86_64-linux` or `aarch64-darwin`.
pub fn current_system() -> String {
    system_identifier(std::env::consts::ARCH, std::env::consts::OS)
}

/// Build a system identifier from an architecture and an operating system
/// name as reported by [`std::env::consts`].
pub fn system_identifier(arch: &str, os: &str) -> String {
    let os = match os {
        "macos" => "darwin",
        other => other,
    };
    format!("{arch}-{os}")
}

/// Architecture part of a system identifier (`CARCH` in build stages).
pub fn system_arch(system: &str) -> &str {
    system.split_once('-').map(|(arch, _)| arch).unwrap_or(system)
}
