//! Conda platform tags for the running machine.

use std::path::{Path, PathBuf};

/// Map the running OS and architecture to a conda subdir tag, or None when
/// no artifacts are published for the combination.
pub fn subdir() -> Option<&'static str> {
    match (std::env::consts::OS, std::env::consts::ARCH) {
        ("linux", "x86_64") => Some("linux-64"),
        ("linux", "aarch64") => Some("linux-aarch64"),
        ("linux", "powerpc64") => Some("linux-ppc64le"),
        ("macos", "x86_64") => Some("osx-64"),
        ("macos", "aarch64") => Some("osx-arm64"),
        ("windows", "x86_64") => Some("win-64"),
        _ => None,
    }
}

/// Executable filename suffix for the running OS.
pub fn exe_suffix() -> &'static str {
    if cfg!(windows) { ".exe" } else { "" }
}

/// Final on-disk path for an executable named `name` in `dir`.
pub fn target_exe_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}{}", exe_suffix()))
}
