//! Discovery of conda-family executables already on the machine.
//!
//! Candidates come from the site directory first (executables a previous
//! invocation installed), then from `PATH`. Version probing shells out to
//! `<exe> --version`; a candidate that cannot be probed is skipped with a
//! warning rather than failing the whole search, since foreign binaries on
//! `PATH` are outside our control.

use std::path::{Path, PathBuf};
use std::process::Command;

use semver::Version;

use crate::platform;

/// All `conda` candidates, site dir first.
pub fn conda_executables() -> Vec<PathBuf> {
    executables_named("conda")
}

/// All `conda_standalone` candidates, site dir first.
pub fn conda_standalone_executables() -> Vec<PathBuf> {
    executables_named("conda_standalone")
}

/// All `mamba` candidates, site dir first.
pub fn mamba_executables() -> Vec<PathBuf> {
    executables_named("mamba")
}

/// All `micromamba` candidates, site dir first.
pub fn micromamba_executables() -> Vec<PathBuf> {
    executables_named("micromamba")
}

fn executables_named(name: &str) -> Vec<PathBuf> {
    let exe = format!("{name}{}", platform::exe_suffix());
    let mut found = Vec::new();
    if let Some(site) = crate::try_site_dir() {
        let candidate = site.join(&exe);
        if candidate.is_file() {
            found.push(candidate);
        }
    }
    if let Ok(paths) = which::which_all(&exe) {
        found.extend(paths);
    }
    found
}

/// Version of a conda executable, from the `conda X.Y.Z` line.
pub fn determine_conda_version(exe: &Path) -> Option<Version> {
    parse_conda_version(&version_output(exe)?)
}

/// Version of a mamba executable. Mamba v1 prints a `mamba X.Y.Z` line
/// followed by a conda line; v2 prints a bare version like micromamba.
pub fn determine_mamba_version(exe: &Path) -> Option<Version> {
    parse_mamba_version(&version_output(exe)?)
}

/// Version of a micromamba executable (bare version on the first line).
pub fn determine_micromamba_version(exe: &Path) -> Option<Version> {
    parse_micromamba_version(&version_output(exe)?)
}

fn version_output(exe: &Path) -> Option<String> {
    match Command::new(exe).arg("--version").output() {
        Ok(out) if out.status.success() => Some(String::from_utf8_lossy(&out.stdout).into_owned()),
        Ok(out) => {
            tracing::warn!("{} --version exited with {}", exe.display(), out.status);
            None
        }
        Err(err) => {
            tracing::warn!("could not run {} --version: {err}", exe.display());
            None
        }
    }
}

fn parse_conda_version(out: &str) -> Option<Version> {
    out.lines()
        .find_map(|line| line.strip_prefix("conda "))
        .and_then(|v| parse_loose(v.trim()))
}

fn parse_mamba_version(out: &str) -> Option<Version> {
    out.lines()
        .find_map(|line| line.strip_prefix("mamba "))
        .and_then(|v| parse_loose(v.trim()))
        .or_else(|| parse_micromamba_version(out))
}

fn parse_micromamba_version(out: &str) -> Option<Version> {
    let line = out.lines().next()?;
    parse_loose(line.split_whitespace().next_back()?)
}

/// Parse a version, padding missing minor/patch components (`1.5` -> 1.5.0).
fn parse_loose(raw: &str) -> Option<Version> {
    if let Ok(v) = Version::parse(raw) {
        return Some(v);
    }
    let mut parts = raw.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let patch = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    Some(Version::new(major, minor, patch))
}
