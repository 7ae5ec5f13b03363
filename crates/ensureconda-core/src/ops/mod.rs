//! Install entry points and the high-level `ensure` search.

pub mod error;

pub use error::EnsureCondaError;

use std::path::{Path, PathBuf};

use reqwest::Client;
use semver::Version;

use crate::discovery;
use crate::io::extract;
use crate::io::install::RetryPolicy;
use crate::platform;
use crate::registry;

/// Base URL of the micromamba "latest" feed.
pub const MICROMAMBA_BASE_URL: &str = "https://micro.mamba.pm";

/// Install the newest micromamba for this platform into `install_dir` and
/// return the installed path.
pub async fn install_micromamba(
    client: &Client,
    install_dir: &Path,
) -> Result<PathBuf, EnsureCondaError> {
    install_micromamba_from(client, MICROMAMBA_BASE_URL, install_dir).await
}

/// [`install_micromamba`] against an explicit feed base (mirrors, tests).
pub async fn install_micromamba_from(
    client: &Client,
    base_url: &str,
    install_dir: &Path,
) -> Result<PathBuf, EnsureCondaError> {
    let subdir = platform_subdir()?;
    tokio::fs::create_dir_all(install_dir).await?;

    let url = format!("{base_url}/api/micromamba/{subdir}/latest");
    let dest = platform::target_exe_path(install_dir, "micromamba");
    let targets = [
        ("Library/bin/micromamba.exe", dest.clone()),
        ("bin/micromamba", dest),
    ];

    tracing::info!("installing micromamba from {url}");
    let installed =
        extract::download_and_unpack(client, &url, &targets, &RetryPolicy::default()).await?;
    tracing::info!("installed {}", installed.display());
    Ok(installed)
}

/// Install the best published conda-standalone for this platform from
/// `channel` into `install_dir` and return the installed path.
pub async fn install_conda_standalone(
    client: &Client,
    install_dir: &Path,
    channel: &str,
) -> Result<PathBuf, EnsureCondaError> {
    install_conda_standalone_from(client, registry::DEFAULT_INDEX_BASE, install_dir, channel).await
}

/// [`install_conda_standalone`] against an explicit index base.
pub async fn install_conda_standalone_from(
    client: &Client,
    base_url: &str,
    install_dir: &Path,
    channel: &str,
) -> Result<PathBuf, EnsureCondaError> {
    let subdir = platform_subdir()?;
    tokio::fs::create_dir_all(install_dir).await?;

    let candidates = registry::resolve_candidates(client, base_url, channel, subdir).await?;
    let chosen = candidates
        .last()
        .ok_or_else(|| registry::ResolveError::NoCandidates {
            subdir: subdir.to_string(),
        })?;

    let url = absolute_download_url(&chosen.download_url);
    let targets = [(
        "standalone_conda/conda.exe",
        platform::target_exe_path(install_dir, "conda_standalone"),
    )];

    tracing::info!(
        "installing conda-standalone {} (build {}) from {url}",
        chosen.version,
        chosen.attrs.build_number
    );
    let installed =
        extract::download_and_unpack(client, &url, &targets, &RetryPolicy::default()).await?;
    tracing::info!("installed {}", installed.display());
    Ok(installed)
}

/// The index publishes schema-relative URLs (`//anaconda.org/...`); absolute
/// URLs pass through untouched.
fn absolute_download_url(raw: &str) -> String {
    if raw.starts_with("//") {
        format!("https:{raw}")
    } else {
        raw.to_string()
    }
}

fn platform_subdir() -> Result<&'static str, EnsureCondaError> {
    platform::subdir().ok_or(EnsureCondaError::UnsupportedPlatform {
        os: std::env::consts::OS,
        arch: std::env::consts::ARCH,
    })
}

/// Selection switches for [`ensure`].
#[derive(Debug, Clone)]
pub struct EnsureOptions {
    /// Consider mamba executables.
    pub mamba: bool,
    /// Consider micromamba executables, installing one if allowed.
    pub micromamba: bool,
    /// Consider conda executables.
    pub conda: bool,
    /// Consider conda-standalone executables, installing one if allowed.
    pub conda_exe: bool,
    /// Only search; never download anything.
    pub no_install: bool,
    /// Minimum acceptable conda version.
    pub min_conda_version: Option<Version>,
    /// Minimum acceptable mamba/micromamba version.
    pub min_mamba_version: Option<Version>,
    /// Channel hosting conda-standalone.
    pub channel: String,
    /// Where installs land; defaults to the site directory.
    pub install_dir: Option<PathBuf>,
}

impl Default for EnsureOptions {
    fn default() -> Self {
        Self {
            mamba: true,
            micromamba: true,
            conda: true,
            conda_exe: true,
            no_install: false,
            min_conda_version: None,
            min_mamba_version: None,
            channel: "anaconda".to_string(),
            install_dir: None,
        }
    }
}

/// Find an acceptable conda-family executable, installing one when nothing
/// on the machine qualifies. Preference order: mamba, micromamba, conda,
/// conda-standalone. Returns None when every avenue is disabled or declined.
pub async fn ensure(
    client: &Client,
    options: &EnsureOptions,
) -> Result<Option<PathBuf>, EnsureCondaError> {
    let install_dir = options.install_dir.clone().unwrap_or_else(crate::site_dir);

    if options.mamba {
        for exe in discovery::mamba_executables() {
            if meets(
                &exe,
                options.min_mamba_version.as_ref(),
                discovery::determine_mamba_version,
            ) {
                return Ok(Some(exe));
            }
        }
    }

    if options.micromamba {
        for exe in discovery::micromamba_executables() {
            if meets(
                &exe,
                options.min_mamba_version.as_ref(),
                discovery::determine_micromamba_version,
            ) {
                return Ok(Some(exe));
            }
        }
        if !options.no_install {
            let exe = install_micromamba(client, &install_dir).await?;
            if meets(
                &exe,
                options.min_mamba_version.as_ref(),
                discovery::determine_micromamba_version,
            ) {
                return Ok(Some(exe));
            }
        }
    }

    if options.conda {
        for exe in discovery::conda_executables() {
            if meets(
                &exe,
                options.min_conda_version.as_ref(),
                discovery::determine_conda_version,
            ) {
                return Ok(Some(exe));
            }
        }
    }

    if options.conda_exe {
        for exe in discovery::conda_standalone_executables() {
            if meets(
                &exe,
                options.min_conda_version.as_ref(),
                discovery::determine_conda_version,
            ) {
                return Ok(Some(exe));
            }
        }
        if !options.no_install {
            let exe = install_conda_standalone(client, &install_dir, &options.channel).await?;
            if meets(
                &exe,
                options.min_conda_version.as_ref(),
                discovery::determine_conda_version,
            ) {
                return Ok(Some(exe));
            }
        }
    }

    Ok(None)
}

fn meets(
    exe: &Path,
    min: Option<&Version>,
    probe: fn(&Path) -> Option<Version>,
) -> bool {
    match min {
        None => true,
        Some(min) => probe(exe).is_some_and(|v| v >= *min),
    }
}
