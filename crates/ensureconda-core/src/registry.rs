//! Anaconda.org package index client.
//!
//! The files API (`/package/<channel>/conda-standalone/files`) returns one
//! JSON record per published artifact. Many records share a version across
//! rebuilds, so selection orders by version, then build number, then
//! timestamp; the caller takes the last element of the returned list.

use std::sync::LazyLock;

use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

/// Default package-index endpoint.
pub const DEFAULT_INDEX_BASE: &str = "https://api.anaconda.org";

static VALID_CHANNEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("static pattern"));

/// Build metadata nested under `attrs` in the files API response.
#[derive(Debug, Clone, Deserialize)]
pub struct PackageAttrs {
    pub subdir: String,
    #[serde(default)]
    pub build_number: i32,
    #[serde(default)]
    pub timestamp: u64,
}

/// One published artifact in the package index.
#[derive(Debug, Clone, Deserialize)]
pub struct PackageRecord {
    #[serde(default)]
    pub size: u64,
    pub attrs: PackageAttrs,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub version: String,
    pub download_url: String,
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error(
        "invalid channel name {0:?}: channel names must be alphanumeric and may contain hyphens and underscores"
    )]
    InvalidChannel(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to parse package index: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("cannot order version {version:?}: {source}")]
    BadVersion {
        version: String,
        source: semver::Error,
    },

    #[error("no conda-standalone candidate found for {subdir}")]
    NoCandidates { subdir: String },
}

/// Validate a channel name against the allow-list pattern.
///
/// Runs before any I/O so a hostile channel value can never reach a URL.
pub fn validate_channel(channel: &str) -> Result<(), ResolveError> {
    if VALID_CHANNEL.is_match(channel) {
        Ok(())
    } else {
        Err(ResolveError::InvalidChannel(channel.to_string()))
    }
}

/// Fetch the channel's conda-standalone listing, filter it to `subdir`, and
/// return the candidates sorted ascending. The last element is the one to
/// install; an empty result is an error, never a value.
pub async fn resolve_candidates(
    client: &Client,
    base_url: &str,
    channel: &str,
    subdir: &str,
) -> Result<Vec<PackageRecord>, ResolveError> {
    validate_channel(channel)?;

    let url = format!("{base_url}/package/{channel}/conda-standalone/files");
    tracing::debug!("fetching package index from {url}");

    let body = client
        .get(&url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    let records: Vec<PackageRecord> = serde_json::from_str(&body)?;

    let candidates: Vec<PackageRecord> = records
        .into_iter()
        .filter(|r| r.attrs.subdir == subdir)
        .collect();
    if candidates.is_empty() {
        return Err(ResolveError::NoCandidates {
            subdir: subdir.to_string(),
        });
    }

    let candidates = crate::version::sort_candidates(candidates)?;
    tracing::debug!("{} candidate(s) for {subdir}", candidates.len());
    Ok(candidates)
}
