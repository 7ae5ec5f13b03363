//! Top-level errors for the install entry points.

use thiserror::Error;

use crate::io::extract::ExtractError;
use crate::io::install::InstallError;
use crate::registry::ResolveError;

#[derive(Error, Debug)]
pub enum EnsureCondaError {
    #[error("unsupported platform: {os}/{arch}")]
    UnsupportedPlatform {
        os: &'static str,
        arch: &'static str,
    },

    #[error("failed to resolve conda-standalone candidates: {0}")]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Install(#[from] InstallError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
