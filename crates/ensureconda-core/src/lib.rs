//! ensureconda - locate or install a conda-compatible executable
//!
//! # Overview
//!
//! Many tools need *some* conda implementation on the machine without caring
//! which one. This library finds an acceptable executable on `PATH` or in the
//! per-user site directory, and when nothing qualifies it downloads one: the
//! micromamba "latest" feed, or the best `conda-standalone` build published
//! on anaconda.org for the current platform.
//!
//! # Architecture
//!
//! - **Resolution**: [`registry`] queries the package index and orders
//!   candidates by `(version, build_number, timestamp)` via [`version`].
//! - **Extraction**: [`io::extract`] classifies the download URL, streams the
//!   archive through the right decompressor, and pulls out a single member.
//! - **Installation**: [`io::install`] places the executable atomically
//!   (advisory lock, temp file, rename) so concurrent installers never
//!   observe a partial write.
//! - **Orchestration**: [`ops`] wires the pieces into the two install entry
//!   points plus the high-level [`ops::ensure`] search.

pub mod discovery;
pub mod io;
pub mod ops;
pub mod platform;
pub mod registry;
pub mod version;

// Re-exports for convenience
pub use io::extract::ArchiveKind;
pub use io::install::RetryPolicy;
pub use ops::EnsureCondaError;
pub use ops::EnsureOptions;
pub use ops::ensure;
pub use ops::install_conda_standalone;
pub use ops::install_micromamba;
pub use registry::PackageRecord;

use std::path::PathBuf;

/// Returns the per-user executable directory, or None if it cannot be
/// resolved. `ENSURECONDA_HOME` overrides the platform default.
pub fn try_site_dir() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("ENSURECONDA_HOME") {
        return Some(PathBuf::from(val));
    }
    dirs::data_local_dir().map(|d| d.join("ensure-conda"))
}

/// Canonical site directory for installed executables.
///
/// # Panics
/// Panics if the user's data directory cannot be determined.
pub fn site_dir() -> PathBuf {
    try_site_dir().expect("Could not determine data directory")
}

/// User Agent string
pub const USER_AGENT: &str = concat!("ensureconda/", env!("CARGO_PKG_VERSION"));
