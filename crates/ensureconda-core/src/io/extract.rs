//! Archive classification and single-member extraction.
//!
//! Two container formats deliver the executables: plain `.tar.bz2` archives
//! (micromamba, older conda-standalone builds) and the `.conda` format, a
//! zip whose payload is a zstd-compressed tar. Both funnel into one tar scan
//! that pulls out the first entry matching a target table and hands it to
//! the installer.

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use async_compression::tokio::bufread::{BzDecoder, ZstdDecoder};
use futures::TryStreamExt;
use thiserror::Error;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;

use crate::io::install::{self, InstallError, RetryPolicy};

/// Zip entries carrying the `.conda` payload start with this marker.
const CONDA_PAYLOAD_PREFIX: &str = "pkg-conda-standalone";

/// Container format inferred from a download URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    TarBz2,
    CondaZip,
    Unrecognized,
}

impl ArchiveKind {
    /// Classify a URL by suffix. The micromamba `/latest` alias always
    /// resolves to a tar.bz2 payload.
    pub fn classify(url: &str) -> Self {
        if url.ends_with(".tar.bz2") || url.ends_with("/latest") {
            ArchiveKind::TarBz2
        } else if url.ends_with(".conda") {
            ArchiveKind::CondaZip
        } else {
            ArchiveKind::Unrecognized
        }
    }
}

/// Archive-internal paths mapped to their on-disk destinations.
///
/// At most one of the mapped paths is expected to exist in any given archive
/// (POSIX and Windows builds place the executable differently).
pub type MemberTargets<'a> = &'a [(&'a str, PathBuf)];

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("unrecognized archive type: {0}")]
    UnrecognizedArchive(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("no pkg-conda-standalone*.tar.zst entry in the .conda archive")]
    CondaLayout,

    #[error("no expected executable member found in the archive")]
    MemberNotFound,

    #[error(transparent)]
    Install(#[from] InstallError),
}

/// Download `url` and install the first tar member matching `targets`.
/// Returns the destination path of the installed member.
pub async fn download_and_unpack(
    client: &reqwest::Client,
    url: &str,
    targets: MemberTargets<'_>,
    policy: &RetryPolicy,
) -> Result<PathBuf, ExtractError> {
    match ArchiveKind::classify(url) {
        ArchiveKind::TarBz2 => unpack_tar_bz2(client, url, targets, policy).await,
        ArchiveKind::CondaZip => unpack_conda(client, url, targets, policy).await,
        ArchiveKind::Unrecognized => Err(ExtractError::UnrecognizedArchive(url.to_string())),
    }
}

/// Stream the response body through bzip2 into the tar scan. Archives run to
/// tens of megabytes; nothing is buffered whole.
async fn unpack_tar_bz2(
    client: &reqwest::Client,
    url: &str,
    targets: MemberTargets<'_>,
    policy: &RetryPolicy,
) -> Result<PathBuf, ExtractError> {
    let response = crate::io::http::get(client, url).await?;
    let stream = response.bytes_stream().map_err(std::io::Error::other);
    let decoder = BzDecoder::new(StreamReader::new(Box::pin(stream)));
    extract_tar_member(decoder, targets, policy).await
}

/// Buffer the `.conda` container and unwrap zip -> zstd -> tar. The zip
/// central directory lives at the end of the file, so random access is
/// required; `.conda` payloads are small enough to hold in memory.
async fn unpack_conda(
    client: &reqwest::Client,
    url: &str,
    targets: MemberTargets<'_>,
    policy: &RetryPolicy,
) -> Result<PathBuf, ExtractError> {
    let response = crate::io::http::get(client, url).await?;
    let body = response.bytes().await?;

    let mut archive = zip::ZipArchive::new(Cursor::new(body.as_ref()))?;
    let payload_name = archive
        .file_names()
        .find(|name| name.starts_with(CONDA_PAYLOAD_PREFIX) && name.ends_with(".tar.zst"))
        .map(str::to_owned)
        .ok_or(ExtractError::CondaLayout)?;

    let mut payload = Vec::new();
    archive.by_name(&payload_name)?.read_to_end(&mut payload)?;

    let decoder = ZstdDecoder::new(&payload[..]);
    extract_tar_member(decoder, targets, policy).await
}

/// Walk a tar stream and install the first regular-file entry present in
/// `targets`. The scan stops at the first hit; later entries are never
/// considered, even if they are also mapped.
pub async fn extract_tar_member<R>(
    reader: R,
    targets: MemberTargets<'_>,
    policy: &RetryPolicy,
) -> Result<PathBuf, ExtractError>
where
    R: AsyncRead + Unpin,
{
    let mut archive = tokio_tar::Archive::new(reader);
    let mut entries = archive.entries()?;

    while let Some(entry) = entries.try_next().await? {
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let (dest, size, mode) = {
            let path = entry.path()?;
            let Some((name, dest)) = targets.iter().find(|(name, _)| Path::new(name) == &*path)
            else {
                continue;
            };
            tracing::debug!("extracting {name} -> {}", dest.display());
            (dest.clone(), entry.header().size()?, entry.header().mode()?)
        };
        install::install_executable(entry, size, mode, &dest, policy).await?;
        return Ok(dest);
    }

    Err(ExtractError::MemberNotFound)
}
