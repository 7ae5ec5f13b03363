//! Atomic placement of an extracted executable.
//!
//! Multiple independent processes may race to install the same tool (two
//! build jobs on one machine, for instance). The write path is: advisory
//! lock on `<dest>.lock`, stream into `<dest>.tmp`, verify the byte count,
//! set the exec bit, rename onto the destination. Rename is atomic within a
//! filesystem, so readers of the destination see either the old file or the
//! complete new one, never a partial write. The `.lock` sibling may remain
//! on disk after release; that is harmless.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fs2::FileExt;
use thiserror::Error;
use tokio::io::AsyncRead;

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("could not acquire install lock for {} after {attempts} attempts", .path.display())]
    Contention { path: PathBuf, attempts: u32 },

    #[error("unexpected bytes written: wrote {written}, want {expected}")]
    SizeMismatch { written: u64, expected: u64 },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Bounded exponential backoff for the staging step.
///
/// Lock acquisition is a non-blocking try-lock, so an attempt that finds the
/// lock held must back off and come around again rather than fail outright.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

/// Write `expected_size` bytes from `reader` to `dest`, atomically.
///
/// `mode` carries the tar entry's permission bits for the temp file; the
/// owner-execute bit is set afterwards regardless, since archive permission
/// bits are not reliably preserved across platforms.
pub async fn install_executable<R>(
    mut reader: R,
    expected_size: u64,
    mode: u32,
    dest: &Path,
    policy: &RetryPolicy,
) -> Result<(), InstallError>
where
    R: AsyncRead + Unpin,
{
    let lock_path = sibling(dest, ".lock");
    let tmp_path = sibling(dest, ".tmp");

    let (lock, mut tmp) = stage_with_retry(&lock_path, &tmp_path, mode, policy).await?;

    // The entry stream is consumed here and cannot be replayed; failures past
    // this point propagate without another attempt.
    let written = tokio::io::copy(&mut reader, &mut tmp).await?;
    tmp.sync_all().await?;
    drop(tmp);

    if written != expected_size {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(InstallError::SizeMismatch {
            written,
            expected: expected_size,
        });
    }

    set_executable(&tmp_path).await?;
    tokio::fs::rename(&tmp_path, dest).await?;

    drop(lock);
    Ok(())
}

/// Acquire the advisory lock and open the temp file, retrying with backoff.
async fn stage_with_retry(
    lock_path: &Path,
    tmp_path: &Path,
    mode: u32,
    policy: &RetryPolicy,
) -> Result<(std::fs::File, tokio::fs::File), InstallError> {
    let attempts = policy.attempts.max(1);
    let mut delay = policy.initial_delay;
    let mut attempt = 0;
    loop {
        attempt += 1;
        match try_stage(lock_path, tmp_path, mode).await {
            Ok(staged) => return Ok(staged),
            Err(err) if attempt >= attempts => {
                return Err(if is_contended(&err) {
                    InstallError::Contention {
                        path: lock_path.to_path_buf(),
                        attempts,
                    }
                } else {
                    InstallError::Io(err)
                });
            }
            Err(err) => {
                tracing::debug!("install attempt {attempt}/{attempts} failed: {err}");
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(policy.max_delay);
            }
        }
    }
}

async fn try_stage(
    lock_path: &Path,
    tmp_path: &Path,
    mode: u32,
) -> io::Result<(std::fs::File, tokio::fs::File)> {
    let lock = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(lock_path)?;
    lock.try_lock_exclusive()?;

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(mode);
    #[cfg(not(unix))]
    let _ = mode;
    let tmp = options.open(tmp_path).await?;

    Ok((lock, tmp))
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

#[cfg(unix)]
async fn set_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(perms.mode() | 0o100);
    tokio::fs::set_permissions(path, perms).await
}

#[cfg(not(unix))]
async fn set_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Append `suffix` to the full file name (`conda_standalone.exe` ->
/// `conda_standalone.exe.tmp`), unlike `Path::with_extension` which would
/// replace the existing extension.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}
