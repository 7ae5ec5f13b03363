//! End-to-end install flows over synthetic archives served by a local mock.

use std::io::Write;

use ensureconda_core::io::extract::ExtractError;
use ensureconda_core::ops;
use ensureconda_core::platform;
use ensureconda_core::EnsureCondaError;
use tempfile::TempDir;

/// Build a tar stream holding `members` as regular files.
fn tar_with(members: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, contents) in members {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, *contents).unwrap();
    }
    builder.into_inner().unwrap()
}

fn tar_bz2_with(members: &[(&str, &[u8])]) -> Vec<u8> {
    let tar = tar_with(members);
    let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
    encoder.write_all(&tar).unwrap();
    encoder.finish().unwrap()
}

/// Build a `.conda` container: a zip with a zstd-compressed tar under the
/// `pkg-conda-standalone` marker name.
fn conda_with(payload_entry: &str, members: &[(&str, &[u8])]) -> Vec<u8> {
    let compressed = zstd::encode_all(&tar_with(members)[..], 0).unwrap();

    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);
    zip.start_file("metadata.json", options).unwrap();
    zip.write_all(b"{}").unwrap();
    zip.start_file(payload_entry, options).unwrap();
    zip.write_all(&compressed).unwrap();
    zip.finish().unwrap().into_inner()
}

fn index_record(version: &str, subdir: &str, build_number: i32, download_url: &str) -> serde_json::Value {
    serde_json::json!({
        "size": 4096,
        "attrs": {"subdir": subdir, "build_number": build_number, "timestamp": build_number as u64 * 100},
        "type": "conda",
        "version": version,
        "download_url": download_url,
    })
}

#[cfg(unix)]
fn assert_executable(path: &std::path::Path) {
    use std::os::unix::fs::PermissionsExt;
    let mode = std::fs::metadata(path).unwrap().permissions().mode();
    assert_eq!(mode & 0o100, 0o100, "owner-execute bit must be set");
}

#[cfg(not(unix))]
fn assert_executable(_path: &std::path::Path) {}

#[tokio::test]
async fn test_micromamba_install_end_to_end() {
    let subdir = platform::subdir().unwrap();
    let payload = b"\x7fELF fake micromamba";
    let archive = tar_bz2_with(&[
        ("info/index.json", b"{}".as_slice()),
        ("bin/micromamba", payload.as_slice()),
    ]);

    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", format!("/api/micromamba/{subdir}/latest").as_str())
        .with_status(200)
        .with_body(archive)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let client = reqwest::Client::new();
    let installed = ops::install_micromamba_from(&client, &server.url(), dir.path())
        .await
        .unwrap();
    mock.assert_async().await;

    assert_eq!(
        installed,
        platform::target_exe_path(dir.path(), "micromamba")
    );
    assert_eq!(std::fs::read(&installed).unwrap(), payload);
    assert_executable(&installed);
}

#[tokio::test]
async fn test_conda_standalone_install_picks_best_candidate() {
    let subdir = platform::subdir().unwrap();
    let payload = b"fake conda.exe contents";
    let archive = conda_with(
        "pkg-conda-standalone-23.11.0-1.tar.zst",
        &[("standalone_conda/conda.exe", payload.as_slice())],
    );

    let mut server = mockito::Server::new_async().await;
    let listing = serde_json::json!([
        index_record("23.1.0", subdir, 0, &format!("{}/pkgs/old.tar.bz2", server.url())),
        index_record("23.11.0", subdir, 1, &format!("{}/pkgs/best.conda", server.url())),
        index_record("24.1.0", "noarch-test", 0, &format!("{}/pkgs/other.conda", server.url())),
    ]);
    let _mock = server
        .mock("GET", "/package/anaconda/conda-standalone/files")
        .with_status(200)
        .with_body(listing.to_string())
        .create_async()
        .await;
    let archive_mock = server
        .mock("GET", "/pkgs/best.conda")
        .with_status(200)
        .with_body(archive)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let client = reqwest::Client::new();
    let installed =
        ops::install_conda_standalone_from(&client, &server.url(), dir.path(), "anaconda")
            .await
            .unwrap();
    archive_mock.assert_async().await;

    assert_eq!(
        installed,
        platform::target_exe_path(dir.path(), "conda_standalone")
    );
    assert_eq!(std::fs::read(&installed).unwrap(), payload);
    assert_executable(&installed);
}

#[tokio::test]
async fn test_conda_standalone_from_tar_bz2_candidate() {
    let subdir = platform::subdir().unwrap();
    let payload = b"older style standalone";
    let archive = tar_bz2_with(&[("standalone_conda/conda.exe", payload.as_slice())]);

    let mut server = mockito::Server::new_async().await;
    let listing = serde_json::json!([index_record(
        "22.9.0",
        subdir,
        0,
        &format!("{}/pkgs/conda-standalone-22.9.0.tar.bz2", server.url())
    )]);
    let _mock = server
        .mock("GET", "/package/anaconda/conda-standalone/files")
        .with_status(200)
        .with_body(listing.to_string())
        .create_async()
        .await;
    let _mock = server
        .mock("GET", "/pkgs/conda-standalone-22.9.0.tar.bz2")
        .with_status(200)
        .with_body(archive)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let client = reqwest::Client::new();
    let installed =
        ops::install_conda_standalone_from(&client, &server.url(), dir.path(), "anaconda")
            .await
            .unwrap();

    assert_eq!(std::fs::read(&installed).unwrap(), payload);
}

#[tokio::test]
async fn test_unrecognized_archive_suffix_fails_fast() {
    let subdir = platform::subdir().unwrap();
    let mut server = mockito::Server::new_async().await;
    let listing = serde_json::json!([index_record(
        "23.1.0",
        subdir,
        0,
        &format!("{}/pkgs/conda-standalone.zip", server.url())
    )]);
    let _mock = server
        .mock("GET", "/package/anaconda/conda-standalone/files")
        .with_status(200)
        .with_body(listing.to_string())
        .create_async()
        .await;
    // No archive mock: classification must fail before any download.

    let dir = TempDir::new().unwrap();
    let client = reqwest::Client::new();
    let err = ops::install_conda_standalone_from(&client, &server.url(), dir.path(), "anaconda")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EnsureCondaError::Extract(ExtractError::UnrecognizedArchive(_))
    ));
}

#[tokio::test]
async fn test_conda_archive_without_marker_entry_is_a_layout_error() {
    let subdir = platform::subdir().unwrap();
    let compressed = zstd::encode_all(
        &tar_with(&[("standalone_conda/conda.exe", b"x".as_slice())])[..],
        0,
    )
    .unwrap();
    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);
    zip.start_file("wrong-name.tar.zst", options).unwrap();
    zip.write_all(&compressed).unwrap();
    let archive = zip.finish().unwrap().into_inner();

    let mut server = mockito::Server::new_async().await;
    let listing = serde_json::json!([index_record(
        "23.1.0",
        subdir,
        0,
        &format!("{}/pkgs/broken.conda", server.url())
    )]);
    let _mock = server
        .mock("GET", "/package/anaconda/conda-standalone/files")
        .with_status(200)
        .with_body(listing.to_string())
        .create_async()
        .await;
    let _mock = server
        .mock("GET", "/pkgs/broken.conda")
        .with_status(200)
        .with_body(archive)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let client = reqwest::Client::new();
    let err = ops::install_conda_standalone_from(&client, &server.url(), dir.path(), "anaconda")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EnsureCondaError::Extract(ExtractError::CondaLayout)
    ));
}

#[tokio::test]
async fn test_archive_missing_expected_member() {
    let subdir = platform::subdir().unwrap();
    let archive = tar_bz2_with(&[("bin/something-else", b"not it".as_slice())]);

    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", format!("/api/micromamba/{subdir}/latest").as_str())
        .with_status(200)
        .with_body(archive)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let client = reqwest::Client::new();
    let err = ops::install_micromamba_from(&client, &server.url(), dir.path())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EnsureCondaError::Extract(ExtractError::MemberNotFound)
    ));
}

#[tokio::test]
async fn test_first_matching_member_wins() {
    // Both mapped paths present: the first one in the tar stream is taken.
    let subdir = platform::subdir().unwrap();
    let first = b"first entry";
    let second = b"second entry";
    let archive = tar_bz2_with(&[
        ("bin/micromamba", first.as_slice()),
        ("Library/bin/micromamba.exe", second.as_slice()),
    ]);

    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", format!("/api/micromamba/{subdir}/latest").as_str())
        .with_status(200)
        .with_body(archive)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let client = reqwest::Client::new();
    let installed = ops::install_micromamba_from(&client, &server.url(), dir.path())
        .await
        .unwrap();

    assert_eq!(std::fs::read(&installed).unwrap(), first);
}
