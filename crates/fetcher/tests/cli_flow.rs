//! End-to-end tests from configuration file to response.
//!
//! These tests load a TOML config from disk, build the policy from it, run
//! requests through the pipeline and shape the responses:
//! - Accepted files: headers, ranges, checksums
//! - Rejections: status codes and safe messages only

use std::fs;
use std::path::Path;

use download::{FileAccess, RejectionKind};
use fetcher::transport::{sha256_hex, stream_range, ByteRange, ResponseHead};
use fetcher::Config;
use tempfile::TempDir;

/// Write a config file pointing at `root` and load it back.
fn load_config(dir: &Path, root: &Path, extra: &str) -> Config {
    let config_path = dir.join("config.toml");
    let contents = format!(
        "[downloads]\nroot = {:?}\n{}\n[logging]\nlevel = \"debug\"\n",
        root.to_string_lossy(),
        extra
    );
    fs::write(&config_path, contents).unwrap();
    Config::load(&config_path).unwrap()
}

fn setup(extra: &str) -> (FileAccess, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("files");
    fs::create_dir(&root).unwrap();

    let config = load_config(temp_dir.path(), &root, extra);
    let access = FileAccess::new(config.policy().unwrap());
    (access, temp_dir)
}

// =============================================================================
// Accepted requests
// =============================================================================

#[tokio::test]
async fn test_serve_whole_file() {
    let (access, temp_dir) = setup("");
    fs::write(temp_dir.path().join("files/notes.txt"), vec![b'n'; 42]).unwrap();

    let mut file = access.open("notes.txt").await.into_result().unwrap();
    let head = ResponseHead::for_file(&file);
    assert_eq!(head.status, 200);
    assert_eq!(head.header("Content-Type"), Some("text/plain"));
    assert_eq!(head.header("Content-Length"), Some("42"));

    let mut body = Vec::new();
    let written = stream_range(&mut file.handle, ByteRange::full(file.size), &mut body)
        .await
        .unwrap();
    assert_eq!(written, 42);
    assert_eq!(body, vec![b'n'; 42]);
}

#[tokio::test]
async fn test_serve_range_of_pdf() {
    let (access, temp_dir) = setup("allowed_extensions = [\"pdf\"]");
    fs::write(temp_dir.path().join("files/report.pdf"), b"%PDF-1.7 body bytes").unwrap();

    let mut file = access.open("report.pdf").await.into_result().unwrap();
    let range = ByteRange::new(0, Some(4), file.size).unwrap();
    let head = ResponseHead::for_range(&file, range);
    assert_eq!(head.status, 206);
    assert_eq!(head.header("Content-Range"), Some("bytes 0-3/19"));

    let mut body = Vec::new();
    stream_range(&mut file.handle, range, &mut body).await.unwrap();
    assert_eq!(body, b"%PDF");
}

#[tokio::test]
async fn test_checksum_then_stream_same_handle() {
    let (access, temp_dir) = setup("");
    fs::write(temp_dir.path().join("files/hello.txt"), b"hello").unwrap();

    let mut file = access.open("hello.txt").await.into_result().unwrap();
    let digest = sha256_hex(&mut file.handle).await.unwrap();
    assert_eq!(
        digest,
        "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
    );

    let mut body = Vec::new();
    stream_range(&mut file.handle, ByteRange::full(file.size), &mut body)
        .await
        .unwrap();
    assert_eq!(body, b"hello");
}

// =============================================================================
// Rejections
// =============================================================================

#[tokio::test]
async fn test_rejections_map_to_status() {
    let (access, temp_dir) = setup("max_bytes = 1000");
    let files = temp_dir.path().join("files");
    fs::write(files.join("big.txt"), vec![b'b'; 1001]).unwrap();
    fs::write(files.join("fake.pdf"), b"MZ not a pdf").unwrap();
    fs::write(files.join("run.exe"), b"MZ").unwrap();

    let cases = [
        ("../etc/passwd", RejectionKind::InvalidPath, 400),
        ("", RejectionKind::InvalidName, 400),
        ("run.exe", RejectionKind::TypeNotAllowed, 400),
        ("fake.pdf", RejectionKind::TypeMismatch, 400),
        ("missing.txt", RejectionKind::NotFound, 404),
        ("big.txt", RejectionKind::TooLarge, 413),
    ];

    for (name, kind, status) in cases {
        let rejection = access.open(name).await.into_result().unwrap_err();
        assert_eq!(rejection.kind, kind, "request {name:?}");

        let head = ResponseHead::for_rejection(&rejection);
        assert_eq!(head.status, status, "request {name:?}");
        assert_eq!(head.message, Some(kind.safe_message()));
    }
}

#[tokio::test]
async fn test_rejection_head_leaks_no_paths() {
    let (access, _temp_dir) = setup("");
    let root = access.policy().root().to_string_lossy().to_string();

    let rejection = access.open("missing.txt").await.into_result().unwrap_err();
    let text = ResponseHead::for_rejection(&rejection).to_string();
    assert!(!text.contains(&root));
    assert!(!text.contains("missing.txt"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlink_rejected_through_config() {
    use std::os::unix::fs::symlink;

    let (access, temp_dir) = setup("");
    let secret = temp_dir.path().join("secret.txt");
    fs::write(&secret, b"top secret").unwrap();
    symlink(&secret, temp_dir.path().join("files/link.txt")).unwrap();

    let outcome = access.open("link.txt").await;
    assert_eq!(outcome.rejection_kind(), Some(RejectionKind::PathNotAllowed));
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_effective_config_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("files");
    fs::create_dir(&root).unwrap();

    let config = load_config(
        temp_dir.path(),
        &root,
        "allowed_extensions = [\"TXT\", \".txt\", \"Png\"]",
    );
    let policy = config.policy().unwrap();
    let effective = config.effective(&policy);

    let reloaded = Config::from_toml(&effective.to_toml().unwrap()).unwrap();
    assert_eq!(reloaded.downloads.allowed_extensions, vec![".png", ".txt"]);
    assert_eq!(reloaded.logging.level, "debug");
    assert!(reloaded.policy().is_ok());
}

#[test]
fn test_config_with_missing_root_fails() {
    let temp_dir = TempDir::new().unwrap();
    let config = load_config(temp_dir.path(), &temp_dir.path().join("absent"), "");

    assert!(config.policy().is_err());
}
