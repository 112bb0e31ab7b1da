//! Command Line Tests

mod common;

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn cli() -> Command {
    let mut cmd = Command::cargo_bin("chunked-uploadr").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("upload"))
        .stdout(predicate::str::contains("complete"));
}

#[test]
fn test_upload_without_file_fails() {
    cli()
        .args(["--base-url", "http://127.0.0.1:1/upload", "upload"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no file provided"));
}

#[test]
fn test_zero_chunk_size_rejected() {
    cli()
        .args(["upload", "whatever.bin", "--chunk-size", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("chunk_size"));
}

#[test]
fn test_unknown_identity_rejected() {
    cli()
        .args(["upload", "whatever.bin", "--identity", "md5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("md5"));
}

#[test]
fn test_complete_rejects_zero_total_chunks() {
    cli()
        .args(["complete", "--file-id", "abc", "--file-name", "a.bin"])
        .args(["--total-chunks", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("total-chunks"));
}

#[test]
fn test_missing_config_file_fails() {
    cli()
        .args(["-c", "/nonexistent/chunked-uploadr.yaml", "upload", "a.bin"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_upload_then_complete_against_fake_server() {
    let fake = common::FakeUploadServer::start().await;
    let base_url = fake.base_url();

    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    tmp.write_all(b"hello chunked world").unwrap();
    let path = tmp.path().to_path_buf();
    let name = path.file_name().unwrap().to_string_lossy().into_owned();

    let url = base_url.clone();
    tokio::task::spawn_blocking(move || {
        cli()
            .args(["--base-url", &url, "upload"])
            .arg(&path)
            .args(["--chunk-size", "4", "--batch-size", "2"])
            .assert()
            .success();
    })
    .await
    .unwrap();

    assert_eq!(fake.assembled(&name).unwrap(), b"hello chunked world".to_vec());
    assert_eq!(fake.received().len(), 5);

    let file_id = fake.state.lock().chunks.keys().next().cloned().unwrap();
    tokio::task::spawn_blocking(move || {
        cli()
            .args(["--base-url", &base_url, "complete"])
            .args(["--file-id", &file_id, "--file-name", &name])
            .args(["--total-chunks", "5"])
            .assert()
            .success();
    })
    .await
    .unwrap();

    assert_eq!(fake.state.lock().complete_calls, 2);
}
