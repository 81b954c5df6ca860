#![allow(deprecated)]

use assert_cmd::cargo::CommandCargoExt;
use assert_cmd::prelude::*;
use std::path::Path;
use std::process::Command;

/// Config file that keeps the token inside `dir`
fn write_config(dir: &Path) -> std::path::PathBuf {
    let config_path = dir.join("config.toml");
    let token_path = dir.join("token.json");
    std::fs::write(
        &config_path,
        format!(
            "[auth]\ntoken_path = {:?}\n\n[logging]\nlevel = \"warn\"\n",
            token_path.to_string_lossy()
        ),
    )
    .unwrap();
    config_path
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("drive-manager").unwrap();
    cmd.arg("--help");
    let output = cmd.assert().success().get_output().stdout.clone();
    let help = String::from_utf8(output).unwrap();

    for subcommand in ["list", "upload", "download", "status", "logout", "tui"] {
        assert!(help.contains(subcommand), "help is missing {subcommand}");
    }
}

#[test]
fn test_cli_status_without_token() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(dir.path());

    let mut cmd = Command::cargo_bin("drive-manager").unwrap();
    cmd.arg("--config").arg(&config_path).arg("status");
    let output = cmd.assert().success().get_output().stdout.clone();

    assert!(String::from_utf8(output).unwrap().contains("not signed in"));
}

#[test]
fn test_cli_logout_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(dir.path());

    for _ in 0..2 {
        let mut cmd = Command::cargo_bin("drive-manager").unwrap();
        cmd.arg("--config").arg(&config_path).arg("logout");
        cmd.assert().success();
    }
    assert!(!dir.path().join("token.json").exists());
}

#[test]
fn test_cli_list_requires_credentials_file() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(dir.path());

    let mut cmd = Command::cargo_bin("drive-manager").unwrap();
    cmd.arg("--config").arg(&config_path).arg("list");
    let output = cmd.assert().failure().get_output().stderr.clone();

    assert!(
        String::from_utf8(output)
            .unwrap()
            .contains("No credentials file selected")
    );
    assert!(!dir.path().join("token.json").exists());
}

#[test]
fn test_cli_invalid_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    std::fs::write(&config_path, "[drive]\npage_size = 0\n").unwrap();

    let mut cmd = Command::cargo_bin("drive-manager").unwrap();
    cmd.arg("--config").arg(&config_path).arg("status");
    cmd.assert().failure();
}
