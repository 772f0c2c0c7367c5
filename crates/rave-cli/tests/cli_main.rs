//! Basic CLI tests for the rave-plugins command-line interface.

use assert_cmd::Command;
use predicates::prelude::*;

fn rave_plugins() -> Command {
    let mut cmd = Command::cargo_bin("rave-plugins").unwrap();
    cmd.env_remove("RAVE_PLUGINS").env_remove("RUST_LOG");
    cmd
}

fn fake_module(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join(format!("libbroken.{}", std::env::consts::DLL_EXTENSION));
    std::fs::write(&path, b"not a shared object").unwrap();
    path
}

/// Test that the CLI binary exists and shows help.
#[test]
fn test_cli_help() {
    rave_plugins()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("interfaces"))
        .stdout(predicate::str::contains("probe"))
        .stdout(predicate::str::contains("paths"));
}

/// Test that providing no subcommand shows an error.
#[test]
fn test_no_subcommand_shows_error() {
    rave_plugins().assert().failure();
}

#[test]
fn test_list_empty_directory() {
    let dir = tempfile::tempdir().unwrap();
    fake_module(dir.path());

    rave_plugins()
        .arg("--dir")
        .arg(dir.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No plugins found"));
}

#[test]
fn test_list_json_is_empty_array() {
    let dir = tempfile::tempdir().unwrap();

    rave_plugins()
        .args(["list", "--json", "--dir"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::starts_with("[]"));
}

#[test]
fn test_probe_rejects_non_plugin() {
    let dir = tempfile::tempdir().unwrap();
    let module = fake_module(dir.path());

    rave_plugins()
        .arg("probe")
        .arg(&module)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not a plugin"));
}

#[test]
fn test_probe_missing_file() {
    rave_plugins()
        .args(["probe", "/nonexistent/libnothing.so"])
        .assert()
        .failure();
}

#[test]
fn test_paths_deduplicates() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a");
    let b = dir.path().join("b");
    let joined = std::env::join_paths([&a, &b, &a]).unwrap();

    let output = rave_plugins()
        .env("RAVE_PLUGINS", joined)
        .arg("paths")
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], a.display().to_string());
    assert_eq!(lines[1], b.display().to_string());
    assert_eq!(lines.iter().filter(|l| **l == a.display().to_string()).count(), 1);
}

#[test]
fn test_paths_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("plugins.toml");
    std::fs::write(
        &config,
        format!(
            "search_paths = [{:?}]\ninstall_dir = {:?}\n",
            dir.path().join("custom"),
            dir.path()
        ),
    )
    .unwrap();

    rave_plugins()
        .arg("--config")
        .arg(&config)
        .arg("paths")
        .assert()
        .success()
        .stdout(predicate::str::contains("custom"));
}

#[test]
fn test_paths_without_configuration() {
    rave_plugins()
        .arg("paths")
        .assert()
        .success()
        .stderr(predicate::str::contains("RAVE_PLUGINS is not set"));
}

#[test]
fn test_interfaces_rejects_unknown_type() {
    let dir = tempfile::tempdir().unwrap();

    rave_plugins()
        .args(["interfaces", "--type", "gripper", "--dir"])
        .arg(dir.path())
        .assert()
        .failure();
}
