//! CLI integration tests
//!
//! Tests the rider-link CLI using assert_cmd. Every test points the config
//! and credentials at a temp dir and never reaches a real server.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("Failed to create temp dir"),
        }
    }

    fn config(&self) -> std::path::PathBuf {
        self.dir.path().join("config.toml")
    }

    fn credentials(&self) -> std::path::PathBuf {
        self.dir.path().join("credentials.json")
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("rider-link")
            .expect("Failed to locate rider-link binary - ensure it's built before running tests");
        cmd.env_remove("RIDER_LINK_TOKEN")
            .env_remove("RIDER_LINK_USER_ID")
            .env_remove("RIDER_LINK_SERVER")
            .arg("--config")
            .arg(self.config())
            .arg("--credentials")
            .arg(self.credentials());
        cmd
    }
}

#[test]
fn test_cli_help() {
    Sandbox::new()
        .cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("rider-link"))
        .stdout(predicate::str::contains("Find a rider"));
}

#[test]
fn test_cli_version() {
    Sandbox::new()
        .cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("rider-link"));
}

#[test]
fn test_cli_search_help() {
    Sandbox::new()
        .cmd()
        .args(["search", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--delivery"))
        .stdout(predicate::str::contains("--lat"));
}

#[test]
fn test_cli_unknown_command() {
    Sandbox::new()
        .cmd()
        .arg("nonexistent-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_cli_search_requires_pickup() {
    Sandbox::new()
        .cmd()
        .args(["search", "--delivery", "delivery.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--lat"));
}

#[test]
fn test_cli_config_path() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_cli_config_init_set_get() {
    let sandbox = Sandbox::new();
    sandbox.cmd().args(["config", "init"]).assert().success();
    assert!(sandbox.config().exists());

    sandbox
        .cmd()
        .args(["config", "set", "server_url", "https://dispatch.example.com"])
        .assert()
        .success();

    sandbox
        .cmd()
        .args(["config", "get", "server_url"])
        .assert()
        .success()
        .stdout(predicate::str::contains("https://dispatch.example.com"));

    sandbox
        .cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("connect_timeout"));
}

#[test]
fn test_cli_status_without_credentials() {
    Sandbox::new()
        .cmd()
        .arg("status")
        .assert()
        .success()
        .stderr(predicate::str::contains("Not signed in"))
        .stdout(predicate::str::contains("disconnected"));
}

#[test]
fn test_cli_login_logout() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["login", "--token", "tok-123", "--user-id", "user-9"])
        .assert()
        .success()
        .stdout(predicate::str::contains("user-9"));

    let stored = std::fs::read_to_string(sandbox.credentials()).expect("Credentials written");
    assert!(stored.contains("tok-123"));
    assert!(stored.contains("\"userId\""));

    sandbox.cmd().arg("logout").assert().success();
    assert!(!sandbox.credentials().exists());
}

#[test]
fn test_cli_login_rejects_blank_token() {
    Sandbox::new()
        .cmd()
        .args(["login", "--token", " ", "--user-id", "user-9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Token must not be empty"));
}

#[test]
fn test_cli_search_without_credentials() {
    let sandbox = Sandbox::new();
    let delivery = sandbox.dir.path().join("delivery.json");
    std::fs::write(&delivery, r#"{"_id":"D1"}"#).expect("Failed to write delivery");

    sandbox
        .cmd()
        .arg("search")
        .arg("--delivery")
        .arg(&delivery)
        .args(["--lat", "-36.85", "--lng", "174.76"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not signed in"));
}

#[test]
fn test_cli_search_with_invalid_delivery_file() {
    let sandbox = Sandbox::new();
    let delivery = sandbox.dir.path().join("delivery.json");
    std::fs::write(&delivery, "not json").expect("Failed to write delivery");

    sandbox
        .cmd()
        .arg("search")
        .arg("--delivery")
        .arg(&delivery)
        .args(["--lat", "1.0", "--lng", "2.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid delivery JSON"));
}
