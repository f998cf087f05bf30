use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::NamedTempFile;

fn write_temp_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp config");
    file.write_all(contents.as_bytes()).expect("write temp config");
    file
}

fn ballast() -> Command {
    let mut cmd = Command::cargo_bin("ballast").expect("ballast binary");
    cmd.env_remove("BALLAST_REDIS_URL").env_remove("RUST_LOG");
    cmd
}

#[test]
fn validate_prints_summary() {
    let file = write_temp_config(
        "[cache.quotes]\ndefault_ttl_secs = 5\n\n[throttle.presets.orders]\nmax_requests = 20\nwindow_secs = 1\n",
    );

    ballast()
        .args(["validate", "--config"])
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ Configuration file is valid"))
        .stdout(predicate::str::contains("orders: 20 requests / 1s"))
        .stdout(predicate::str::contains("quotes: default ttl 5s, capacity unbounded"));
}

#[test]
fn validate_returns_nonzero_on_config_error() {
    let file = write_temp_config("[throttle.presets.orders]\nmax_requests = 0\nwindow_secs = 1\n");

    ballast()
        .args(["validate", "--config"])
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_requests"));
}

#[test]
fn validate_returns_nonzero_on_missing_file() {
    ballast()
        .args(["validate", "--config", "/nonexistent/ballast.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read config file"));
}

#[test]
fn redis_url_can_come_from_environment() {
    let file = write_temp_config("[store]\nbackend = \"redis\"\n");

    ballast()
        .args(["validate", "--config"])
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing required field: url"));

    ballast()
        .env("BALLAST_REDIS_URL", "redis://cache.internal:6379/")
        .args(["validate", "--config"])
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Store URL: redis://cache.internal:6379/"));
}

#[test]
fn probe_memory_store() {
    let file = write_temp_config("[logging]\nlevel = \"warn\"\n");

    ballast()
        .args(["probe", "--config"])
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Backing store is reachable."));
}
