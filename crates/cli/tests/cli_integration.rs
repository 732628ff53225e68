//! CLI integration tests for the one-shot subcommands.
//!
//! Uses `assert_cmd` to spawn the `parley` binary and verify
//! exit codes, stdout content, and stderr content.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn parley() -> Command {
    cargo_bin_cmd!("parley")
}

/// Write `content` to `<tmp>/parley.toml` and return its path.
fn write_config(tmp: &TempDir, content: &str) -> PathBuf {
    let path = tmp.path().join("parley.toml");
    fs::write(&path, content).unwrap();
    path
}

const VALID_CONFIG: &str = r#"
session = "ci"

[lock]
lease_millis = 5000

[[parties]]
name = "acme-publisher"
role = "Publisher"
notification_url = "http://localhost:9001"

[[parties]]
name = "acme-subscriber"
role = "Subscriber"
"#;

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    parley()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Parley conformance sandbox"));
}

#[test]
fn version_exits_0() {
    parley()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("parley"));
}

#[test]
fn unknown_subcommand_fails() {
    parley().arg("frobnicate").assert().failure();
}

// ──────────────────────────────────────────────
// 2. scenarios
// ──────────────────────────────────────────────

#[test]
fn scenarios_lists_every_module_and_scenario() {
    parley()
        .arg("scenarios")
        .assert()
        .success()
        .stdout(predicate::str::contains("Sample Schedules v1.0.0"))
        .stdout(predicate::str::contains("Schedules"))
        .stdout(predicate::str::contains(
            "SupplyScenarioParameters(interval, date) - GetSchedules",
        ))
        .stdout(predicate::str::contains("SupplyScenarioParameters(date) - GetSchedules"))
        .stdout(predicate::str::contains("CreateSubscription - GetSubscription"))
        .stdout(predicate::str::contains("CreateSubscription - DeleteSubscription"));
}

#[test]
fn scenarios_json_output() {
    let output = parley()
        .args(["scenarios", "--output", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["standard"], "Sample Schedules");
    assert_eq!(json["version"], "1.0.0");
    assert_eq!(json["roles"], serde_json::json!(["Publisher", "Subscriber"]));
    let modules = json["modules"].as_array().unwrap();
    assert_eq!(modules.len(), 2);
    assert_eq!(modules[0]["name"], "Schedules");
    assert_eq!(modules[1]["scenarios"].as_array().unwrap().len(), 2);
}

// ──────────────────────────────────────────────
// 3. check-config
// ──────────────────────────────────────────────

#[test]
fn check_config_prints_effective_configuration() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(&tmp, VALID_CONFIG);
    parley()
        .arg("check-config")
        .arg(&path)
        .env_remove("PARLEY_LEASE_MILLIS")
        .env_remove("PARLEY_MAX_PARALLEL_SCENARIOS")
        .assert()
        .success()
        .stdout(predicate::str::contains("session = \"ci\""))
        .stdout(predicate::str::contains("lease_millis = 5000"))
        .stdout(predicate::str::contains("max_parallel_scenarios = 10"));
}

#[test]
fn check_config_applies_environment_overrides() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(&tmp, VALID_CONFIG);
    let output = parley()
        .args(["check-config", "--output", "json"])
        .arg(&path)
        .env("PARLEY_MAX_PARALLEL_SCENARIOS", "3")
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["orchestrator"]["max_parallel_scenarios"], 3);
    assert_eq!(json["parties"][0]["name"], "acme-publisher");
}

#[test]
fn check_config_rejects_missing_role() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(
        &tmp,
        r#"
[[parties]]
name = "acme-publisher"
role = "Publisher"
"#,
    );
    parley()
        .arg("check-config")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Subscriber"));
}

#[test]
fn check_config_reports_every_problem() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(
        &tmp,
        r#"
session = ""

[[parties]]
name = "acme"
role = "Publisher"

[[parties]]
name = "acme"
role = "Publisher"
"#,
    );
    parley()
        .arg("check-config")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("session must not be empty"))
        .stderr(predicate::str::contains("party 'acme' is configured twice"))
        .stderr(predicate::str::contains(
            "role 'Publisher' is played by more than one party",
        ));
}

#[test]
fn check_config_missing_file_fails() {
    parley()
        .args(["check-config", "does-not-exist.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not read"));
}

#[test]
fn check_config_json_errors() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(&tmp, "session = [");
    let output = parley()
        .args(["check-config", "--output", "json"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(!output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stderr)
        .unwrap_or_else(|_| panic!("stderr is not JSON: {}", String::from_utf8_lossy(&output.stderr)));
    assert!(json["error"].as_str().unwrap().contains("could not parse"));
}
