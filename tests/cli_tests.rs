//! CLI-level integration tests driving the built binary end to end.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn signalkeeper() -> Command {
    Command::cargo_bin("signalkeeper").unwrap()
}

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("create temp config");
    file.write_all(contents.as_bytes()).expect("write temp config");
    file
}

const VALID_CONFIG: &str = r#"
[store]
database_url = "signalkeeper-test.db"

[logging]
level = "info"
format = "pretty"
"#;

#[test]
fn test_help() {
    signalkeeper()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("signalkeeper"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("check-config"));
}

#[test]
fn test_version() {
    signalkeeper().arg("--version").assert().success().stdout(predicate::str::contains("signalkeeper"));
}

#[test]
fn check_config_accepts_valid_file() {
    let config = write_config(VALID_CONFIG);

    signalkeeper()
        .args(["--config"])
        .arg(config.path())
        .arg("check-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("configuration is valid"))
        .stdout(predicate::str::contains("store.database_url"));
}

#[test]
fn check_config_rejects_missing_file() {
    signalkeeper()
        .args(["--config", "/nonexistent/signalkeeper-config.toml", "check-config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read config file"));
}

#[test]
fn check_config_rejects_notifier_enabled_without_token() {
    let config = write_config(
        r#"
[logging]
level = "info"
format = "pretty"

[notifier]
enabled = true
"#,
    );

    signalkeeper()
        .args(["--config"])
        .arg(config.path())
        .arg("check-config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("TELOXIDE_TOKEN"));
}

#[test]
fn check_config_rejects_negative_debounce() {
    let config = write_config(
        r#"
[logging]
level = "info"
format = "pretty"

[evaluator]
debounce_seconds = -1.0
"#,
    );

    signalkeeper()
        .args(["--config"])
        .arg(config.path())
        .arg("check-config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("debounce_seconds"));
}
