use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn dbrecon() -> Command {
    Command::cargo_bin("dbrecon").unwrap()
}

#[test]
fn test_check_fails_without_config_file() {
    dbrecon()
        .args(["check", "--config-file", "/nonexistent/dbrecon.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_validate_rejects_malformed_yaml() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "settings: [this is not a mapping").unwrap();

    dbrecon()
        .args(["validate", "--config-file", file.path().to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse"));
}

#[test]
fn test_validate_rejects_empty_schema_list() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "settings:\n  source_schemas: []").unwrap();

    dbrecon()
        .args(["validate", "--config-file", file.path().to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("source_schemas"));
}

#[test]
fn test_validate_prints_resolved_settings() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "settings:\n  source_schemas: [hr, fin]\ntarget:\n  host: db.example.com\n  port: 2883"
    )
    .unwrap();

    dbrecon()
        .args(["validate", "--config-file", file.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("HR, FIN"))
        .stdout(predicate::str::contains("db.example.com:2883"));
}

#[test]
fn test_check_fails_when_client_binary_is_missing() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "settings:\n  source_schemas: [HR]\nsource:\n  client_bin: /nonexistent/obclient"
    )
    .unwrap();

    dbrecon()
        .args(["check", "--config-file", file.path().to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to launch"));
}
