// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegate contributors

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A stagegate command isolated from the caller's environment
fn stagegate(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("stagegate").unwrap();
    cmd.current_dir(dir.path())
        .env("HOME", dir.path())
        .env("XDG_CONFIG_HOME", dir.path().join(".config"))
        .env("NO_COLOR", "1")
        .env_remove("STAGEGATE_CONFIG")
        .env_remove("STAGEGATE_OWNER")
        .env_remove("STAGEGATE_REPO")
        .env_remove("STAGEGATE_BRANCH")
        .env_remove("STAGEGATE_SECRET")
        .env_remove("STAGEGATE_LOAD_BALANCER");
    cmd
}

fn initialized() -> TempDir {
    let dir = TempDir::new().unwrap();
    stagegate(&dir).args(["init", "demo"]).assert().success();
    dir
}

#[test]
fn init_writes_config_and_refuses_to_overwrite() {
    let dir = initialized();

    let config = std::fs::read_to_string(dir.path().join(".stagegate.yaml")).unwrap();
    assert!(config.contains("name: \"demo\""));

    stagegate(&dir)
        .args(["init", "demo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    stagegate(&dir)
        .args(["init", "other", "--force"])
        .assert()
        .success();
    let config = std::fs::read_to_string(dir.path().join(".stagegate.yaml")).unwrap();
    assert!(config.contains("name: \"other\""));
}

#[test]
fn synth_prints_declaration_to_stdout() {
    let dir = initialized();

    stagegate(&dir)
        .arg("synth")
        .assert()
        .success()
        .stdout(predicate::str::contains("GitHub_Source"))
        .stdout(predicate::str::contains("ProductionEcs"))
        .stdout(predicate::str::contains("manual_approval"));
}

#[test]
fn synth_works_from_flags_without_config() {
    let dir = TempDir::new().unwrap();

    stagegate(&dir)
        .args([
            "synth", "--owner", "acme", "--repo", "app", "--secret", "github-token", "-f", "json",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"stages\""))
        .stdout(predicate::str::contains("github-token"));
}

#[test]
fn synth_without_config_or_flags_fails() {
    let dir = TempDir::new().unwrap();

    stagegate(&dir).arg("synth").assert().failure();
}

#[test]
fn emitted_declaration_validates_and_checks_clean() {
    let dir = initialized();

    stagegate(&dir)
        .args(["synth", "-o", "deploy/release.yaml"])
        .assert()
        .success();
    assert!(dir.path().join("deploy/release.yaml").is_file());

    stagegate(&dir)
        .args(["validate", "deploy/release.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Declaration is valid"));

    stagegate(&dir)
        .args(["synth", "-o", "deploy/release.yaml", "--check"])
        .assert()
        .success()
        .stderr(predicate::str::contains("up to date"));

    stagegate(&dir)
        .args(["synth", "-o", "deploy/release.yaml", "--check", "--branch", "develop"])
        .assert()
        .failure();
}

#[test]
fn validate_reports_contract_violations() {
    let dir = initialized();

    stagegate(&dir)
        .args(["synth", "-o", "release.yaml"])
        .assert()
        .success();

    let path = dir.path().join("release.yaml");
    let edited = std::fs::read_to_string(&path)
        .unwrap()
        .replace("name: Approval", "name: Review");
    std::fs::write(&path, edited).unwrap();

    stagegate(&dir)
        .arg("validate")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Release contract"));

    stagegate(&dir)
        .args(["validate", "--structural-only"])
        .assert()
        .success();
}

#[test]
fn graph_renders_mermaid() {
    let dir = initialized();

    stagegate(&dir)
        .args(["graph", "-f", "mermaid"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("graph LR"))
        .stdout(predicate::str::contains("source_output"));
}

#[test]
fn walk_rejected_approval_skips_production() {
    let dir = initialized();

    stagegate(&dir)
        .args(["walk", "--reject"])
        .assert()
        .success()
        .stdout(predicate::str::contains("was rejected"))
        .stdout(predicate::str::contains("ProductionInfra (skipped)"));
}

#[test]
fn walk_unknown_failed_action_fails() {
    let dir = initialized();

    stagegate(&dir)
        .args(["walk", "--fail", "NoSuchAction"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("NoSuchAction"));
}

#[test]
fn verbose_graph_lists_dependencies() {
    let dir = initialized();

    stagegate(&dir)
        .args(["--verbose", "graph"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Topological order"))
        .stdout(predicate::str::contains("ProductionInfra <- Approve, GitHub_Source"));
}
