//! Integration tests for the composite-action-lint CLI
//!
//! These run the actual binary and verify exit codes and output streams:
//! diagnostics go to stdout, fatal errors to stderr.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn lint_cmd() -> Command {
    Command::cargo_bin("composite-action-lint").unwrap()
}

const VALID_ACTION: &str = r#"name: Greet
description: Greets the given person
inputs:
  who:
    description: Name of the person to greet
    default: World
runs:
  using: composite
  steps:
    - run: echo "Hello, ${{ inputs.who }}!"
      shell: bash
"#;

#[test]
fn test_no_args_is_usage_error() {
    lint_cmd().assert().code(2);
}

#[test]
fn test_help_flag() {
    lint_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Linter for composite GitHub Actions metadata files",
        ));
}

#[test]
fn test_version_flag() {
    lint_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("composite-action-lint"));
}

#[test]
fn test_valid_action_exits_zero() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("action.yml");
    fs::write(&file, VALID_ACTION).unwrap();

    lint_cmd()
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_diagnostics_exit_one_and_go_to_stdout() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("action.yml");
    fs::write(
        &file,
        "name: Broken\ndescription: missing runs section\n",
    )
    .unwrap();

    lint_cmd()
        .arg(&file)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("\"runs\" section is missing"))
        .stdout(predicate::str::contains("[syntax-check]"));
}

#[test]
fn test_expression_diagnostic_reports_position() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("action.yml");
    fs::write(
        &file,
        "name: Test\ndescription: test\nruns:\n  using: composite\n  steps:\n    - run: echo hi\n      shell: bash\n      if: ${{ github.sha }}\n",
    )
    .unwrap();

    lint_cmd()
        .arg(&file)
        .assert()
        .code(1)
        .stdout(predicate::str::contains(":8:"))
        .stdout(predicate::str::contains(
            "\"if\" condition should be type \"bool\"",
        ))
        .stdout(predicate::str::contains("[expression]"));
}

#[test]
fn test_diagnostic_includes_source_excerpt() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("action.yml");
    fs::write(
        &file,
        "name: Test\ndescription: test\nruns:\n  using: composite\n  steps:\n    - run: echo ${{ inputs.nope }}\n      shell: bash\n",
    )
    .unwrap();

    lint_cmd()
        .arg(&file)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("echo ${{ inputs.nope }}"))
        .stdout(predicate::str::contains("^"));
}

#[test]
fn test_multiple_files_are_all_linted() {
    let dir = TempDir::new().unwrap();
    let good = dir.path().join("good.yml");
    let bad = dir.path().join("bad.yml");
    fs::write(&good, VALID_ACTION).unwrap();
    fs::write(&bad, "name: Bad\n").unwrap();

    lint_cmd()
        .args([&good, &bad])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("bad.yml"));
}

#[test]
fn test_missing_file_is_fatal() {
    lint_cmd()
        .arg("does-not-exist.yml")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("could not read"));
}

#[test]
fn test_missing_file_aborts_remaining_files() {
    let dir = TempDir::new().unwrap();
    let bad = dir.path().join("bad.yml");
    fs::write(&bad, "name: Bad\n").unwrap();

    // the unreadable first file aborts before the second is linted
    lint_cmd()
        .args([dir.path().join("missing.yml"), bad])
        .assert()
        .code(3)
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_broken_yaml_is_a_diagnostic_not_fatal() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("action.yml");
    fs::write(&file, "name: Test\n  bad indent: [\n").unwrap();

    lint_cmd()
        .arg(&file)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("could not parse as YAML"));
}

#[test]
fn test_empty_file_is_a_diagnostic() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("action.yml");
    fs::write(&file, "").unwrap();

    lint_cmd()
        .arg(&file)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("action metadata file is empty"));
}
