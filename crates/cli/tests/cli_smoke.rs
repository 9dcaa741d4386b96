//! CLI smoke tests for open-sourcer.
//!
//! These tests run the binary against throwaway repositories and check exit
//! codes, output, and the resulting files.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use open_sourcer_lib::util::testutil::{self, FixtureRepo};
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a Command for the open-sourcer binary.
fn open_sourcer_cmd() -> Command {
  cargo_bin_cmd!("open-sourcer")
}

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_works() {
  open_sourcer_cmd()
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"))
    .stdout(predicate::str::contains("--rollback-on-failure"));
}

#[test]
fn version_flag_works() {
  open_sourcer_cmd()
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains("open-sourcer"));
}

// =============================================================================
// Runs
// =============================================================================

#[test]
fn runs_in_current_directory_without_arguments() {
  let fixture = FixtureRepo::internal_package();

  open_sourcer_cmd()
    .current_dir(fixture.path())
    .assert()
    .success()
    .stdout(predicate::str::contains("task_open-source_v1.2.3"))
    .stdout(predicate::str::contains("\"github\" remote"));

  assert!(fixture.path().join("package.json").exists());
  assert!(!fixture.path().join("package.json5").exists());
  assert!(!fixture.path().join(".npmrc").exists());
  assert_eq!(
    testutil::head_branch(fixture.path()).as_deref(),
    Some("task_open-source_v1.2.3")
  );
}

#[test]
fn dir_flag_selects_package() {
  let fixture = FixtureRepo::internal_package();
  fixture.add_remote("github", Some("https://example.com/org/repo.git"), None);

  open_sourcer_cmd()
    .arg("--dir")
    .arg(fixture.path())
    .assert()
    .success()
    .stdout(predicate::str::contains("https://example.com/org/repo.git"));
}

#[test]
fn json_output_reports_completion() {
  let fixture = FixtureRepo::internal_package();

  let output = open_sourcer_cmd()
    .arg("-C")
    .arg(fixture.path())
    .args(["--output", "json"])
    .output()
    .unwrap();

  assert!(output.status.success());
  let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(report["status"], "completed");
  assert_eq!(report["branch"], "task_open-source_v1.2.3");
  assert_eq!(report["version"], "1.2.3");
}

#[test]
fn staged_changes_abort_cleanly() {
  let fixture = FixtureRepo::internal_package();
  fixture.stage_file("pending.txt", "pending");

  open_sourcer_cmd()
    .current_dir(fixture.path())
    .assert()
    .success()
    .stderr(predicate::str::contains("staged changes"))
    .stderr(predicate::str::contains("pending.txt"));

  assert!(fixture.path().join("package.json5").exists());
  assert!(!fixture.path().join("package.json").exists());
}

// =============================================================================
// Error Handling
// =============================================================================

#[test]
fn outside_repository_fails() {
  let temp = TempDir::new().unwrap();
  std::fs::write(temp.path().join("package.json5"), testutil::INTERNAL_MANIFEST).unwrap();

  open_sourcer_cmd()
    .current_dir(temp.path())
    .assert()
    .failure()
    .stderr(predicate::str::contains("failed to open repository"));
}

#[test]
fn second_run_fails() {
  let fixture = FixtureRepo::internal_package();

  open_sourcer_cmd().current_dir(fixture.path()).assert().success();

  open_sourcer_cmd()
    .current_dir(fixture.path())
    .assert()
    .failure()
    .stderr(predicate::str::contains("package.json5"));
}

#[test]
fn nonexistent_dir_fails() {
  open_sourcer_cmd()
    .args(["--dir", "/nonexistent/path/package"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("Package directory not found"));
}
