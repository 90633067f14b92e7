//! End-to-end tests for the `ms` binary

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn ms(root: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ms").unwrap();
    cmd.arg("--root").arg(root.path());
    cmd
}

#[test]
fn test_set_get_list_delete() {
    let temp = TempDir::new().unwrap();

    ms(&temp)
        .args(["set", "venv_path", "/repo/.venv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Stored 'venv_path' (11 chars)"));

    ms(&temp)
        .args(["get", "venv_path"])
        .assert()
        .success()
        .stdout("/repo/.venv\n");

    ms(&temp)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("venv_path | 11 chars"));

    ms(&temp)
        .args(["delete", "venv_path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted 'venv_path'"));

    ms(&temp)
        .args(["get", "venv_path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(not found)"));
}

#[test]
fn test_append_and_clear() {
    let temp = TempDir::new().unwrap();

    ms(&temp).args(["append", "notes", "one"]).assert().success();
    ms(&temp).args(["append", "notes", "two", "--separator", "; "]).assert().success();

    ms(&temp)
        .args(["get", "notes"])
        .assert()
        .success()
        .stdout("one; two\n");

    ms(&temp)
        .arg("clear")
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared 1 entries"));

    ms(&temp)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("(memory is empty)"));
}
