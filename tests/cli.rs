use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

const PASSWORD: &str = "test-master-pw";

fn keyfort(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("keyfort").unwrap();
    cmd.env("KEYFORT_DIR", dir);
    cmd.env("KEYFORT_PASSWORD", PASSWORD);
    cmd.env_remove("KEYFORT_NEW_PASSWORD");
    cmd.env_remove("KEYFORT_FILE_PASSWORD");
    cmd
}

fn init(dir: &Path) {
    keyfort(dir)
        .args([
            "init",
            "--argon-mem",
            "1024",
            "--argon-time",
            "1",
            "--argon-parallelism",
            "1",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("vault initialized"));
}

#[test]
fn init_add_list_show_remove() {
    let dir = tempdir().unwrap();
    init(dir.path());

    keyfort(dir.path())
        .args([
            "add",
            "GitHub",
            "--category",
            "Dev",
            "--username",
            "octocat",
            "--secret",
            "hunter2",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("saved entry 'GitHub'"));

    keyfort(dir.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("GitHub").and(predicate::str::contains("Dev")));

    keyfort(dir.path())
        .args(["show", "1"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("username: octocat")
                .and(predicate::str::contains("password: hunter2")),
        );

    keyfort(dir.path())
        .args(["remove", "1"])
        .assert()
        .success();

    keyfort(dir.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("GitHub").not());
}

#[test]
fn init_twice_fails() {
    let dir = tempdir().unwrap();
    init(dir.path());

    keyfort(dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("vault already exists"));
}

#[test]
fn wrong_password_is_rejected() {
    let dir = tempdir().unwrap();
    init(dir.path());

    keyfort(dir.path())
        .env("KEYFORT_PASSWORD", "not-the-password")
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("incorrect master password"));
}

#[test]
fn commands_require_an_initialized_vault() {
    let dir = tempdir().unwrap();

    keyfort(dir.path())
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}

#[test]
fn change_password_reencrypts() {
    let dir = tempdir().unwrap();
    init(dir.path());

    keyfort(dir.path())
        .args(["add", "Bank", "--secret", "s3cret"])
        .assert()
        .success();

    keyfort(dir.path())
        .env("KEYFORT_NEW_PASSWORD", "brand-new-pw")
        .arg("change-password")
        .assert()
        .success()
        .stdout(predicate::str::contains("master password changed"));

    // old password no longer works
    keyfort(dir.path())
        .arg("list")
        .assert()
        .failure();

    keyfort(dir.path())
        .env("KEYFORT_PASSWORD", "brand-new-pw")
        .args(["show", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("password: s3cret"));
}

#[test]
fn encrypted_export_roundtrip() {
    let dir = tempdir().unwrap();
    init(dir.path());

    keyfort(dir.path())
        .args(["add", "GitHub", "--username", "octocat", "--secret", "hunter2"])
        .assert()
        .success();

    let export_path = dir.path().join("backup.kfx");
    keyfort(dir.path())
        .env("KEYFORT_FILE_PASSWORD", "transfer-pw")
        .args(["export", export_path.to_str().unwrap()])
        .assert()
        .success();

    // import into a brand new vault
    let dir2 = tempdir().unwrap();
    init(dir2.path());

    keyfort(dir2.path())
        .env("KEYFORT_FILE_PASSWORD", "transfer-pw")
        .args(["import", export_path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 added, 0 updated, 0 skipped"));

    keyfort(dir2.path())
        .args(["show", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("password: hunter2"));

    // wrong file password is a distinct auth failure
    keyfort(dir2.path())
        .env("KEYFORT_FILE_PASSWORD", "wrong-pw")
        .args(["import", export_path.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("authentication failed"));
}

#[test]
fn csv_import_reports_merge_stats() {
    let dir = tempdir().unwrap();
    init(dir.path());

    keyfort(dir.path())
        .args(["add", "GitHub", "--username", "octocat", "--secret", "old"])
        .assert()
        .success();

    let csv_path = dir.path().join("incoming.csv");
    std::fs::write(
        &csv_path,
        "name,username,password\n\
         GitHub,octocat,updated-pw\n\
         Fresh,me,new-pw\n",
    )
    .unwrap();

    keyfort(dir.path())
        .args(["import", csv_path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 added, 1 updated, 0 skipped"));
}

#[test]
fn unsupported_extension_is_rejected() {
    let dir = tempdir().unwrap();
    init(dir.path());

    let path = dir.path().join("data.docx");
    std::fs::write(&path, "x").unwrap();

    keyfort(dir.path())
        .args(["import", path.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported file format"));
}
