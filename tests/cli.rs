use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_describes_both_positionals() {
    Command::cargo_bin("remfs")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("MOUNTPOINT"))
        .stdout(predicate::str::contains("DOCUMENTS"));
}

#[test]
fn missing_document_directory_is_an_error() {
    let mount = tempfile::tempdir().unwrap();
    Command::cargo_bin("remfs")
        .unwrap()
        .arg(mount.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("document directory"));
}

#[test]
fn empty_mountpoint_prompt_is_an_error() {
    Command::cargo_bin("remfs")
        .unwrap()
        .write_stdin("\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no mount point"));
}

#[test]
fn unreadable_document_directory_fails_before_mounting() {
    let mount = tempfile::tempdir().unwrap();
    Command::cargo_bin("remfs")
        .unwrap()
        .arg(mount.path())
        .arg("/no/such/document/dir")
        .assert()
        .failure();
}
