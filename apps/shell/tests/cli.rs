use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

fn herald() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_herald"));
    command.env_remove("RUST_LOG");
    command
}

#[test]
fn help_lists_overrides() {
    herald()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--delivery").and(predicate::str::contains("--orders")));
}

#[test]
fn runs_demo_from_config_file() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("herald.toml");
    fs::write(&path, "[bus]\ndelivery = \"async\"\nworkers = 2\n\n[demo]\norders = 3\n")?;

    herald()
        .arg("--config")
        .arg(&path)
        .current_dir(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Demo finished"));
    Ok(())
}

#[test]
fn zero_workers_is_rejected() {
    let dir = tempdir().unwrap();
    herald()
        .args(["--delivery", "async", "--workers", "0"])
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid capacity"));
}

#[test]
fn missing_config_file_fails() {
    herald()
        .args(["--config", "/definitely/not/here.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration is malformed"));
}
