//! CLI integration tests using assert_cmd.

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn tierwise() -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("tierwise").unwrap();
    cmd.env_remove("TIERWISE_PARALLELISM")
        .env_remove("TIERWISE_OUTPUT_DIR");
    cmd
}

fn sample_dataset() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../datasets/algebra-week.toml")
}

#[test]
fn validate_sample_dataset() {
    tierwise()
        .arg("validate")
        .arg("--dataset")
        .arg(sample_dataset())
        .assert()
        .success()
        .stdout(predicate::str::contains("Algebra week"))
        .stdout(predicate::str::contains("7 tasks"))
        .stdout(predicate::str::contains("All datasets valid"));
}

#[test]
fn validate_directory() {
    tierwise()
        .arg("validate")
        .arg("--dataset")
        .arg(sample_dataset().parent().unwrap())
        .assert()
        .success()
        .stdout(predicate::str::contains("Algebra week"));
}

#[test]
fn validate_reports_warnings() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(
        &path,
        r#"
[dataset]
id = "broken"
name = "Broken"

[[tasks]]
id = 1
topic_id = 1
level = "low"

[[tasks]]
id = 1
topic_id = 1
level = "medium"

[[attempts]]
user_id = 1
task_id = 99
is_correct = true
created_at = "2025-01-06T09:00:00"
"#,
    )
    .unwrap();

    tierwise()
        .arg("validate")
        .arg("--dataset")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("duplicate task ID"))
        .stdout(predicate::str::contains("unknown task"))
        .stdout(predicate::str::contains("warning(s) found"));
}

#[test]
fn validate_nonexistent_file() {
    tierwise()
        .arg("validate")
        .arg("--dataset")
        .arg("nonexistent.toml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn show_config_prints_normalized_weights() {
    tierwise()
        .arg("show-config")
        .arg("--dataset")
        .arg(sample_dataset())
        .assert()
        .success()
        .stdout(predicate::str::contains("accuracy 0.300"))
        .stdout(predicate::str::contains("Level configurations"))
        .stdout(predicate::str::contains("0.60"))
        .stdout(predicate::str::contains("0.30"));
}

#[test]
fn show_config_flags_out_of_range_values() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("odd.toml");
    std::fs::write(
        &path,
        r#"
[dataset]
id = "odd"
name = "Odd"

[system]
weight_accuracy = 1.5
min_threshold_low = 0.9
max_threshold_low = 0.2
"#,
    )
    .unwrap();

    tierwise()
        .arg("show-config")
        .arg("--dataset")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("adjusted values"))
        .stdout(predicate::str::contains("accuracy 1.000"))
        .stdout(predicate::str::contains("low band    0.200 .. 0.900"));
}

#[test]
fn init_creates_files() {
    let dir = TempDir::new().unwrap();

    tierwise()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created tierwise.toml"))
        .stdout(predicate::str::contains("Created datasets/example.toml"));

    assert!(dir.path().join("tierwise.toml").exists());
    assert!(dir.path().join("datasets/example.toml").exists());
}

#[test]
fn init_skips_existing_files() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("tierwise.toml"), "parallelism = 1\n").unwrap();

    tierwise()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("tierwise.toml already exists"))
        .stdout(predicate::str::contains("Created datasets/example.toml"));

    let kept = std::fs::read_to_string(dir.path().join("tierwise.toml")).unwrap();
    assert_eq!(kept, "parallelism = 1\n");
}

#[test]
fn run_without_dataset_fails() {
    let dir = TempDir::new().unwrap();

    tierwise()
        .current_dir(dir.path())
        .env("HOME", dir.path())
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no dataset given"));
}

#[test]
fn run_rejects_bad_week() {
    let dir = TempDir::new().unwrap();

    tierwise()
        .current_dir(dir.path())
        .env("HOME", dir.path())
        .arg("run")
        .arg("--dataset")
        .arg(sample_dataset())
        .arg("--week")
        .arg("2025-W60")
        .arg("--format")
        .arg("none")
        .assert()
        .failure()
        .stderr(predicate::str::contains("week 60 does not exist"));
}

#[test]
fn run_rejects_inverted_period() {
    let dir = TempDir::new().unwrap();

    tierwise()
        .current_dir(dir.path())
        .env("HOME", dir.path())
        .args(["run", "--format", "none", "--from", "2025-01-12", "--to", "2025-01-06"])
        .arg("--dataset")
        .arg(sample_dataset())
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid period"));
}

#[test]
fn compare_nonexistent_files() {
    tierwise()
        .arg("compare")
        .arg("--baseline")
        .arg("nonexistent1.json")
        .arg("--current")
        .arg("nonexistent2.json")
        .assert()
        .failure();
}

#[test]
fn help_lists_commands() {
    tierwise()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("compare"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("show-config"))
        .stdout(predicate::str::contains("init"));
}

#[test]
fn version_flag() {
    tierwise()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tierwise"));
}
