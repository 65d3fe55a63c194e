//! Integration tests for the CLI interface
//!
//! Each test runs the binary against a file store in a temporary directory
//! with the offline oracle.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

const FOODS_CSV: &str = "\
Food,Measure,Grams,Calories,Protein,Fat,Carbs,Category
Banana,1 medium,150,135,1.5,0.3,34.5,Fruits A-F
Apple,1 medium,130,70,t,t,18,Fruits A-F
Zero Row,1 cup,0,10,1,1,1,Misc
";

fn write_config(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("config.toml");
    let data_dir = dir.join("data");
    std::fs::write(
        &path,
        format!(
            "[store]\nbackend = \"file\"\ndata_dir = \"{}\"\n\n[oracle]\nprovider = \"offline\"\n",
            data_dir.display()
        ),
    )
    .unwrap();
    path
}

fn fitpal(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("fitpal").unwrap();
    cmd.arg("--config")
        .arg(config)
        .env_remove("FITPAL_DATA_DIR")
        .env_remove("FITPAL_STORE_BACKEND")
        .env_remove("FITPAL_API_KEY")
        .env_remove("ANTHROPIC_API_KEY")
        .env("FITPAL_ORACLE", "offline");
    cmd
}

fn ingest_fixture(dir: &Path, config: &Path) {
    let csv = dir.join("foods.csv");
    std::fs::write(&csv, FOODS_CSV).unwrap();
    fitpal(config)
        .arg("ingest")
        .arg(&csv)
        .assert()
        .success()
        .stdout(predicate::str::contains("Inserted 2 reference foods (1 rows skipped)"));
}

#[test]
fn test_cli_help_flag() {
    let mut cmd = Command::cargo_bin("fitpal").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("Commands:"));
}

#[test]
fn test_log_help() {
    let mut cmd = Command::cargo_bin("fitpal").unwrap();
    cmd.arg("log")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("name:quantity"));
}

#[test]
fn test_invalid_command() {
    let mut cmd = Command::cargo_bin("fitpal").unwrap();
    cmd.arg("invalid-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn test_ingest_then_search() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(temp_dir.path());
    ingest_fixture(temp_dir.path(), &config);

    fitpal(&config)
        .arg("search")
        .arg("banana")
        .assert()
        .success()
        .stdout(predicate::str::contains("Banana"));

    fitpal(&config)
        .arg("search")
        .arg("durian")
        .assert()
        .success()
        .stdout(predicate::str::contains("No matches."));
}

#[test]
fn test_log_without_items_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(temp_dir.path());

    fitpal(&config)
        .arg("log")
        .assert()
        .failure()
        .code(8)
        .stderr(predicate::str::contains("nothing to log"));
}

#[test]
fn test_detached_turn_is_resumed_later() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(temp_dir.path());
    ingest_fixture(temp_dir.path(), &config);

    fitpal(&config)
        .args(["log", "--conversation", "chat-1", "-i", "banana:120", "--detach"])
        .arg("--consumed-at")
        .arg("2024-03-01")
        .assert()
        .success()
        .stdout(predicate::str::contains("banana"))
        .stdout(predicate::str::contains("resume --conversation chat-1"));

    fitpal(&config)
        .arg("pending")
        .assert()
        .success()
        .stdout(predicate::str::contains("chat-1"))
        .stdout(predicate::str::contains("awaiting confirmation"));

    fitpal(&config)
        .args(["pending", "--conversation", "chat-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("banana"))
        .stdout(predicate::str::contains("resume --conversation chat-1"));

    // A second turn for the same conversation waits for the first
    fitpal(&config)
        .args(["log", "--conversation", "chat-1", "-i", "apple:100", "--detach"])
        .assert()
        .failure()
        .code(3);

    fitpal(&config)
        .args(["resume", "--conversation", "chat-1", "--approve"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Logged banana (108kcal)"));

    fitpal(&config)
        .arg("pending")
        .assert()
        .success()
        .stdout(predicate::str::contains("No unfinished turns."));

    fitpal(&config)
        .args(["stats", "--date", "2024-03-01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2024-03-01: 1 entries"));
}

#[test]
fn test_resume_without_turn_fails() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(temp_dir.path());

    fitpal(&config)
        .args(["resume", "--conversation", "nobody", "--reject"])
        .assert()
        .failure()
        .code(3);
}

#[test]
fn test_auto_approve_logs_every_item() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(temp_dir.path());
    ingest_fixture(temp_dir.path(), &config);

    fitpal(&config)
        .args(["--json", "log", "-i", "banana:100", "-i", "apple:130", "--yes"])
        .args(["--meal", "Breakfast"])
        .arg("--consumed-at")
        .arg("2024-03-02")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"LOGGED\"").count(2))
        .stdout(predicate::str::contains("\"meal_type\": \"breakfast\""));

    fitpal(&config)
        .args(["stats", "--from", "2024-03-01", "--to", "2024-03-03"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2024-03-02: 2 entries"));
}

#[test]
fn test_non_finite_quantity_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(temp_dir.path());

    for spec in ["rice:nan", "rice:inf", "rice:0"] {
        fitpal(&config)
            .args(["log", "--conversation", "numbers", "-i", spec, "--detach"])
            .assert()
            .failure()
            .code(8)
            .stderr(predicate::str::contains("positive number"));
    }

    fitpal(&config)
        .arg("pending")
        .assert()
        .success()
        .stdout(predicate::str::contains("No unfinished turns."));
}

#[test]
fn test_unreadable_checkpoint_is_listed_and_discarded() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(temp_dir.path());
    let checkpoints = temp_dir.path().join("data/checkpoints");
    std::fs::create_dir_all(&checkpoints).unwrap();
    std::fs::write(checkpoints.join("chat-9.checkpoint.json"), "{ truncated").unwrap();

    fitpal(&config)
        .arg("pending")
        .assert()
        .success()
        .stdout(predicate::str::contains("chat-9  unreadable"));

    fitpal(&config)
        .args(["discard", "--conversation", "chat-9"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Discarded unreadable checkpoint for chat-9"));

    fitpal(&config)
        .arg("pending")
        .assert()
        .success()
        .stdout(predicate::str::contains("No unfinished turns."));
}
