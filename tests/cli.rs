//! CLI integration tests for volley
//!
//! These tests verify the CLI interface works correctly.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

fn volley() -> Command {
    Command::cargo_bin("volley").unwrap()
}

mod help_and_version {
    use super::*;

    #[test]
    fn help_displays_usage() {
        volley()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("load testing"))
            .stdout(predicate::str::contains("run"))
            .stdout(predicate::str::contains("init"));
    }

    #[test]
    fn short_help_displays_about() {
        volley()
            .arg("-h")
            .assert()
            .success()
            .stdout(predicate::str::contains("A scenario-based HTTP load testing tool"));
    }

    #[test]
    fn version_displays_version() {
        volley()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn run_help_shows_options() {
        volley()
            .args(["run", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--concurrency"))
            .stdout(predicate::str::contains("--iterations"))
            .stdout(predicate::str::contains("--duration"))
            .stdout(predicate::str::contains("--proxy"))
            .stdout(predicate::str::contains("--debug"));
    }

    #[test]
    fn init_help_shows_options() {
        volley()
            .args(["init", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--output"))
            .stdout(predicate::str::contains("--force"));
    }
}

mod argument_errors {
    use super::*;

    #[test]
    fn run_without_scenario_fails() {
        volley()
            .arg("run")
            .assert()
            .failure()
            .stderr(predicate::str::contains("--config"));
    }

    #[test]
    fn missing_scenario_file_fails() {
        volley()
            .args(["run", "-f", "/nonexistent/scenario.toml"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to read config file"));
    }

    #[test]
    fn invalid_duration_fails() {
        volley()
            .args(["run", "-f", "scenario.toml", "-d", "forever"])
            .assert()
            .failure();
    }

    #[test]
    fn unknown_subcommand_fails() {
        volley().arg("compare").assert().failure();
    }
}

mod init {
    use super::*;

    #[test]
    fn writes_starter_scenario() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("volley.toml");

        volley()
            .args([
                "init",
                "https://api.example.com/users",
                "-o",
                output.to_str().unwrap(),
            ])
            .assert()
            .success()
            .stderr(predicate::str::contains("Created scenario file"));

        let content = fs::read_to_string(&output).unwrap();
        assert!(content.contains("[[steps]]"));
        assert!(content.contains(r#"url = "https://api.example.com/users""#));
    }

    #[test]
    fn refuses_to_overwrite_without_force() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("volley.toml");
        fs::write(&output, "keep me").unwrap();

        volley()
            .args(["init", "-o", output.to_str().unwrap()])
            .assert()
            .failure()
            .stderr(predicate::str::contains("already exists"));

        assert_eq!(fs::read_to_string(&output).unwrap(), "keep me");
    }

    #[test]
    fn force_overwrites() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("volley.toml");
        fs::write(&output, "old").unwrap();

        volley()
            .args(["init", "-o", output.to_str().unwrap(), "--force"])
            .assert()
            .success();

        assert!(fs::read_to_string(&output).unwrap().contains("[load]"));
    }

    #[test]
    fn generated_scenario_validates() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("volley.toml");

        volley()
            .args(["init", "-o", output.to_str().unwrap()])
            .assert()
            .success();

        volley()
            .args(["run", "-f", output.to_str().unwrap(), "--dry-run"])
            .env_remove("API_TOKEN")
            .assert()
            .success()
            .stderr(predicate::str::contains("Configuration validated"))
            .stderr(predicate::str::contains("1. health (GET https://api.example.com/health)"));
    }
}
