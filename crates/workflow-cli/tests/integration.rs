#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A sandbox with its own HOME and config dir so nothing touches the real ones.
struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("home")).unwrap();
        std::fs::create_dir_all(dir.path().join("config")).unwrap();
        std::fs::create_dir_all(dir.path().join("work")).unwrap();
        Sandbox { dir }
    }

    fn workflow(&self) -> Command {
        let mut cmd = Command::cargo_bin("workflow").unwrap();
        cmd.current_dir(self.dir.path().join("work"))
            .env("HOME", self.dir.path().join("home"))
            .env("WORKFLOW_CONFIG_DIR", self.dir.path().join("config"))
            .env_remove("WORKFLOW_REPO")
            .env_remove("RUST_LOG");
        cmd
    }

    fn write_session(&self, yaml: &str) {
        std::fs::write(self.dir.path().join("config/session.yaml"), yaml).unwrap();
    }

    fn write_config(&self, yaml: &str) {
        std::fs::write(self.dir.path().join("config/config.yaml"), yaml).unwrap();
    }
}

const SEEDED_SESSION: &str = "\
version: 2
username: jane.doe
in_progress_tickets:
  SERVER-100:
    base_branch: master
    ticket_summary: Fix the flaky election test
    patch_ids:
    - 5f1a2b3c
    code_review:
      community: '4242'
  TOOLS-7:
    base_branch: v4.4
    ticket_summary: Bump driver
";

// ---------------------------------------------------------------------------
// help / aliases
// ---------------------------------------------------------------------------

#[test]
fn help_lists_lifecycle_commands() {
    let sb = Sandbox::new();
    sb.workflow()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("start"))
        .stdout(predicate::str::contains("commit"))
        .stdout(predicate::str::contains("patch"))
        .stdout(predicate::str::contains("review"))
        .stdout(predicate::str::contains("ship"))
        .stdout(predicate::str::contains("zzz"));
}

#[test]
fn code_needs_no_repository() {
    let sb = Sandbox::new();
    sb.workflow()
        .arg("code")
        .assert()
        .success()
        .stdout(predicate::str::contains("Dave"));
}

#[test]
fn unknown_command_is_rejected() {
    let sb = Sandbox::new();
    sb.workflow().arg("deploy").assert().failure();
}

// ---------------------------------------------------------------------------
// status
// ---------------------------------------------------------------------------

#[test]
fn status_without_session_is_empty() {
    let sb = Sandbox::new();
    sb.workflow()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No tickets in progress."));
}

#[test]
fn status_json_without_session_is_empty_array() {
    let sb = Sandbox::new();
    let out = sb.workflow().args(["status", "--json"]).output().unwrap();
    assert!(out.status.success());
    let value: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(value, serde_json::json!([]));
}

#[test]
fn status_lists_seeded_tickets() {
    let sb = Sandbox::new();
    sb.write_session(SEEDED_SESSION);

    sb.workflow()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("SERVER-100"))
        .stdout(predicate::str::contains("TOOLS-7"))
        .stdout(predicate::str::contains("v4.4"))
        .stdout(predicate::str::contains("community:4242"))
        .stdout(predicate::str::contains("Fix the flaky election test"));
}

#[test]
fn status_json_reports_patch_url() {
    let sb = Sandbox::new();
    sb.write_session(SEEDED_SESSION);

    let out = sb.workflow().args(["status", "-j"]).output().unwrap();
    assert!(out.status.success());
    let value: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let tickets = value.as_array().unwrap();
    assert_eq!(tickets.len(), 2);
    assert_eq!(tickets[0]["ticket"], "SERVER-100");
    assert_eq!(tickets[0]["branch"], "server-100");
    assert!(tickets[0]["latest_patch"]
        .as_str()
        .unwrap()
        .ends_with("/5f1a2b3c"));
    assert_eq!(tickets[1]["latest_patch"], serde_json::Value::Null);
}

#[test]
fn status_does_not_rewrite_session() {
    let sb = Sandbox::new();
    sb.write_session(SEEDED_SESSION);

    sb.workflow().arg("status").assert().success();

    let after = std::fs::read_to_string(sb.dir.path().join("config/session.yaml")).unwrap();
    assert_eq!(after, SEEDED_SESSION);
}

#[test]
fn corrupt_session_falls_back_to_empty() {
    let sb = Sandbox::new();
    sb.write_session("in_progress_tickets: [not, a, map");

    sb.workflow()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No tickets in progress."));
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

#[test]
fn config_shows_defaults_and_is_valid() {
    let sb = Sandbox::new();
    sb.workflow()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("keyring_service"))
        .stdout(predicate::str::contains("https://jira.mongodb.org"))
        .stdout(predicate::str::contains("Config is valid. No warnings."));
}

#[test]
fn config_reports_overrides_and_warnings() {
    let sb = Sandbox::new();
    sb.write_config("jira:\n  auth_retry_limit: 9\n");

    sb.workflow()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("auth_retry_limit: 9"))
        .stdout(predicate::str::contains("[warning]"));
}

#[test]
fn config_errors_fail_the_command() {
    let sb = Sandbox::new();
    sb.write_config("jira:\n  server: jira.example.com\n");

    sb.workflow()
        .arg("config")
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error]"))
        .stderr(predicate::str::contains("config validation found errors"));
}

#[test]
fn malformed_config_is_an_error() {
    let sb = Sandbox::new();
    sb.write_config("jira: [unterminated");

    sb.workflow()
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load config.yaml"));
}

// ---------------------------------------------------------------------------
// lifecycle guards
// ---------------------------------------------------------------------------

#[test]
fn start_outside_repo_root_fails() {
    let sb = Sandbox::new();
    sb.workflow()
        .args(["start", "1234"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("SConstruct"));
}

#[test]
fn start_alias_is_accepted() {
    let sb = Sandbox::new();
    sb.workflow()
        .args(["anew", "1234"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("SConstruct"));
}

#[test]
fn explicit_repo_flag_is_checked_too() {
    let sb = Sandbox::new();
    let elsewhere = sb.dir.path().join("home");
    sb.workflow()
        .arg("--repo")
        .arg(&elsewhere)
        .args(["start", "SERVER-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("SConstruct"));
}
