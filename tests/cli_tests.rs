//! CLI tests for fleetrecap
//!
//! This test suite covers:
//! - Argument parsing and help output
//! - Replaying event logs from files and stdin
//! - Exit codes for success, failures, unreachable hosts and interrupts
//! - Malformed input handling
//! - Config file and environment variable handling

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

// Helper to get a command for testing
fn fleetrecap_cmd() -> Command {
    let mut cmd = Command::cargo_bin("fleetrecap").unwrap();
    cmd.env_remove("FLEETRECAP_RENDERER")
        .env_remove("FLEETRECAP_DIFF_FORMATTER")
        .env_remove("FLEETRECAP_CONFIG");
    cmd
}

// Helper to write an event log
fn event_log(lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file
}

const PLAY: &str = r#"{"event": "play_start", "name": "web", "hosts": ["web1", "web2", "web3"]}"#;
const TASK: &str = r#"{"event": "task_start", "name": "ping"}"#;
const END: &str = r#"{"event": "playbook_end"}"#;

fn ok(host: &str) -> String {
    format!(r#"{{"event": "host_result", "host": "{}", "result": {{"status": "ok", "msg": "pong"}}}}"#, host)
}

// ============================================================================
// Argument Parsing
// ============================================================================

#[test]
fn test_help() {
    fleetrecap_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("replay"));
}

#[test]
fn test_version() {
    fleetrecap_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_unknown_renderer_rejected() {
    fleetrecap_cmd()
        .args(["replay", "--renderer", "fancy"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("fancy"));
}

#[test]
fn test_missing_log_file() {
    fleetrecap_cmd()
        .args(["--no-color", "replay", "/nonexistent/events.jsonl"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to open event log"));
}

// ============================================================================
// Replay
// ============================================================================

#[test]
fn test_replay_success() {
    let (a, b, c) = (ok("web1"), ok("web2"), ok("web3"));
    let log = event_log(&[PLAY, TASK, &a, &c, &b, END]);

    fleetrecap_cmd()
        .args(["--no-color", "replay"])
        .arg(log.path())
        .assert()
        .code(0)
        .stdout(predicate::str::contains("TASK [ping]"))
        .stdout(predicate::str::contains("ok: web1 => msg: pong"))
        .stdout(predicate::str::contains("ok: web3 => same result as web1"))
        .stdout(predicate::str::contains("ok: web2 => same result as web1"))
        .stdout(predicate::str::contains("PLAY RECAP"))
        .stdout(predicate::str::contains("TOTALS: ok=3"));
}

#[test]
fn test_replay_from_stdin() {
    let input = [PLAY, TASK, &ok("web1"), &ok("web2"), &ok("web3"), END].join("\n");

    fleetrecap_cmd()
        .args(["--no-color", "replay", "-"])
        .write_stdin(input)
        .assert()
        .code(0)
        .stdout(predicate::str::contains("ok: web2 => same result as web1"));
}

#[test]
fn test_replay_tally_renderer() {
    let (a, b, c) = (ok("web1"), ok("web2"), ok("web3"));
    let log = event_log(&[PLAY, TASK, &a, &b, &c, END]);

    fleetrecap_cmd()
        .args(["--no-color", "replay", "--renderer", "tally", "--width", "60"])
        .arg(log.path())
        .assert()
        .code(0)
        .stdout(predicate::str::contains("ok: web[2-3] => same result as web1"))
        .stdout(predicate::str::contains("ok: web[1-3]"));
}

#[test]
fn test_replay_failed_exit_code() {
    let failed = r#"{"event": "host_result", "host": "web2", "result": {"status": "failed", "msg": "boom"}}"#;
    let log = event_log(&[PLAY, TASK, &ok("web1"), failed, &ok("web3"), END]);

    fleetrecap_cmd()
        .args(["--no-color", "replay"])
        .arg(log.path())
        .assert()
        .code(2)
        .stdout(predicate::str::contains("failed: web2 => msg: boom"));
}

#[test]
fn test_replay_unreachable_exit_code() {
    let unreachable = r#"{"event": "host_result", "host": "web3", "result": {"unreachable": true, "msg": "timeout"}}"#;
    let log = event_log(&[PLAY, TASK, &ok("web1"), &ok("web2"), unreachable, END]);

    fleetrecap_cmd()
        .args(["--no-color", "replay"])
        .arg(log.path())
        .assert()
        .code(4)
        .stdout(predicate::str::contains("unreachable: web3 => msg: timeout"));
}

#[test]
fn test_replay_interrupt_event() {
    let log = event_log(&[PLAY, TASK, &ok("web1"), r#"{"event": "interrupt"}"#]);

    fleetrecap_cmd()
        .args(["--no-color", "replay"])
        .arg(log.path())
        .assert()
        .code(99)
        .stdout(predicate::str::contains("interrupted: web[2-3]"))
        .stdout(predicate::str::contains("interrupted=1"));
}

#[test]
fn test_replay_malformed_line() {
    let log = event_log(&[PLAY, "{not json", TASK, &ok("web1"), &ok("web2"), &ok("web3"), END]);

    fleetrecap_cmd()
        .args(["--no-color", "replay"])
        .arg(log.path())
        .assert()
        .code(0)
        .stdout(predicate::str::contains("[WARNING]: skipping malformed event:"))
        .stdout(predicate::str::contains("ok: web1 => msg: pong"));
}

#[test]
fn test_replay_truncated_log_still_prints_recap() {
    let log = event_log(&[PLAY, TASK, &ok("web1")]);

    fleetrecap_cmd()
        .args(["--no-color", "replay"])
        .arg(log.path())
        .assert()
        .code(0)
        .stdout(predicate::str::contains("no result received from web[2-3] for task 'ping'"))
        .stdout(predicate::str::contains("PLAY RECAP"));
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_config_file_used() {
    let mut config = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(config, "[render]\nrenderer = \"tally\"\nwidth = 60").unwrap();
    let (a, b, c) = (ok("web1"), ok("web2"), ok("web3"));
    let log = event_log(&[PLAY, TASK, &a, &b, &c, END]);

    fleetrecap_cmd()
        .arg("--no-color")
        .arg("--config")
        .arg(config.path())
        .arg("replay")
        .arg(log.path())
        .assert()
        .code(0)
        .stdout(predicate::str::contains("ok: web[1-3]"));
}

#[test]
fn test_missing_config_file_exit_code() {
    fleetrecap_cmd()
        .args(["--config", "/nonexistent/fleetrecap.toml", "replay", "-"])
        .write_stdin("")
        .assert()
        .code(5)
        .stderr(predicate::str::contains("ERROR"));
}

#[test]
fn test_env_renderer() {
    let (a, b, c) = (ok("web1"), ok("web2"), ok("web3"));
    let log = event_log(&[PLAY, TASK, &a, &b, &c, END]);

    fleetrecap_cmd()
        .env("FLEETRECAP_RENDERER", "tally")
        .env("FLEETRECAP_WIDTH", "60")
        .args(["--no-color", "replay"])
        .arg(log.path())
        .assert()
        .code(0)
        .stdout(predicate::str::contains("ok: web[1-3]"));
}

#[test]
fn test_bad_formatter_command_exit_code() {
    fleetrecap_cmd()
        .args(["--no-color", "replay", "--diff-formatter", "delta 'unterminated", "-"])
        .write_stdin("")
        .assert()
        .code(5);
}
