//! Integration tests for render configuration loading
//!
//! These tests cover:
//! - Loading configuration from TOML and YAML files
//! - Environment variable overrides (`FLEETRECAP_*`, `NO_COLOR`)
//! - Precedence: defaults < file < environment < CLI
//! - Validation errors
//! - Color control

use colored::control::{set_override, unset_override};
use fleetrecap::callback::{OutcomeKind, Renderer};
use fleetrecap::config::{ConfigLoader, RenderConfig, RenderOverrides, RendererKind};
use serial_test::serial;
use std::path::PathBuf;
use tempfile::tempdir;

fn loader() -> ConfigLoader {
    ConfigLoader::new().without_standard_locations()
}

// ============================================================================
// File Tests
// ============================================================================

#[test]
fn test_full_toml_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fleetrecap.toml");
    std::fs::write(
        &path,
        r#"
[render]
use_color = false
renderer = "tally"
always_show_diff = true
show_host_start = true
diff_formatter = "diff-highlight"
volatile_fields = ["delta", "pid"]
anonymize_hosts = false
width = 100
interpreter = "/usr/bin/python3"
"#,
    )
    .unwrap();

    let config = loader().without_env().with_file(&path).load().unwrap();
    assert!(!config.use_color);
    assert_eq!(config.renderer, RendererKind::Tally);
    assert!(config.always_show_diff);
    assert!(config.show_host_start);
    assert_eq!(config.diff_formatter.as_deref(), Some("diff-highlight"));
    assert_eq!(config.volatile_fields, vec!["delta", "pid"]);
    assert!(!config.anonymize_hosts);
    assert_eq!(config.width, Some(100));
    assert_eq!(config.interpreter, Some(PathBuf::from("/usr/bin/python3")));
}

#[test]
fn test_file_without_render_table_keeps_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty.toml");
    std::fs::write(&path, "# nothing here\n").unwrap();

    let config = loader().without_env().with_file(&path).load().unwrap();
    assert_eq!(config, RenderConfig::default());
}

#[test]
fn test_invalid_file_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[render]\nrenderer = \"fancy\"\n").unwrap();

    let err = loader().without_env().with_file(&path).load().unwrap_err();
    assert!(format!("{:#}", err).contains("broken.toml"));
}

#[test]
fn test_later_files_win() {
    let dir = tempdir().unwrap();
    let first = dir.path().join("first.toml");
    let second = dir.path().join("second.yml");
    std::fs::write(&first, "[render]\nrenderer = \"tally\"\nwidth = 40\n").unwrap();
    std::fs::write(&second, "render:\n  width: 50\n").unwrap();

    let config = loader()
        .without_env()
        .with_file(&first)
        .with_file(&second)
        .load()
        .unwrap();
    assert_eq!(config.renderer, RendererKind::Tally);
    assert_eq!(config.width, Some(50));
}

// ============================================================================
// Environment Tests
// ============================================================================

#[test]
#[serial]
fn test_env_override_renderer() {
    std::env::set_var("FLEETRECAP_RENDERER", "tally");
    let config = loader().load().unwrap();
    assert_eq!(config.renderer, RendererKind::Tally);
    std::env::remove_var("FLEETRECAP_RENDERER");
}

#[test]
#[serial]
fn test_env_override_volatile_fields() {
    std::env::set_var("FLEETRECAP_VOLATILE_FIELDS", "delta,start,end,pid");
    let config = loader().load().unwrap();
    assert_eq!(config.volatile_fields, vec!["delta", "start", "end", "pid"]);
    std::env::remove_var("FLEETRECAP_VOLATILE_FIELDS");
}

#[test]
#[serial]
fn test_env_beats_file_and_cli_beats_env() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[render]\nwidth = 40\nshow_host_start = false\n").unwrap();

    std::env::set_var("FLEETRECAP_WIDTH", "60");
    std::env::set_var("FLEETRECAP_SHOW_HOST_START", "yes");
    let config = loader()
        .with_file(&path)
        .with_overrides(RenderOverrides {
            width: Some(80),
            ..Default::default()
        })
        .load()
        .unwrap();
    std::env::remove_var("FLEETRECAP_WIDTH");
    std::env::remove_var("FLEETRECAP_SHOW_HOST_START");

    assert_eq!(config.width, Some(80));
    assert!(config.show_host_start);
}

#[test]
#[serial]
fn test_env_custom_prefix() {
    std::env::set_var("RECAPTEST_ALWAYS_DIFF", "1");
    let config = loader().with_env_prefix("RECAPTEST").load().unwrap();
    assert!(config.always_show_diff);
    std::env::remove_var("RECAPTEST_ALWAYS_DIFF");
}

#[test]
#[serial]
fn test_no_color_env() {
    std::env::set_var("NO_COLOR", "1");
    let config = loader().load().unwrap();
    assert!(!config.use_color);
    std::env::remove_var("NO_COLOR");
}

#[test]
#[serial]
fn test_invalid_env_value_rejected() {
    std::env::set_var("FLEETRECAP_WIDTH", "wide");
    let result = loader().load();
    std::env::remove_var("FLEETRECAP_WIDTH");
    assert!(result.is_err());
}

// ============================================================================
// Color Tests
// ============================================================================

#[test]
#[serial]
fn test_status_line_colored_when_enabled() {
    set_override(true);
    let line = Renderer::new(true).folded_line(OutcomeKind::Failed, "web[1-3]");
    assert!(line.contains("\x1b["), "expected ANSI codes in {:?}", line);
    unset_override();
}

#[test]
fn test_status_line_plain_when_disabled() {
    let line = Renderer::new(false).folded_line(OutcomeKind::Failed, "web[1-3]");
    assert_eq!(line, "failed: web[1-3]");
}
