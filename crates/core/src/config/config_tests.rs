// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn empty_config_uses_defaults() {
    let config = Config::parse("").unwrap();
    assert!(config.persistence.enabled);
    assert_eq!(config.output.tail_lines, 10);
    assert_eq!(config.lock.timeout, Duration::from_secs(10));
    assert!(config.plugins.enabled.is_empty());
}

#[test]
fn sections_override_defaults() {
    let config = Config::parse(
        r#"
        [lock]
        timeout = "500ms"

        [persistence]
        enabled = false
        max_records = 50
        max_age = "7days"

        [output]
        tail_lines = 3

        [plugins]
        enabled = ["log"]
        "#,
    )
    .unwrap();
    assert_eq!(config.lock.timeout, Duration::from_millis(500));
    assert_eq!(config.lock.poll_interval, Duration::from_millis(50));
    assert!(!config.persistence.enabled);
    assert_eq!(config.persistence.max_records, 50);
    assert_eq!(config.persistence.max_age, Some(Duration::from_secs(7 * 24 * 3600)));
    assert_eq!(config.output.tail_lines, 3);
    assert_eq!(config.output.error_lines, 1000);
    assert_eq!(config.plugins.enabled, vec!["log".to_string()]);
}

#[test]
fn unknown_duration_is_an_error() {
    assert!(Config::parse("[lock]\ntimeout = \"soon\"").is_err());
}

#[test]
fn load_reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::load(&dir.path().join("missing.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn load_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("phasejob.toml");
    std::fs::write(&path, "[output]\nerror_lines = 5\n").unwrap();
    let config = Config::load(&path).unwrap();
    assert_eq!(config.output.error_lines, 5);
}
