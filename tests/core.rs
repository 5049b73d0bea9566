//! Core infrastructure tests.

use std::io::Write;
use tempfile::NamedTempFile;
use tideway::core::config::{Config, ConfigOverrides};
use tideway::core::error::{RecordError, Tier};

// ============================================================================
// Config tests
// ============================================================================

#[test]
fn parse_minimal_config() {
    let config_content = r#"
[records]
storage_hot_path_prefixes = ["hot/"]
storage_exclusion_prefixes = ["tmp/"]

[telemetry]
log_level = "debug"
"#;

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(config_content.as_bytes()).unwrap();

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.records.storage_hot_path_prefixes, vec!["hot/"]);
    assert_eq!(config.records.storage_exclusion_prefixes, vec!["tmp/"]);
    assert_eq!(config.telemetry.log_level, "debug");
}

#[test]
fn empty_file_yields_defaults() {
    let config = Config::from_toml("").unwrap();
    assert!(config.records.storage_hot_path_prefixes.is_empty());
    assert!(config.records.storage_exclusion_prefixes.is_empty());
    assert_eq!(config.telemetry.log_level, "info");
}

#[test]
fn validate_rejects_unknown_log_level() {
    let result = Config::from_toml(
        r#"
[telemetry]
log_level = "loud"
"#,
    );
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("log_level"));
}

#[test]
fn validate_rejects_empty_prefix_entries() {
    let result = Config::from_toml(
        r#"
[records]
storage_hot_path_prefixes = [""]
"#,
    );
    assert!(result.is_err());

    let result = Config::from_toml(
        r#"
[records]
storage_exclusion_prefixes = ["ok/", ""]
"#,
    );
    assert!(result.is_err());
}

#[test]
fn overrides_replace_log_level() {
    let mut config = Config::default();
    config.apply_overrides(&ConfigOverrides {
        log_level: Some("trace".to_string()),
    });
    assert_eq!(config.telemetry.log_level, "trace");
}

#[test]
fn missing_config_file_is_an_error() {
    let result = Config::from_file(std::path::Path::new("/does/not/exist.toml"));
    assert!(result.is_err());
}

// ============================================================================
// Error tests
// ============================================================================

#[test]
fn errors_format_with_tier_and_record() {
    let err = RecordError::write(Tier::Storage, "a/1", "disk full");
    assert_eq!(
        err.to_string(),
        "storage write failed for record a/1: disk full"
    );
    assert_eq!(err.tier(), Some(Tier::Storage));
    assert_eq!(err.wire_form(), err.to_string());
}

#[test]
fn aborted_transition_error_names_the_record() {
    let err = RecordError::TransitionAborted {
        name: "r".to_string(),
        reason: "record deleted".to_string(),
    };
    assert!(err.to_string().contains("aborted"));
    assert!(err.to_string().contains("record deleted"));
    assert_eq!(err.tier(), None);
}
