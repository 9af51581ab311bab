//! Configuration loading: defaults, overrides, validation and discovery.

use refactor_audit::config::{
    discover, load_from_path, load_from_str, ConfigError, TrackerConfig, ValidationIssue,
    DEFAULT_CACHE_BYTES, LOCAL_CONFIG_FILE,
};
use refactor_audit::refactoring::InlineFidelity;
use refactor_audit::{MatchMode, RefactoringKind};
use std::fs;
use tempfile::TempDir;

#[test]
fn empty_document_gives_defaults() {
    let config = load_from_str("").unwrap();
    assert_eq!(config, TrackerConfig::default());
    assert_eq!(config.search.look_back_limit, 30);
    assert_eq!(config.search.search_depth, 1);
    assert_eq!(config.matching.threshold, 0.2);
    assert_eq!(config.cache.max_bytes, DEFAULT_CACHE_BYTES);
    assert_eq!(config.detectors.enabled, RefactoringKind::ALL.to_vec());
    assert_eq!(config.detectors.min_inlined_statements, 1);
}

#[test]
fn partial_tables_override_only_what_they_name() {
    let config = load_from_str(
        r#"
[search]
look_back_limit = 12

[matching]
mode = "near"
threshold = 0.35

[detectors]
enabled = ["extract-method", "rename"]
inline_fidelity = "fast"
"#,
    )
    .unwrap();

    assert_eq!(config.search.look_back_limit, 12);
    assert_eq!(config.search.search_depth, 1);
    assert_eq!(config.matching.mode, MatchMode::Near);
    assert_eq!(
        config.detectors.enabled,
        vec![RefactoringKind::ExtractMethod, RefactoringKind::Rename]
    );

    let detection = config.detection();
    assert_eq!(detection.matcher.threshold, 0.35);
    assert_eq!(detection.inline_fidelity, InlineFidelity::Fast);
}

#[test]
fn invalid_values_are_all_reported() {
    let err = load_from_str(
        r#"
[search]
look_back_limit = 0

[matching]
threshold = 1.5

[detectors]
enabled = ["rename", "rename"]
"#,
    )
    .unwrap_err();

    let ConfigError::Validation { source, .. } = err else {
        panic!("expected a validation error");
    };
    assert_eq!(source.issues.len(), 3);
    assert!(source
        .issues
        .contains(&ValidationIssue::DuplicateDetector(RefactoringKind::Rename)));
}

#[test]
fn unknown_keys_are_rejected() {
    let err = load_from_str("[search]\nlookback = 3\n").unwrap_err();
    assert!(matches!(err, ConfigError::Toml { .. }));
}

#[test]
fn errors_name_the_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[cache]\nmax_bytes = 0\n").unwrap();

    let err = load_from_path(&path).unwrap_err();
    assert!(err.to_string().contains("bad.toml"));
    assert!(err.to_string().contains("cache.max_bytes"));
}

#[test]
fn discovery_prefers_explicit_then_local() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join(LOCAL_CONFIG_FILE),
        "[search]\nsearch_depth = 2\n",
    )
    .unwrap();
    let explicit = dir.path().join("explicit.toml");
    fs::write(&explicit, "[search]\nsearch_depth = 3\n").unwrap();

    let (config, used) = discover(Some(&explicit), dir.path()).unwrap();
    assert_eq!(config.search.search_depth, 3);
    assert_eq!(used.as_deref(), Some(explicit.as_path()));

    let (config, used) = discover(None, dir.path()).unwrap();
    assert_eq!(config.search.search_depth, 2);
    assert_eq!(used, Some(dir.path().join(LOCAL_CONFIG_FILE)));
}

#[test]
fn missing_explicit_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let err = discover(Some(&dir.path().join("absent.toml")), dir.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}
