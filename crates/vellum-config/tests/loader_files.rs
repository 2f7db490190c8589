//! Loader tests against real files.

use std::io::Write;
use tempfile::NamedTempFile;
use vellum_config::{ConfigError, ConfigLoader, LogFormat};
use vellum_core::DocIdType;

fn temp_file(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn loads_toml_file() {
    let file = temp_file(
        ".toml",
        r#"
        [logging]
        format = "pretty"

        [resources.tags]
        id_type = "string"
        etag_check = true
        "#,
    );

    let config = ConfigLoader::new().with_file(file.path()).unwrap().load().unwrap();
    assert_eq!(config.logging.format, LogFormat::Pretty);
    let tags = config.resource("tags").unwrap();
    assert_eq!(tags.id_type, DocIdType::String);
    assert!(tags.etag_check_required);
}

#[test]
fn loads_json_file_then_overrides() {
    let file = temp_file(".json", r#"{"plugins": {"audit": {"priority": 5}}}"#);

    let config = ConfigLoader::new()
        .with_file(file.path())
        .unwrap()
        .with_overrides("/plugins/audit/enabled->false")
        .unwrap()
        .load()
        .unwrap();

    let audit = &config.plugins["audit"];
    assert_eq!(audit.priority, Some(5));
    assert!(!audit.enabled);
}

#[test]
fn missing_file_is_an_error() {
    let result = ConfigLoader::new().with_file("/nonexistent/vellum.toml");
    assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
}

#[test]
fn missing_optional_file_is_skipped() {
    let config = ConfigLoader::new()
        .with_optional_file("/nonexistent/vellum.toml")
        .unwrap()
        .load()
        .unwrap();
    assert_eq!(config.logging.level, "info");
}

#[test]
fn unsupported_extension_is_an_error() {
    let file = temp_file(".yaml", "logging: {}");
    assert!(ConfigLoader::new().with_file(file.path()).is_err());
}

#[test]
fn invalid_predicate_fails_validation() {
    let file = temp_file(
        ".toml",
        r#"
        [plugins.audit]
        predicate = "field-eq(field=a)"
        "#,
    );

    let result = ConfigLoader::new().with_file(file.path()).unwrap().load();
    assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
}
