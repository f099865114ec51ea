//! Config environment variable tests
//!
//! These tests verify that Config::from_env() correctly reads and applies
//! environment variable overrides. Config::from_env() also loads a .env file
//! via dotenvy when present, so each test sets the variables it asserts on.
//!
//! Tests use #[serial] to prevent race conditions with shared env vars.

use doc_assistant::collaborators::{ComparisonMode, SummaryStyle};
use doc_assistant::config::{Config, LogFormat};
use serial_test::serial;
use std::env;
use std::path::PathBuf;

#[test]
#[serial]
fn test_config_from_env_loads_successfully() {
    assert!(Config::from_env().is_ok());
}

#[test]
#[serial]
fn test_config_from_env_endpoint() {
    env::set_var("LLM_ENDPOINT_URL", "https://llm.internal.example/v1/complete");
    let config = Config::from_env().unwrap();
    assert_eq!(
        config.llm.endpoint_url.as_deref(),
        Some("https://llm.internal.example/v1/complete")
    );

    env::set_var("LLM_ENDPOINT_URL", "   ");
    let config = Config::from_env().unwrap();
    assert!(config.llm.endpoint_url.is_none());

    env::remove_var("LLM_ENDPOINT_URL");
}

#[test]
#[serial]
fn test_config_from_env_storage() {
    env::set_var("DATA_DIR", "/srv/doc-assistant");
    env::set_var("PURGE_ON_SHUTDOWN", "true");

    let config = Config::from_env().unwrap();
    assert_eq!(config.storage.data_dir, PathBuf::from("/srv/doc-assistant"));
    assert!(config.storage.purge_on_shutdown);

    env::remove_var("DATA_DIR");
    env::remove_var("PURGE_ON_SHUTDOWN");
}

#[test]
#[serial]
fn test_config_from_env_json_log_format() {
    env::set_var("LOG_FORMAT", "json");

    let config = Config::from_env().unwrap();
    assert_eq!(config.logging.format, LogFormat::Json);

    env::remove_var("LOG_FORMAT");
}

#[test]
#[serial]
fn test_config_from_env_custom_request() {
    env::set_var("REQUEST_TIMEOUT_MS", "60000");
    env::set_var("MAX_RETRIES", "5");
    env::set_var("RETRY_DELAY_MS", "2000");

    let config = Config::from_env().unwrap();
    assert_eq!(config.request.timeout_ms, 60000);
    assert_eq!(config.request.max_retries, 5);
    assert_eq!(config.request.retry_delay_ms, 2000);

    env::remove_var("REQUEST_TIMEOUT_MS");
    env::remove_var("MAX_RETRIES");
    env::remove_var("RETRY_DELAY_MS");
}

#[test]
#[serial]
fn test_config_from_env_invalid_number_uses_default() {
    env::set_var("MAX_UPLOAD_BYTES", "lots");

    let config = Config::from_env().unwrap();
    assert_eq!(config.limits.max_upload_bytes, 50 * 1024 * 1024);

    env::remove_var("MAX_UPLOAD_BYTES");
}

#[test]
#[serial]
fn test_config_from_env_task_settings() {
    env::set_var("SUMMARY_STYLE", "bullet_points");
    env::set_var("COMPARISON_MODE", "differences");
    env::set_var("RETRIEVAL_K", "0");

    let config = Config::from_env().unwrap();
    assert_eq!(config.tasks.summary_style, SummaryStyle::BulletPoints);
    assert_eq!(config.tasks.comparison_mode, ComparisonMode::Differences);
    assert_eq!(config.tasks.retrieval_k, 1);

    env::remove_var("SUMMARY_STYLE");
    env::remove_var("COMPARISON_MODE");
    env::remove_var("RETRIEVAL_K");
}

#[test]
#[serial]
fn test_config_from_env_invalid_summary_style_is_error() {
    env::set_var("SUMMARY_STYLE", "haiku");

    let err = Config::from_env().unwrap_err();
    assert!(err.to_string().contains("SUMMARY_STYLE"));

    env::remove_var("SUMMARY_STYLE");
}
