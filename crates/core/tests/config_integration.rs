//! logfeeder.toml 통합 설정 테스트
//!
//! - logfeeder.toml.example 파싱 테스트
//! - 부분 설정 로딩 테스트
//! - 환경변수 우선순위 테스트
//! - 빈 파일 / 잘못된 형식 에러 테스트

use logfeeder_core::config::FeederConfig;
use logfeeder_core::error::{ConfigError, FeederError};
use serial_test::serial;

// =============================================================================
// logfeeder.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_successfully() {
    let content = include_str!("../../../logfeeder.toml.example");
    let config = FeederConfig::parse(content).expect("example config should parse");

    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.general.log_format, "json");
    assert_eq!(config.general.pid_file, "/var/run/logfeeder.pid");
}

#[test]
fn example_config_matches_defaults() {
    let content = include_str!("../../../logfeeder.toml.example");
    let config = FeederConfig::parse(content).expect("should parse");
    let defaults = FeederConfig::default();

    assert_eq!(config.feed.config_files, defaults.feed.config_files);
    assert_eq!(config.feed.default_config_file, defaults.feed.default_config_file);
    assert_eq!(config.feed.input_config_dir, defaults.feed.input_config_dir);
    assert_eq!(config.feed.checkpoint_dir, defaults.feed.checkpoint_dir);
    assert_eq!(config.feed.stats_interval_secs, defaults.feed.stats_interval_secs);
    assert_eq!(config.feed.config_poll_secs, defaults.feed.config_poll_secs);
    assert_eq!(config.metrics.port, defaults.metrics.port);
    config.validate().expect("example config should pass validation");
}

// =============================================================================
// 부분 설정 / 에러 테스트
// =============================================================================

#[test]
fn feed_only_config_keeps_other_defaults() {
    let config = FeederConfig::parse("[feed]\nsimulate_input_number = 3\n").expect("should parse");

    assert_eq!(config.feed.simulate_input_number, 3);
    assert_eq!(config.feed.shutdown_timeout_secs, 30);
    assert_eq!(config.general.log_level, "info");
}

#[test]
fn invalid_toml_is_parse_error() {
    let err = FeederConfig::parse("[general\n").unwrap_err();
    assert!(matches!(
        err,
        FeederError::Config(ConfigError::ParseFailed { .. })
    ));
}

#[test]
fn invalid_log_format_is_rejected() {
    let config = FeederConfig::parse("[general]\nlog_format = \"xml\"\n").expect("should parse");
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("general.log_format"));
}

#[tokio::test]
async fn missing_file_is_file_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let err = FeederConfig::from_file(dir.path().join("absent.toml"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FeederError::Config(ConfigError::FileNotFound { .. })
    ));
}

// =============================================================================
// 환경변수 우선순위 테스트
// =============================================================================

#[tokio::test]
#[serial]
async fn env_override_beats_file_value() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logfeeder.toml");
    std::fs::write(&path, "[feed]\nconfig_poll_secs = 9\n").unwrap();

    unsafe {
        std::env::set_var("LOGFEEDER_FEED_CONFIG_POLL_SECS", "1");
    }
    let result = FeederConfig::load(&path).await;
    unsafe {
        std::env::remove_var("LOGFEEDER_FEED_CONFIG_POLL_SECS");
    }

    assert_eq!(result.unwrap().feed.config_poll_secs, 1);
}

#[tokio::test]
#[serial]
async fn env_override_is_validated() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logfeeder.toml");
    std::fs::write(&path, "").unwrap();

    unsafe {
        std::env::set_var("LOGFEEDER_GENERAL_LOG_LEVEL", "loud");
    }
    let result = FeederConfig::load(&path).await;
    unsafe {
        std::env::remove_var("LOGFEEDER_GENERAL_LOG_LEVEL");
    }

    assert!(result.is_err());
}
