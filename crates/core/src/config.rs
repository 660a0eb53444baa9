//! 설정 관리 -- logfeeder.toml 파싱 및 런타임 설정
//!
//! [`FeederConfig`]는 프로세스 수준의 설정을 담는 최상위 구조체입니다.
//! 파이프라인 자체의 선언(global/output/input/filter)은 JSON 설정 문서로
//! 따로 관리되며, 이 파일은 그 문서들의 위치와 실행 옵션만 다룹니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`LOGFEEDER_FEED_INPUT_CONFIG_DIR=/etc/logfeeder/inputs` 형식)
//! 3. 설정 파일 (`logfeeder.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), logfeeder_core::error::FeederError> {
//! use logfeeder_core::config::FeederConfig;
//!
//! let config = FeederConfig::load("logfeeder.toml").await?;
//! let config = FeederConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, FeederError};

/// logfeeder 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeederConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 파이프라인 조립 설정
    #[serde(default)]
    pub feed: FeedConfig,
    /// Prometheus 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl FeederConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, FeederError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, FeederError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FeederError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                FeederError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, FeederError> {
        toml::from_str(toml_str).map_err(|e| {
            FeederError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `LOGFEEDER_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "LOGFEEDER_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOGFEEDER_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.pid_file, "LOGFEEDER_GENERAL_PID_FILE");

        // Feed
        override_csv(&mut self.feed.config_files, "LOGFEEDER_FEED_CONFIG_FILES");
        override_string(
            &mut self.feed.input_config_dir,
            "LOGFEEDER_FEED_INPUT_CONFIG_DIR",
        );
        override_string(
            &mut self.feed.default_config_file,
            "LOGFEEDER_FEED_DEFAULT_CONFIG_FILE",
        );
        override_usize(
            &mut self.feed.simulate_input_number,
            "LOGFEEDER_FEED_SIMULATE_INPUT_NUMBER",
        );
        override_string(&mut self.feed.checkpoint_dir, "LOGFEEDER_FEED_CHECKPOINT_DIR");
        override_u64(
            &mut self.feed.stats_interval_secs,
            "LOGFEEDER_FEED_STATS_INTERVAL_SECS",
        );
        override_u64(
            &mut self.feed.config_poll_secs,
            "LOGFEEDER_FEED_CONFIG_POLL_SECS",
        );
        override_u64(
            &mut self.feed.shutdown_timeout_secs,
            "LOGFEEDER_FEED_SHUTDOWN_TIMEOUT_SECS",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "LOGFEEDER_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "LOGFEEDER_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "LOGFEEDER_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), FeederError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if self.feed.config_files.is_empty() && self.feed.default_config_file.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "feed.default_config_file".to_owned(),
                reason: "must not be empty when feed.config_files is empty".to_owned(),
            }
            .into());
        }

        if self.feed.stats_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "feed.stats_interval_secs".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if self.feed.config_poll_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "feed.config_poll_secs".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if self.feed.shutdown_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "feed.shutdown_timeout_secs".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "metrics.port".to_owned(),
                reason: "must not be 0 when metrics are enabled".to_owned(),
            }
            .into());
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// PID 파일 경로 (빈 문자열이면 사용하지 않음)
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            pid_file: "/var/run/logfeeder.pid".to_owned(),
        }
    }
}

/// 파이프라인 조립 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// global/output 설정 문서 위치 목록 (파일 경로 또는 번들 리소스 이름)
    pub config_files: Vec<String>,
    /// 서비스별 input 설정 디렉토리 (`input.config-<service>.json`)
    pub input_config_dir: String,
    /// `config_files`가 비어 있을 때 사용할 기본 문서 이름
    pub default_config_file: String,
    /// 시뮬레이션 input 개수 (0이면 비활성화)
    pub simulate_input_number: usize,
    /// 체크포인트 디렉토리
    pub checkpoint_dir: String,
    /// 통계 로깅 주기 (초)
    pub stats_interval_secs: u64,
    /// input 설정 디렉토리 폴링 주기 (초)
    pub config_poll_secs: u64,
    /// input 종료 대기 시간 (초)
    pub shutdown_timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            config_files: Vec::new(),
            input_config_dir: "/etc/logfeeder/inputs".to_owned(),
            default_config_file: "config.json".to_owned(),
            simulate_input_number: 0,
            checkpoint_dir: "/var/lib/logfeeder/checkpoints".to_owned(),
            stats_interval_secs: 60,
            config_poll_secs: 5,
            shutdown_timeout_secs: 30,
        }
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 리스닝 주소
    pub listen_addr: String,
    /// 리스닝 포트
    pub port: u16,
    /// 스크레이프 엔드포인트 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9108,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_has_sane_values() {
        let config = FeederConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "json");
        assert!(config.feed.config_files.is_empty());
        assert_eq!(config.feed.default_config_file, "config.json");
        assert_eq!(config.feed.simulate_input_number, 0);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn default_config_passes_validation() {
        FeederConfig::default().validate().unwrap();
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config = FeederConfig::parse("").unwrap();
        assert_eq!(config.feed.stats_interval_secs, 60);
        assert_eq!(config.metrics.port, 9108);
    }

    #[test]
    fn partial_toml_merges_with_defaults() {
        let toml = r#"
[general]
log_level = "debug"

[feed]
config_files = ["global.config.json", "output.config.json"]
simulate_input_number = 3
"#;
        let config = FeederConfig::parse(toml).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.feed.config_files.len(), 2);
        assert_eq!(config.feed.simulate_input_number, 3);
        assert_eq!(config.feed.default_config_file, "config.json");
    }

    #[test]
    fn invalid_toml_returns_parse_error() {
        let err = FeederConfig::parse("invalid = [[[toml").unwrap_err();
        assert!(matches!(
            err,
            FeederError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = FeederConfig::default();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }

    #[test]
    fn validate_rejects_invalid_log_format() {
        let mut config = FeederConfig::default();
        config.general.log_format = "xml".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_format"));
    }

    #[test]
    fn validate_rejects_missing_default_document() {
        let mut config = FeederConfig::default();
        config.feed.default_config_file = "  ".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("default_config_file"));

        // 명시적 목록이 있으면 기본 문서는 필요 없음
        config.feed.config_files = vec!["a.json".to_owned()];
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_zero_intervals() {
        let mut config = FeederConfig::default();
        config.feed.stats_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = FeederConfig::default();
        config.feed.shutdown_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_metrics_port_when_enabled() {
        let mut config = FeederConfig::default();
        config.metrics.enabled = true;
        config.metrics.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn env_override_csv_and_numbers() {
        // SAFETY: serial 테스트이므로 다른 테스트와 환경변수를 공유하지 않습니다.
        unsafe {
            std::env::set_var("LOGFEEDER_FEED_CONFIG_FILES", "a.json, b.json,,");
            std::env::set_var("LOGFEEDER_FEED_SIMULATE_INPUT_NUMBER", "5");
        }
        let mut config = FeederConfig::default();
        config.apply_env_overrides();
        unsafe {
            std::env::remove_var("LOGFEEDER_FEED_CONFIG_FILES");
            std::env::remove_var("LOGFEEDER_FEED_SIMULATE_INPUT_NUMBER");
        }

        assert_eq!(config.feed.config_files, vec!["a.json", "b.json"]);
        assert_eq!(config.feed.simulate_input_number, 5);
    }

    #[test]
    #[serial]
    fn env_override_ignores_unparsable_values() {
        unsafe { std::env::set_var("LOGFEEDER_METRICS_PORT", "not-a-port") };
        let mut config = FeederConfig::default();
        config.apply_env_overrides();
        unsafe { std::env::remove_var("LOGFEEDER_METRICS_PORT") };

        assert_eq!(config.metrics.port, 9108);
    }

    #[tokio::test]
    async fn from_file_missing_returns_not_found() {
        let err = FeederConfig::from_file("/nonexistent/logfeeder.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FeederError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
