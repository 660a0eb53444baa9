//! 조립기 설정
//!
//! [`AssemblerConfig`]는 core의 [`FeedConfig`](logfeeder_core::config::FeedConfig)를
//! 기반으로 조립기 전용 설정을 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use logfeeder_core::config::FeederConfig;
//! use logfeeder_pipeline::config::AssemblerConfig;
//!
//! let core_config = FeederConfig::default();
//! let config = AssemblerConfig::from_core(&core_config.feed);
//! ```

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use logfeeder_core::config::FeedConfig;

use crate::error::PipelineError;

/// 조립기 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblerConfig {
    /// global/output 설정 문서 위치 목록
    pub config_files: Vec<String>,
    /// `config_files`가 비었을 때 사용할 문서 이름 (쉼표로 여러 개 지정 가능)
    pub default_config_file: String,
    /// 서비스별 input 설정 디렉토리
    pub input_config_dir: PathBuf,
    /// 시뮬레이션 input 개수 (0이면 비활성화)
    pub simulate_input_number: usize,
    /// 체크포인트 디렉토리
    pub checkpoint_dir: PathBuf,
    /// input 종료 대기 시간 (초)
    pub shutdown_timeout_secs: u64,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self::from_core(&FeedConfig::default())
    }
}

impl AssemblerConfig {
    /// core의 `FeedConfig`에서 조립기 설정을 생성합니다.
    pub fn from_core(core: &FeedConfig) -> Self {
        Self {
            config_files: core.config_files.clone(),
            default_config_file: core.default_config_file.clone(),
            input_config_dir: PathBuf::from(&core.input_config_dir),
            simulate_input_number: core.simulate_input_number,
            checkpoint_dir: PathBuf::from(&core.checkpoint_dir),
            shutdown_timeout_secs: core.shutdown_timeout_secs,
        }
    }

    /// 읽을 설정 문서 목록
    ///
    /// `config_files`가 비어 있으면 `default_config_file`을 쉼표로 나눈 목록입니다.
    pub fn config_sources(&self) -> Vec<String> {
        let sources: Vec<String> = if self.config_files.is_empty() {
            self.default_config_file
                .split(',')
                .map(|s| s.trim().to_owned())
                .collect()
        } else {
            self.config_files.clone()
        };
        sources.into_iter().filter(|s| !s.is_empty()).collect()
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn is_simulation(&self) -> bool {
        self.simulate_input_number > 0
    }

    fn validate_dir(field: &str, path: &Path) -> Result<(), PipelineError> {
        if path.as_os_str().is_empty() {
            return Err(PipelineError::Config {
                field: field.to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }
        if path.components().any(|c| c == Component::ParentDir) {
            return Err(PipelineError::Config {
                field: field.to_owned(),
                reason: format!("'{}' contains path traversal pattern '..'", path.display()),
            });
        }
        Ok(())
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), PipelineError> {
        const MAX_SIMULATED_INPUTS: usize = 10_000;
        const MAX_SHUTDOWN_TIMEOUT_SECS: u64 = 3600;

        if self.config_sources().is_empty() {
            return Err(PipelineError::Config {
                field: "config_files".to_owned(),
                reason: "at least one config document is required".to_owned(),
            });
        }

        if self.simulate_input_number > MAX_SIMULATED_INPUTS {
            return Err(PipelineError::Config {
                field: "simulate_input_number".to_owned(),
                reason: format!("must be 0-{MAX_SIMULATED_INPUTS}"),
            });
        }

        if self.shutdown_timeout_secs == 0 || self.shutdown_timeout_secs > MAX_SHUTDOWN_TIMEOUT_SECS {
            return Err(PipelineError::Config {
                field: "shutdown_timeout_secs".to_owned(),
                reason: format!("must be 1-{MAX_SHUTDOWN_TIMEOUT_SECS}"),
            });
        }

        Self::validate_dir("input_config_dir", &self.input_config_dir)?;
        Self::validate_dir("checkpoint_dir", &self.checkpoint_dir)?;
        Ok(())
    }
}

/// 조립기 설정 빌더
#[derive(Default)]
pub struct AssemblerConfigBuilder {
    config: AssemblerConfig,
}

impl AssemblerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 설정 문서 목록을 지정합니다.
    pub fn config_files(mut self, files: Vec<String>) -> Self {
        self.config.config_files = files;
        self
    }

    pub fn default_config_file(mut self, name: impl Into<String>) -> Self {
        self.config.default_config_file = name.into();
        self
    }

    pub fn input_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.input_config_dir = dir.into();
        self
    }

    /// 시뮬레이션 input 개수를 지정합니다.
    pub fn simulate_input_number(mut self, count: usize) -> Self {
        self.config.simulate_input_number = count;
        self
    }

    pub fn checkpoint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.checkpoint_dir = dir.into();
        self
    }

    pub fn shutdown_timeout_secs(mut self, secs: u64) -> Self {
        self.config.shutdown_timeout_secs = secs;
        self
    }

    /// 설정을 검증하고 `AssemblerConfig`를 생성합니다.
    pub fn build(self) -> Result<AssemblerConfig, PipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AssemblerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.config_sources(), vec!["config.json"]);
        assert!(!config.is_simulation());
    }

    #[test]
    fn from_core_preserves_values() {
        let core = FeedConfig {
            config_files: vec!["/etc/logfeeder/global.config.json".to_owned()],
            simulate_input_number: 3,
            shutdown_timeout_secs: 7,
            ..FeedConfig::default()
        };
        let config = AssemblerConfig::from_core(&core);
        assert_eq!(config.config_sources(), vec!["/etc/logfeeder/global.config.json"]);
        assert!(config.is_simulation());
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(7));
    }

    #[test]
    fn default_file_list_is_comma_separated() {
        let config = AssemblerConfigBuilder::new()
            .default_config_file("global.config.json, output.config.json,")
            .build()
            .unwrap();
        assert_eq!(
            config.config_sources(),
            vec!["global.config.json", "output.config.json"]
        );
    }

    #[test]
    fn empty_sources_rejected() {
        let err = AssemblerConfigBuilder::new()
            .default_config_file(" , ")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("config_files"));
    }

    #[test]
    fn traversal_in_checkpoint_dir_rejected() {
        let err = AssemblerConfigBuilder::new()
            .checkpoint_dir("/var/lib/../../etc")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("checkpoint_dir"));
    }

    #[test]
    fn zero_shutdown_timeout_rejected() {
        assert!(
            AssemblerConfigBuilder::new()
                .shutdown_timeout_secs(0)
                .build()
                .is_err()
        );
    }
}
