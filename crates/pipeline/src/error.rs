//! 파이프라인 조립 에러 타입
//!
//! [`PipelineError`]는 설정 로딩, 스테이지 해석, 스테이지 실행 중 발생하는 에러를 표현합니다.
//! `From<PipelineError> for FeederError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.
//!
//! 문서 로딩 실패([`PipelineError::Load`])만 호출자에게 전파되고,
//! 해석/검증 실패는 해당 디스크립터만 건너뛰고 로그로 남깁니다.

use logfeeder_core::error::{FeederError, PipelineError as CorePipelineError};

use crate::stage::StageKind;

/// 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 설정 문서 로딩 실패 (I/O 또는 JSON 파싱)
    #[error("failed to load config '{location}': {reason}")]
    Load {
        /// 문서 위치 (경로 또는 리소스 이름)
        location: String,
        /// 실패 사유
        reason: String,
    },

    /// 레지스트리에 없는 별칭
    #[error("no {kind} registered for alias '{alias}'")]
    Resolution {
        /// 스테이지 종류
        kind: StageKind,
        /// 요청한 별칭
        alias: String,
    },

    /// 필수 필드 누락 또는 잘못된 값
    #[error("invalid {kind} descriptor: {field}: {reason}")]
    Validation {
        /// 스테이지 종류
        kind: StageKind,
        /// 문제가 된 필드
        field: String,
        /// 실패 사유
        reason: String,
    },

    /// 스테이지 실행 중 에러
    #[error("stage '{stage}' failed: {reason}")]
    Stage {
        /// 스테이지 설명
        stage: String,
        /// 실패 사유
        reason: String,
    },

    /// 테스트 입력에서 찾을 수 없는 로그 타입
    #[error("no input with type '{0}' in the given config")]
    UnknownLogId(String),

    /// 조립기 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 직렬화 에러
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// 스테이지 실행 에러를 생성합니다.
    pub fn stage(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Stage {
            stage: stage.into(),
            reason: reason.into(),
        }
    }

    /// 검증 에러를 생성합니다.
    pub fn validation(kind: StageKind, field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            kind,
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<PipelineError> for FeederError {
    fn from(err: PipelineError) -> Self {
        let core = match &err {
            PipelineError::Stage { .. } => CorePipelineError::StageFailed(err.to_string()),
            _ => CorePipelineError::AssemblyFailed(err.to_string()),
        };
        FeederError::Pipeline(core)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_error_names_location() {
        let err = PipelineError::Load {
            location: "global.config.json".to_owned(),
            reason: "expected value at line 1".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("global.config.json"));
        assert!(msg.contains("line 1"));
    }

    #[test]
    fn resolution_error_display() {
        let err = PipelineError::Resolution {
            kind: StageKind::Filter,
            alias: "grok".to_owned(),
        };
        assert_eq!(err.to_string(), "no filter registered for alias 'grok'");
    }

    #[test]
    fn converts_to_feeder_error() {
        let err: FeederError = PipelineError::stage("output:stdout", "broken pipe").into();
        assert!(matches!(
            err,
            FeederError::Pipeline(CorePipelineError::StageFailed(_))
        ));

        let err: FeederError = PipelineError::UnknownLogId("hdfs_namenode".to_owned()).into();
        assert!(matches!(
            err,
            FeederError::Pipeline(CorePipelineError::AssemblyFailed(_))
        ));
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: PipelineError = io.into();
        assert!(matches!(err, PipelineError::Io(_)));
    }
}
