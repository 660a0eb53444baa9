//! 스테이지 디스크립터
//!
//! 서비스별 input 설정 문서(`{"input": [...], "filter": [...]}`)와
//! global 설정 문서의 `output` 항목을 표현합니다.
//! 디스크립터는 파싱 이후 변경되지 않으며, 빌더가 한 번 소비합니다.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::PipelineError;

/// output 디스크립터
///
/// destination별 옵션이 자유로우므로 JSON 객체 그대로 보관합니다.
/// 빌드 시 global 설정이 병합됩니다.
pub type OutputDescriptor = Map<String, Value>;

/// 스테이지 적용 조건
///
/// `fields`의 각 키는 레코드 메타데이터 필드(`type`, `rowtype`)이고,
/// 값은 허용되는 값 목록입니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conditions {
    /// 필드 이름 → 허용 값 목록
    #[serde(default)]
    pub fields: BTreeMap<String, Vec<String>>,
}

impl Conditions {
    /// `field`의 허용 값 목록에 `value`가 있는지 확인합니다.
    pub fn allows(&self, field: &str, value: Option<&str>) -> bool {
        match (self.fields.get(field), value) {
            (Some(values), Some(value)) => values.iter().any(|v| v == value),
            _ => false,
        }
    }

    /// `fields` 항목이 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// output 디스크립터의 `conditions` 항목을 읽습니다. 형식이 맞지 않으면 `None`입니다.
    pub fn from_output(descriptor: &OutputDescriptor) -> Option<Self> {
        descriptor
            .get("conditions")
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }
}

/// input 디스크립터
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputDescriptor {
    /// input 구현 별칭 (예: `file`, `simulate`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// 로그 타입 (예: `hdfs_namenode`)
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub log_type: Option<String>,
    /// 레코드 분류 (예: `service`, `audit`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rowtype: Option<String>,
    /// 로그 파일 경로
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// 모든 레코드에 추가할 정적 필드
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub add_fields: BTreeMap<String, String>,
    /// 활성화 여부 (기본 true)
    #[serde(
        default,
        deserialize_with = "lenient_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub is_enabled: Option<bool>,
    /// 적용 조건
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Conditions>,
    /// 구현별 추가 옵션
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl InputDescriptor {
    /// 주어진 별칭의 input 디스크립터를 생성합니다.
    pub fn with_source(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            ..Self::default()
        }
    }

    /// 명시적으로 비활성화되지 않았으면 true입니다.
    pub fn is_enabled(&self) -> bool {
        self.is_enabled.unwrap_or(true)
    }

    /// 문자열 옵션을 조회합니다.
    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(Value::as_str)
    }

    /// 정수 옵션을 조회합니다. `"100"`처럼 문자열로 적힌 값도 허용합니다.
    pub fn option_u64(&self, key: &str) -> Option<u64> {
        option_u64(&self.options, key)
    }

    /// 불리언 옵션을 조회합니다. `"true"` 문자열도 허용합니다.
    pub fn option_bool(&self, key: &str) -> Option<bool> {
        option_bool(&self.options, key)
    }
}

/// filter 디스크립터
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterDescriptor {
    /// filter 구현 별칭 (예: `json`, `keyvalue`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// 체인 내 정렬 순서
    #[serde(
        default,
        deserialize_with = "lenient_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub sort_order: Option<i64>,
    /// 활성화 여부 (명시적인 false만 비활성화)
    #[serde(
        default,
        deserialize_with = "lenient_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub is_enabled: Option<bool>,
    /// 적용 조건
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Conditions>,
    /// 파싱 대상 필드 (기본 `log_message`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_field: Option<String>,
    /// 파싱 후 원본 필드 삭제 여부
    #[serde(
        default,
        deserialize_with = "lenient_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub remove_source_field: Option<bool>,
    /// 멀티라인 시작 패턴
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiline_pattern: Option<String>,
    /// 구현별 추가 옵션
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl FilterDescriptor {
    /// 주어진 별칭과 정렬 순서로 filter 디스크립터를 생성합니다.
    pub fn new(filter: impl Into<String>, sort_order: Option<i64>) -> Self {
        Self {
            filter: Some(filter.into()),
            sort_order,
            ..Self::default()
        }
    }

    /// `is_enabled: false`가 명시된 경우에만 비활성입니다.
    pub fn is_disabled(&self) -> bool {
        self.is_enabled == Some(false)
    }

    /// 문자열 옵션을 조회합니다.
    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(Value::as_str)
    }
}

/// 서비스 하나의 input 설정 문서
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    /// input 디스크립터 목록
    #[serde(default)]
    pub input: Vec<InputDescriptor>,
    /// filter 디스크립터 목록
    #[serde(default)]
    pub filter: Vec<FilterDescriptor>,
}

impl InputConfig {
    /// JSON 문서를 파싱합니다.
    pub fn parse(location: &str, text: &str) -> Result<Self, PipelineError> {
        serde_json::from_str(text).map_err(|e| PipelineError::Load {
            location: location.to_owned(),
            reason: e.to_string(),
        })
    }
}

// `"true"`, `"10"`처럼 문자열로 적힌 값도 허용한다.
fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Bool(b)) => Some(b),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// JSON 맵에서 정수 옵션을 읽습니다.
pub(crate) fn option_u64(options: &Map<String, Value>, key: &str) -> Option<u64> {
    match options.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// JSON 맵에서 불리언 옵션을 읽습니다.
pub(crate) fn option_bool(options: &Map<String, Value>, key: &str) -> Option<bool> {
    match options.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
