//! 도메인 타입 -- 스테이지 사이를 흐르는 공통 타입
//!
//! input이 만든 [`Record`]는 필터 체인을 거쳐 output으로 전달됩니다.
//! [`MetricData`]는 스테이지 통계를 외부 수집기로 넘길 때 사용하는 스냅샷입니다.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 원본 로그 라인이 담기는 필드 이름
pub const MESSAGE_FIELD: &str = "log_message";

/// 로그 레코드
///
/// 필드는 JSON 값 맵으로 보관합니다. 필터는 필드를 추가/삭제하고,
/// output은 레코드 전체를 직렬화합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// 레코드 필드
    pub fields: Map<String, Value>,
    /// 수집 시각
    pub received_at: DateTime<Utc>,
}

impl Record {
    /// 원본 메시지 한 줄로 레코드를 생성합니다.
    pub fn new(message: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert(MESSAGE_FIELD.to_owned(), Value::String(message.into()));
        Self {
            fields,
            received_at: Utc::now(),
        }
    }

    /// 빈 레코드를 생성합니다.
    pub fn empty() -> Self {
        Self {
            fields: Map::new(),
            received_at: Utc::now(),
        }
    }

    /// 원본 메시지를 반환합니다.
    pub fn message(&self) -> Option<&str> {
        self.get_str(MESSAGE_FIELD)
    }

    /// 문자열 필드를 조회합니다.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// 필드를 설정합니다. 기존 값은 덮어씁니다.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    /// 필드가 없을 때만 설정합니다.
    pub fn insert_if_absent(&mut self, key: &str, value: impl Into<Value>) {
        if !self.fields.contains_key(key) {
            self.fields.insert(key.to_owned(), value.into());
        }
    }

    /// 필드를 제거하고 값을 반환합니다.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    /// 레코드를 JSON 한 줄로 직렬화합니다.
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.fields)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message() {
            Some(message) => write!(f, "{message}"),
            None => write!(f, "<{} fields>", self.fields.len()),
        }
    }
}

/// 메트릭 스냅샷
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricData {
    /// 메트릭 이름
    pub name: String,
    /// 스테이지 설명 (예: `input:file - /var/log/hdfs.log`)
    pub stage: String,
    /// 값
    pub value: u64,
    /// 누적값이 아닌 시점값 여부
    pub point_in_time: bool,
}

impl MetricData {
    /// 누적 카운터 스냅샷을 생성합니다.
    pub fn counter(name: impl Into<String>, stage: impl Into<String>, value: u64) -> Self {
        Self {
            name: name.into(),
            stage: stage.into(),
            value,
            point_in_time: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_new_sets_message_field() {
        let record = Record::new("user=alice action=login");
        assert_eq!(record.message(), Some("user=alice action=login"));
        assert_eq!(record.to_string(), "user=alice action=login");
    }

    #[test]
    fn insert_if_absent_keeps_existing_value() {
        let mut record = Record::new("line");
        record.insert("level", "INFO");
        record.insert_if_absent("level", "WARN");
        record.insert_if_absent("host", "node-1");
        assert_eq!(record.get_str("level"), Some("INFO"));
        assert_eq!(record.get_str("host"), Some("node-1"));
    }

    #[test]
    fn empty_record_display_shows_field_count() {
        let mut record = Record::empty();
        record.insert("a", 1);
        assert_eq!(record.to_string(), "<1 fields>");
    }

    #[test]
    fn to_json_line_serializes_fields_only() {
        let mut record = Record::empty();
        record.insert("level", "ERROR");
        assert_eq!(record.to_json_line().unwrap(), r#"{"level":"ERROR"}"#);
    }

    #[test]
    fn metric_data_counter_is_cumulative() {
        let metric = MetricData::counter("logfeeder_input_records_read_total", "input:file", 7);
        assert!(!metric.point_in_time);
        assert_eq!(metric.value, 7);
    }
}
