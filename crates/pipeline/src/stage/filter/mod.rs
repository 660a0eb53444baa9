//! 기본 제공 filter 구현
//!
//! 모든 filter는 `source_field`(기본 `log_message`)의 문자열 값을 파싱하여
//! 결과 필드를 레코드에 추가하고, `remove_source_field`가 설정되면 원본 필드를 삭제합니다.

pub mod json;
pub mod keyvalue;

use logfeeder_core::types::{MESSAGE_FIELD, Record};

use crate::descriptor::FilterDescriptor;

pub use json::JsonFilter;
pub use keyvalue::KeyValueFilter;

/// 파싱 대상 필드 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceField {
    field: String,
    remove: bool,
}

impl Default for SourceField {
    fn default() -> Self {
        Self {
            field: MESSAGE_FIELD.to_owned(),
            remove: false,
        }
    }
}

impl SourceField {
    /// 디스크립터에서 대상 필드 설정을 읽습니다.
    pub fn from_descriptor(descriptor: &FilterDescriptor) -> Self {
        Self {
            field: descriptor
                .source_field
                .clone()
                .filter(|f| !f.is_empty())
                .unwrap_or_else(|| MESSAGE_FIELD.to_owned()),
            remove: descriptor.remove_source_field.unwrap_or(false),
        }
    }

    /// 대상 필드 이름
    pub fn name(&self) -> &str {
        &self.field
    }

    /// 대상 필드의 문자열 값을 복사해 옵니다.
    pub fn value(&self, record: &Record) -> Option<String> {
        record.get_str(&self.field).map(str::to_owned)
    }

    /// 설정에 따라 원본 필드를 삭제합니다.
    pub fn finish(&self, record: &mut Record) {
        if self.remove {
            record.remove(&self.field);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_message_field() {
        let source = SourceField::from_descriptor(&FilterDescriptor::new("json", None));
        assert_eq!(source.name(), MESSAGE_FIELD);

        let mut record = Record::new("payload");
        assert_eq!(source.value(&record).as_deref(), Some("payload"));
        source.finish(&mut record);
        assert_eq!(record.message(), Some("payload"));
    }

    #[test]
    fn removes_custom_field_when_configured() {
        let mut descriptor = FilterDescriptor::new("keyvalue", None);
        descriptor.source_field = Some("raw".to_owned());
        descriptor.remove_source_field = Some(true);
        let source = SourceField::from_descriptor(&descriptor);

        let mut record = Record::empty();
        record.insert("raw", "a=1");
        source.finish(&mut record);
        assert!(record.get_str("raw").is_none());
    }
}
