//! JSON filter
//!
//! 대상 필드의 JSON 객체를 파싱하여 최상위 키를 레코드 필드로 병합합니다.
//!
//! # 옵션
//! - `max_input_size`: 허용 최대 바이트 수 (기본 1MB)
//! - `drop_invalid`: JSON이 아닌 레코드를 에러 대신 조용히 폐기

use serde_json::Value;

use logfeeder_core::types::Record;

use super::SourceField;
use crate::descriptor::{FilterDescriptor, option_bool, option_u64};
use crate::error::PipelineError;
use crate::stage::{Filter, FilterAction};

const DEFAULT_MAX_INPUT_SIZE: usize = 1024 * 1024;

/// JSON filter
pub struct JsonFilter {
    source: SourceField,
    max_input_size: usize,
    drop_invalid: bool,
}

impl Default for JsonFilter {
    fn default() -> Self {
        Self {
            source: SourceField::default(),
            max_input_size: DEFAULT_MAX_INPUT_SIZE,
            drop_invalid: false,
        }
    }
}

impl JsonFilter {
    fn parse(&self, text: &str) -> Result<serde_json::Map<String, Value>, PipelineError> {
        if text.len() > self.max_input_size {
            return Err(PipelineError::stage(
                self.short_description(),
                format!(
                    "input too large: {} bytes (max: {})",
                    text.len(),
                    self.max_input_size
                ),
            ));
        }

        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(PipelineError::stage(
                self.short_description(),
                "expected JSON object at top level",
            )),
            Err(e) => Err(PipelineError::stage(
                self.short_description(),
                format!("invalid json at column {}: {e}", e.column()),
            )),
        }
    }
}

impl Filter for JsonFilter {
    fn load_config(&mut self, descriptor: &FilterDescriptor) -> Result<(), PipelineError> {
        self.source = SourceField::from_descriptor(descriptor);
        if let Some(size) = option_u64(&descriptor.options, "max_input_size") {
            self.max_input_size = usize::try_from(size).unwrap_or(usize::MAX);
        }
        self.drop_invalid = option_bool(&descriptor.options, "drop_invalid").unwrap_or(false);
        Ok(())
    }

    fn short_description(&self) -> String {
        format!("filter:json source_field={}", self.source.name())
    }

    fn apply(&mut self, record: &mut Record) -> Result<FilterAction, PipelineError> {
        let Some(text) = self.source.value(record) else {
            return Ok(FilterAction::Continue);
        };

        let fields = match self.parse(&text) {
            Ok(fields) => fields,
            Err(_) if self.drop_invalid => return Ok(FilterAction::Drop),
            Err(e) => return Err(e),
        };

        self.source.finish(record);
        for (key, value) in fields {
            record.insert(key, value);
        }
        Ok(FilterAction::Continue)
    }
}
