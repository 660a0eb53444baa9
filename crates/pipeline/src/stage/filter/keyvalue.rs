//! key=value filter
//!
//! `field_split`(기본 탭)으로 항목을 나누고 `value_split`(기본 `=`)으로
//! 키와 값을 나눕니다. 키가 비어 있거나 구분자가 없는 항목은 무시합니다.

use logfeeder_core::types::Record;

use super::SourceField;
use crate::descriptor::FilterDescriptor;
use crate::error::PipelineError;
use crate::stage::{Filter, FilterAction, StageKind};

const DEFAULT_FIELD_SPLIT: &str = "\t";
const DEFAULT_VALUE_SPLIT: &str = "=";

/// key=value filter
pub struct KeyValueFilter {
    source: SourceField,
    field_split: String,
    value_split: String,
}

impl Default for KeyValueFilter {
    fn default() -> Self {
        Self {
            source: SourceField::default(),
            field_split: DEFAULT_FIELD_SPLIT.to_owned(),
            value_split: DEFAULT_VALUE_SPLIT.to_owned(),
        }
    }
}

impl KeyValueFilter {
    fn pairs<'t>(&self, text: &'t str) -> impl Iterator<Item = (&'t str, &'t str)> {
        text.split(self.field_split.as_str()).filter_map(|item| {
            let (key, value) = item.split_once(self.value_split.as_str())?;
            let key = key.trim();
            (!key.is_empty()).then_some((key, value.trim()))
        })
    }
}

impl Filter for KeyValueFilter {
    fn load_config(&mut self, descriptor: &FilterDescriptor) -> Result<(), PipelineError> {
        self.source = SourceField::from_descriptor(descriptor);
        if let Some(split) = descriptor.option_str("field_split") {
            self.field_split = split.to_owned();
        }
        if let Some(split) = descriptor.option_str("value_split") {
            self.value_split = split.to_owned();
        }
        if self.field_split.is_empty() {
            return Err(PipelineError::validation(
                StageKind::Filter,
                "field_split",
                "must not be empty",
            ));
        }
        if self.value_split.is_empty() {
            return Err(PipelineError::validation(
                StageKind::Filter,
                "value_split",
                "must not be empty",
            ));
        }
        Ok(())
    }

    fn short_description(&self) -> String {
        format!(
            "filter:keyvalue source_field={} field_split={:?} value_split={:?}",
            self.source.name(),
            self.field_split,
            self.value_split
        )
    }

    fn apply(&mut self, record: &mut Record) -> Result<FilterAction, PipelineError> {
        let Some(text) = self.source.value(record) else {
            return Ok(FilterAction::Continue);
        };

        let pairs: Vec<(String, String)> = self
            .pairs(&text)
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        if pairs.is_empty() {
            return Ok(FilterAction::Continue);
        }

        self.source.finish(record);
        for (key, value) in pairs {
            record.insert(key, value);
        }
        Ok(FilterAction::Continue)
    }
}
