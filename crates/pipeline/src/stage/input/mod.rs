//! 기본 제공 input 구현

pub mod file;
pub mod simulate;

use logfeeder_core::types::Record;

use crate::descriptor::InputDescriptor;

pub use file::FileInput;
pub use simulate::SimulateInput;

/// `add_fields`와 input 메타데이터(`type`, `rowtype`, `path`)를 레코드에 붙입니다.
pub fn decorate(descriptor: &InputDescriptor, record: &mut Record) {
    for (key, value) in &descriptor.add_fields {
        record.insert(key.as_str(), value.as_str());
    }
    if let Some(log_type) = &descriptor.log_type {
        record.insert("type", log_type.as_str());
    }
    if let Some(rowtype) = &descriptor.rowtype {
        record.insert("rowtype", rowtype.as_str());
    }
    if let Some(path) = &descriptor.path {
        record.insert("path", path.as_str());
    }
}
