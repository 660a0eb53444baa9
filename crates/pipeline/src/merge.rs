//! global 기본값 병합
//!
//! output 디스크립터를 생성하기 전에 global 설정을 기본값으로 채워 넣습니다.
//! 대상에 이미 있는 값은 어느 단계에서도 덮어쓰지 않습니다.

use serde_json::{Map, Value};

/// `defaults`의 값을 `target`에 없는 키에 한해서 채웁니다.
///
/// 1. 객체 값을 갖는 기본 키마다 그 객체를 복제하여, 대상의 같은 키 아래 객체에
///    없는 필드만 복사합니다. 대상에 키가 없으면 빈 객체를 만든 뒤 채우고,
///    대상 값이 객체가 아니면 건드리지 않습니다. null 기본값은 이 단계에서 건너뜁니다.
/// 2. 대상에 없는 최상위 키를 복사합니다.
///
/// 한 단계 중첩까지만 채우며, `defaults`는 변경하지 않습니다. 같은 `defaults`로
/// 두 번 적용해도 결과가 같습니다.
pub fn merge_defaults(defaults: &Map<String, Value>, target: &mut Map<String, Value>) {
    for (key, value) in defaults {
        let Value::Object(default_fields) = value else {
            continue;
        };
        let nested = target
            .entry(key.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(target_fields) = nested {
            for (field, field_value) in default_fields {
                if !target_fields.contains_key(field) {
                    target_fields.insert(field.clone(), field_value.clone());
                }
            }
        }
    }

    for (key, value) in defaults {
        if !target.contains_key(key) {
            target.insert(key.clone(), value.clone());
        }
    }
}
