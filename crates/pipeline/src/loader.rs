//! 설정 문서 로더
//!
//! global/output 설정 문서를 파일 시스템 또는 번들 리소스에서 읽습니다.
//!
//! # 문서 형식
//!
//! ```json
//! {
//!   "global": { "add_fields": { "cluster": "c1" } },
//!   "output": [ { "destination": "stdout" } ]
//! }
//! ```
//!
//! - `global`의 최상위 키는 나중에 읽은 문서가 이깁니다.
//! - `output` 항목은 읽은 순서대로 누적됩니다.
//! - 그 밖의 키는 경고 후 무시합니다.
//!
//! 문서는 먼저 전부 파싱한 뒤 상태에 반영하므로, 실패한 문서는
//! 이전에 반영된 문서에 영향을 주지 않습니다.

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use logfeeder_core::metrics as m;

use crate::descriptor::OutputDescriptor;
use crate::error::PipelineError;

/// 번들 기본 설정 문서 이름
pub const DEFAULT_RESOURCE: &str = "config.json";

const BUNDLED_CONFIG: &str = include_str!("../resources/config.json");

/// 바이너리에 포함된 설정 문서 모음
#[derive(Debug, Clone)]
pub struct BundledResources {
    documents: HashMap<String, Cow<'static, str>>,
}

impl Default for BundledResources {
    fn default() -> Self {
        Self::builtin()
    }
}

impl BundledResources {
    /// 기본 `config.json`만 포함한 리소스 모음
    pub fn builtin() -> Self {
        let mut documents = HashMap::new();
        documents.insert(DEFAULT_RESOURCE.to_owned(), Cow::Borrowed(BUNDLED_CONFIG));
        Self { documents }
    }

    /// 빈 리소스 모음
    pub fn empty() -> Self {
        Self {
            documents: HashMap::new(),
        }
    }

    /// 문서를 추가합니다. 같은 이름은 교체됩니다.
    pub fn insert(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.documents.insert(name.into(), Cow::Owned(text.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.documents.get(name).map(|text| text.as_ref())
    }
}

/// 로딩 결과 누적 상태
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedConfig {
    /// global 설정 (최상위 키 last-wins)
    pub global: Map<String, Value>,
    /// output 디스크립터 (로딩 순서)
    pub outputs: Vec<OutputDescriptor>,
    /// 원본 문서 텍스트 (로딩 순서)
    pub raw_documents: Vec<String>,
}

impl LoadedConfig {
    /// 문서 하나를 파싱하여 반영합니다.
    ///
    /// 파싱이 끝나기 전에는 상태를 바꾸지 않습니다.
    pub fn apply_document(&mut self, location: &str, text: &str) -> Result<(), PipelineError> {
        let load_error = |reason: String| PipelineError::Load {
            location: location.to_owned(),
            reason,
        };

        let document = match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(document)) => document,
            Ok(_) => return Err(load_error("top level must be a JSON object".to_owned())),
            Err(e) => return Err(load_error(e.to_string())),
        };

        let mut global = None;
        let mut outputs = Vec::new();
        for (key, value) in document {
            match key.as_str() {
                "global" => match value {
                    Value::Object(map) => global = Some(map),
                    Value::Null => {}
                    _ => return Err(load_error("'global' must be a JSON object".to_owned())),
                },
                "output" => match value {
                    Value::Array(items) => {
                        for item in items {
                            match item {
                                Value::Object(descriptor) => outputs.push(descriptor),
                                other => warn!(
                                    location,
                                    entry = %other,
                                    "ignoring non-object output entry"
                                ),
                            }
                        }
                    }
                    Value::Null => {}
                    _ => return Err(load_error("'output' must be a JSON array".to_owned())),
                },
                other => warn!(location, key = other, "unknown config key, ignoring"),
            }
        }

        if let Some(global) = global {
            self.global.extend(global);
        }
        debug!(location, outputs = outputs.len(), "config document applied");
        self.outputs.extend(outputs);
        self.raw_documents.push(text.to_owned());
        metrics::counter!(m::ASSEMBLY_DOCUMENTS_LOADED_TOTAL).increment(1);
        Ok(())
    }
}

/// 설정 문서 로더
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    resources: BundledResources,
}

impl ConfigLoader {
    pub fn new(resources: BundledResources) -> Self {
        Self { resources }
    }

    /// 소스 목록을 순서대로 읽어 누적합니다.
    pub async fn load(&self, sources: &[String]) -> Result<LoadedConfig, PipelineError> {
        let mut loaded = LoadedConfig::default();
        for source in sources {
            self.load_into(&mut loaded, source).await?;
        }
        Ok(loaded)
    }

    /// 소스 하나를 읽어 기존 상태에 반영합니다.
    pub async fn load_into(
        &self,
        loaded: &mut LoadedConfig,
        source: &str,
    ) -> Result<(), PipelineError> {
        let text = self.read_source(source).await?;
        loaded.apply_document(source, &text)
    }

    /// 파일 시스템을 먼저 찾고, 없으면 번들 리소스에서 찾습니다.
    ///
    /// 이름의 `"\ "`는 이스케이프된 공백으로 취급합니다.
    pub async fn read_source(&self, source: &str) -> Result<String, PipelineError> {
        let name = source.replace("\\ ", " ");
        let path = Path::new(&name);

        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            info!(path = %path.display(), "loading config file");
            return tokio::fs::read_to_string(path)
                .await
                .map_err(|e| PipelineError::Load {
                    location: source.to_owned(),
                    reason: e.to_string(),
                });
        }

        if let Some(text) = self.resources.get(&name) {
            info!(resource = %name, "loading bundled config");
            return Ok(text.to_owned());
        }

        Err(PipelineError::Load {
            location: source.to_owned(),
            reason: "not found on filesystem or in bundled resources".to_owned(),
        })
    }
}
