//! 서비스 input 설정 소스
//!
//! 서비스별 input 설정은 [`InputConfigMonitor`]를 통해 조립기로 전달됩니다.
//! [`DirectoryInputConfigSource`]는 디렉토리의 `input.config-<service>.json`
//! 파일을 읽고, 이후 폴링으로 변경/삭제를 감지합니다.
//!
//! - 새 파일 또는 변경된 파일: 해당 서비스 전체 교체
//! - 삭제된 파일: 해당 서비스 input 제거
//! - 파싱 실패: 기록 후 건너뜀 (파일이 다시 바뀌면 재시도)

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info, warn};

use crate::descriptor::InputConfig;
use crate::error::PipelineError;

/// input 설정 파일 이름 접두사
pub const INPUT_CONFIG_PREFIX: &str = "input.config-";

/// input 설정 파일 확장자
pub const INPUT_CONFIG_SUFFIX: &str = ".json";

/// 서비스 input 설정 수신자
pub trait InputConfigMonitor: Send {
    /// 서비스의 input 설정을 (다시) 적용합니다.
    fn load_input_configs(
        &mut self,
        service: &str,
        config: InputConfig,
    ) -> impl Future<Output = Result<(), PipelineError>> + Send;

    /// 서비스의 input을 모두 제거합니다.
    fn remove_inputs(&mut self, service: &str) -> impl Future<Output = Result<(), PipelineError>> + Send;
}

/// 파일 이름에서 서비스 이름을 추출합니다.
///
/// `input.config-hdfs.json` → `hdfs`
pub fn service_name(file_name: &str) -> Option<&str> {
    file_name
        .strip_prefix(INPUT_CONFIG_PREFIX)?
        .strip_suffix(INPUT_CONFIG_SUFFIX)
        .filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: Option<SystemTime>,
    len: u64,
}

/// 한 번의 폴링 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// 적용된 서비스 이름
    pub loaded: Vec<String>,
    /// 제거된 서비스 이름
    pub removed: Vec<String>,
    /// 파싱 또는 적용에 실패한 파일 수
    pub failed: usize,
}

impl PollSummary {
    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty() && self.removed.is_empty() && self.failed == 0
    }
}

/// 디렉토리 기반 input 설정 소스
#[derive(Debug)]
pub struct DirectoryInputConfigSource {
    dir: PathBuf,
    known: BTreeMap<String, FileStamp>,
}

impl DirectoryInputConfigSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            known: BTreeMap::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 현재 알고 있는 서비스 이름 (정렬됨)
    pub fn services(&self) -> Vec<&str> {
        self.known.keys().map(String::as_str).collect()
    }

    /// 디렉토리의 모든 설정 파일을 처음으로 적용합니다.
    pub async fn load_all<M: InputConfigMonitor>(&mut self, monitor: &mut M) -> Result<PollSummary, PipelineError> {
        let summary = self.poll_changes(monitor).await?;
        info!(
            dir = %self.dir.display(),
            services = summary.loaded.len(),
            failed = summary.failed,
            "input configs loaded"
        );
        Ok(summary)
    }

    /// 마지막 확인 이후 바뀐 파일만 적용하고, 사라진 서비스는 제거합니다.
    pub async fn poll_changes<M: InputConfigMonitor>(
        &mut self,
        monitor: &mut M,
    ) -> Result<PollSummary, PipelineError> {
        let current = self.scan().await?;
        let mut summary = PollSummary::default();

        let removed: Vec<String> = self
            .known
            .keys()
            .filter(|service| !current.contains_key(*service))
            .cloned()
            .collect();
        for service in removed {
            info!(service = %service, "input config removed");
            self.known.remove(&service);
            monitor.remove_inputs(&service).await?;
            summary.removed.push(service);
        }

        for (service, (path, stamp)) in current {
            if self.known.get(&service) == Some(&stamp) {
                continue;
            }
            self.known.insert(service.clone(), stamp);

            let config = match read_input_config(&path).await {
                Ok(config) => config,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable input config");
                    summary.failed += 1;
                    continue;
                }
            };
            match monitor.load_input_configs(&service, config).await {
                Ok(()) => summary.loaded.push(service),
                Err(e) => {
                    warn!(service = %service, error = %e, "input config not applied");
                    summary.failed += 1;
                }
            }
        }

        if !summary.is_empty() {
            debug!(
                loaded = summary.loaded.len(),
                removed = summary.removed.len(),
                failed = summary.failed,
                "input config poll"
            );
        }
        Ok(summary)
    }

    async fn scan(&self) -> Result<BTreeMap<String, (PathBuf, FileStamp)>, PipelineError> {
        let mut found = BTreeMap::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(dir = %self.dir.display(), "input config directory does not exist");
                return Ok(found);
            }
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(service) = file_name.to_str().and_then(service_name) else {
                continue;
            };
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let stamp = FileStamp {
                modified: metadata.modified().ok(),
                len: metadata.len(),
            };
            found.insert(service.to_owned(), (entry.path(), stamp));
        }
        Ok(found)
    }
}

async fn read_input_config(path: &Path) -> Result<InputConfig, PipelineError> {
    let location = path.display().to_string();
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| PipelineError::Load {
            location: location.clone(),
            reason: e.to_string(),
        })?;
    InputConfig::parse(&location, &text)
}
