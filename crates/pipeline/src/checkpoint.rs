//! 파일 input 체크포인트
//!
//! 로그 파일별 읽기 오프셋을 체크포인트 디렉토리에 JSON 파일(`*.cp`)로 저장합니다.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::PipelineError;

const CHECKPOINT_EXTENSION: &str = "cp";
const MAX_PREFIX_LEN: usize = 64;

/// 저장된 읽기 위치
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// 로그 파일 경로
    pub path: String,
    /// 다음에 읽을 바이트 오프셋
    pub offset: u64,
    /// 저장 시각
    pub updated_at: DateTime<Utc>,
}

/// 체크포인트 디렉토리
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 로그 파일 경로에 대응하는 체크포인트 파일 경로
    ///
    /// 읽기 쉬운 접두어(경로 끝부분) 뒤에 전체 경로의 SHA-256 앞 16바이트를 붙여
    /// 서로 다른 경로가 같은 파일로 겹치지 않게 합니다.
    pub fn file_for(&self, log_path: &Path) -> PathBuf {
        let full = log_path.to_string_lossy();
        let sanitized: Vec<char> = full
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        let prefix: String = sanitized[sanitized.len().saturating_sub(MAX_PREFIX_LEN)..]
            .iter()
            .collect();

        let digest = Sha256::digest(full.as_bytes());
        let hash = hex::encode(&digest[..16]);
        self.dir.join(format!("{prefix}-{hash}.{CHECKPOINT_EXTENSION}"))
    }

    /// 체크포인트를 읽습니다. 없거나 손상된 경우 `None`입니다.
    pub async fn load(&self, log_path: &Path) -> Option<Checkpoint> {
        let file = self.file_for(log_path);
        let text = tokio::fs::read_to_string(&file).await.ok()?;
        match serde_json::from_str::<Checkpoint>(&text) {
            Ok(checkpoint) if Path::new(&checkpoint.path) == log_path => Some(checkpoint),
            Ok(checkpoint) => {
                warn!(
                    file = %file.display(),
                    expected = %log_path.display(),
                    found = %checkpoint.path,
                    "ignoring checkpoint recorded for another file"
                );
                None
            }
            Err(e) => {
                warn!(file = %file.display(), error = %e, "ignoring corrupt checkpoint");
                None
            }
        }
    }

    /// 체크포인트를 저장합니다. 임시 파일에 쓴 뒤 rename합니다.
    pub fn save(&self, log_path: &Path, offset: u64) -> Result<(), PipelineError> {
        std::fs::create_dir_all(&self.dir)?;
        let checkpoint = Checkpoint {
            path: log_path.to_string_lossy().into_owned(),
            offset,
            updated_at: Utc::now(),
        };
        let file = self.file_for(log_path);
        let tmp = file.with_extension("cp.tmp");
        std::fs::write(&tmp, serde_json::to_vec(&checkpoint)?)?;
        std::fs::rename(&tmp, &file)?;
        debug!(file = %file.display(), offset, "checkpoint saved");
        Ok(())
    }

    /// 로그 파일이 더 이상 존재하지 않는 체크포인트를 삭제합니다.
    pub fn remove_stale(&self) -> Result<usize, PipelineError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        for entry in entries {
            let file = entry?.path();
            if file.extension().and_then(|e| e.to_str()) != Some(CHECKPOINT_EXTENSION) {
                continue;
            }
            let stale = match std::fs::read_to_string(&file)
                .ok()
                .and_then(|text| serde_json::from_str::<Checkpoint>(&text).ok())
            {
                Some(checkpoint) => !Path::new(&checkpoint.path).exists(),
                None => true,
            };
            if stale {
                std::fs::remove_file(&file)?;
                info!(file = %file.display(), "removed stale checkpoint");
                removed += 1;
            }
        }
        Ok(removed)
    }
}
