//! 파일 input
//!
//! 로그 파일을 줄 단위로 읽어 체인으로 보냅니다. 읽은 위치는 close 시
//! 체크포인트로 저장되고, 다음 시작 시 그 위치부터 이어 읽습니다.
//!
//! # 옵션
//! - `path` (필수): 로그 파일 경로
//! - `tail`: true면 EOF 이후에도 파일을 폴링합니다 (기본 false)
//! - `poll_interval_ms`: tail 폴링 주기 (기본 1000)

use std::borrow::Cow;
use std::io::SeekFrom;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use logfeeder_core::types::Record;

use crate::checkpoint::CheckpointStore;
use crate::descriptor::InputDescriptor;
use crate::error::PipelineError;
use crate::stage::{BoxFuture, Chain, Input, StageCounter, StageKind};

const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// 파일 input
#[derive(Debug)]
pub struct FileInput {
    descriptor: InputDescriptor,
    path: PathBuf,
    tail: bool,
    poll_interval: Duration,
    checkpoints: CheckpointStore,
    offset: AtomicU64,
    started: AtomicBool,
    read: StageCounter,
}

impl FileInput {
    pub fn new(checkpoint_dir: impl Into<PathBuf>) -> Self {
        Self {
            descriptor: InputDescriptor::default(),
            path: PathBuf::new(),
            tail: false,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            checkpoints: CheckpointStore::new(checkpoint_dir),
            offset: AtomicU64::new(0),
            started: AtomicBool::new(false),
            read: StageCounter::new("read"),
        }
    }

    /// 현재까지 읽은 바이트 오프셋
    pub fn offset(&self) -> u64 {
        self.offset.load(Ordering::Relaxed)
    }

    /// EOF까지 읽습니다. 취소되면 `false`를 반환합니다.
    async fn read_to_end(
        &self,
        chain: &mut Chain,
        cancel: &CancellationToken,
    ) -> Result<bool, PipelineError> {
        let file = match tokio::fs::File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && self.tail => {
                debug!(path = %self.path.display(), "log file not found yet");
                return Ok(true);
            }
            Err(e) => return Err(e.into()),
        };

        let mut offset = self.offset();
        let len = file.metadata().await?.len();
        if len < offset {
            info!(path = %self.path.display(), offset, len, "log file truncated, reading from start");
            offset = 0;
        }

        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(offset)).await?;

        let mut line = Vec::new();
        loop {
            line.clear();
            let n = tokio::select! {
                _ = cancel.cancelled() => return Ok(false),
                n = reader.read_until(b'\n', &mut line) => n?,
            };
            if n == 0 {
                break;
            }
            // tail 모드에서는 개행 없는 마지막 줄을 다음 폴링까지 남겨 둔다.
            if self.tail && line.last() != Some(&b'\n') {
                break;
            }

            offset += n as u64;
            self.offset.store(offset, Ordering::Relaxed);

            let decoded = String::from_utf8_lossy(&line);
            if let Cow::Owned(_) = decoded {
                warn!(path = %self.path.display(), offset, "invalid UTF-8 in log line, replaced");
            }
            let text = decoded.trim_end_matches(['\r', '\n']);
            if text.is_empty() {
                continue;
            }
            let mut record = Record::new(text);
            self.prepare(&mut record);
            self.read.increment();
            chain.process(record);
        }
        self.offset.store(offset, Ordering::Relaxed);
        Ok(true)
    }
}

impl Input for FileInput {
    fn load_config(&mut self, descriptor: &InputDescriptor) -> Result<(), PipelineError> {
        let path = descriptor
            .path
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| PipelineError::validation(StageKind::Input, "path", "required"))?;

        self.descriptor = descriptor.clone();
        self.path = PathBuf::from(path);
        self.tail = descriptor.option_bool("tail").unwrap_or(false);
        if let Some(ms) = descriptor.option_u64("poll_interval_ms") {
            self.poll_interval = Duration::from_millis(ms.max(1));
        }
        Ok(())
    }

    fn descriptor(&self) -> &InputDescriptor {
        &self.descriptor
    }

    fn short_description(&self) -> String {
        format!("input:source=file path={}", self.path.display())
    }

    fn records_read(&self) -> &StageCounter {
        &self.read
    }

    fn read<'a>(
        &'a self,
        chain: &'a mut Chain,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<(), PipelineError>> {
        Box::pin(async move {
            if let Some(checkpoint) = self.checkpoints.load(&self.path).await {
                debug!(path = %self.path.display(), offset = checkpoint.offset, "resuming from checkpoint");
                self.offset.store(checkpoint.offset, Ordering::Relaxed);
            }
            self.started.store(true, Ordering::Relaxed);

            loop {
                if !self.read_to_end(chain, &cancel).await? || !self.tail {
                    return Ok(());
                }
                tokio::select! {
                    _ = cancel.cancelled() => return Ok(()),
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
            }
        })
    }

    fn clean_checkpoints(&self) {
        match self.checkpoints.remove_stale() {
            Ok(0) => {}
            Ok(removed) => info!(dir = %self.checkpoints.dir().display(), removed, "cleaned checkpoints"),
            Err(e) => warn!(dir = %self.checkpoints.dir().display(), error = %e, "checkpoint cleanup failed"),
        }
    }

    fn close(&self) {
        if !self.started.load(Ordering::Relaxed) {
            return;
        }
        if let Err(e) = self.checkpoints.save(&self.path, self.offset()) {
            warn!(path = %self.path.display(), error = %e, "failed to save checkpoint");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured(checkpoint_dir: &std::path::Path, path: &std::path::Path) -> FileInput {
        let mut descriptor = InputDescriptor::with_source("file");
        descriptor.path = Some(path.to_string_lossy().into_owned());
        descriptor.log_type = Some("app".to_owned());
        let mut input = FileInput::new(checkpoint_dir);
        input.load_config(&descriptor).unwrap();
        input
    }

    #[test]
    fn path_is_required() {
        let mut input = FileInput::new("/tmp/cp");
        let err = input
            .load_config(&InputDescriptor::with_source("file"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Validation { ref field, .. } if field == "path"));
    }

    #[tokio::test]
    async fn reads_lines_and_resumes_from_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("app.log");
        std::fs::write(&log, "first\n\nsecond\nthird").unwrap();
        let cp_dir = dir.path().join("cp");

        let input = configured(&cp_dir, &log);
        let mut chain = Chain::new("app");
        input.read(&mut chain, CancellationToken::new()).await.unwrap();
        assert_eq!(input.records_read().total(), 3);
        assert_eq!(input.offset(), 19);
        input.close();

        std::fs::write(&log, "first\n\nsecond\nthird\nfourth\n").unwrap();
        let resumed = configured(&cp_dir, &log);
        resumed.read(&mut chain, CancellationToken::new()).await.unwrap();
        assert_eq!(resumed.records_read().total(), 1);
    }

    #[tokio::test]
    async fn invalid_utf8_line_does_not_stop_reading() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("mixed.log");
        let content: &[u8] = b"good1\n\xff\xfe bad\ngood2\n";
        std::fs::write(&log, content).unwrap();

        let input = configured(&dir.path().join("cp"), &log);
        let mut chain = Chain::new("app");
        input.read(&mut chain, CancellationToken::new()).await.unwrap();

        assert_eq!(input.records_read().total(), 3);
        assert_eq!(input.offset(), content.len() as u64);
    }

    #[tokio::test]
    async fn missing_file_is_error_without_tail() {
        let dir = tempfile::tempdir().unwrap();
        let input = configured(dir.path(), &dir.path().join("absent.log"));
        let mut chain = Chain::new("app");
        let result = input.read(&mut chain, CancellationToken::new()).await;
        assert!(matches!(result, Err(PipelineError::Io(_))));
    }

    #[tokio::test]
    async fn tail_mode_stops_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("tail.log");
        std::fs::write(&log, "a\nb\n").unwrap();

        let mut descriptor = InputDescriptor::with_source("file");
        descriptor.path = Some(log.to_string_lossy().into_owned());
        descriptor
            .options
            .insert("tail".to_owned(), serde_json::Value::Bool(true));
        descriptor
            .options
            .insert("poll_interval_ms".to_owned(), serde_json::Value::from(10));
        let mut input = FileInput::new(dir.path().join("cp"));
        input.load_config(&descriptor).unwrap();

        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            stopper.cancel();
        });

        let mut chain = Chain::new("app");
        input.read(&mut chain, cancel).await.unwrap();
        assert_eq!(input.records_read().total(), 2);
    }

    #[test]
    fn close_before_start_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cp_dir = dir.path().join("cp");
        let input = configured(&cp_dir, &dir.path().join("app.log"));
        input.close();
        assert!(!cp_dir.exists());
    }
}
