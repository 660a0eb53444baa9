//! 스테이지 계약 -- input, filter, output trait
//!
//! 레지스트리가 별칭으로 구현체를 만들고, 빌더가 디스크립터로 설정한 뒤
//! 생명주기 관리자가 시작/종료합니다.
//!
//! # 실행 모델
//!
//! input 하나당 tokio 태스크 하나가 [`Input::read`]를 실행합니다.
//! input은 레코드를 만들 때마다 [`Chain::process`]를 호출하고,
//! 체인은 정렬된 filter를 동기적으로 적용한 뒤 바인딩된 output에 씁니다.
//!
//! # dyn 호환성
//!
//! [`Input::read`]는 `BoxFuture`를 반환하여 `Box<dyn Input>`/`Arc<dyn Input>`으로
//! 보관할 수 있습니다.

pub mod chain;
pub mod filter;
pub mod input;
pub mod output;

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::Level;

use logfeeder_core::types::Record;

use crate::descriptor::{Conditions, FilterDescriptor, InputDescriptor, OutputDescriptor, option_bool};
use crate::error::PipelineError;
use crate::simulate::SimulationCatalog;

pub use chain::{Chain, ChainOutcome, FilterAction, OutputHandle};

/// dyn-compatible 비동기 반환 타입
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 스테이지 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    /// 로그 소스
    Input,
    /// 레코드 변환
    Filter,
    /// 레코드 싱크
    Output,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Filter => write!(f, "filter"),
            Self::Output => write!(f, "output"),
        }
    }
}

/// 스테이지 생성 시 팩토리에 전달되는 공유 컨텍스트
#[derive(Debug, Clone, Default)]
pub struct StageContext {
    /// 체크포인트 디렉토리
    pub checkpoint_dir: PathBuf,
    /// 시뮬레이션 로그 타입 카탈로그
    pub catalog: SimulationCatalog,
}

/// 스테이지 누적 카운터
///
/// 태스크 간 공유되므로 atomic으로 관리합니다.
/// [`take_delta`](Self::take_delta)는 마지막 호출 이후 증가분을 반환합니다.
#[derive(Debug)]
pub struct StageCounter {
    name: &'static str,
    total: AtomicU64,
    reported: AtomicU64,
}

impl StageCounter {
    /// 이름이 붙은 카운터를 생성합니다.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            total: AtomicU64::new(0),
            reported: AtomicU64::new(0),
        }
    }

    /// 카운터 이름
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 1 증가시킵니다.
    pub fn increment(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    /// 누적값
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// 마지막 호출 이후 증가분을 반환하고 기준점을 갱신합니다.
    pub fn take_delta(&self) -> u64 {
        let total = self.total();
        let previous = self.reported.swap(total, Ordering::Relaxed);
        total.saturating_sub(previous)
    }
}

/// 로그 소스
///
/// `load_config`는 `&mut self`로 한 번 호출되고, 이후 input은 `Arc`로 공유됩니다.
/// 나머지 메서드는 모두 `&self`입니다.
pub trait Input: Send + Sync {
    /// 디스크립터로 input을 설정합니다.
    fn load_config(&mut self, descriptor: &InputDescriptor) -> Result<(), PipelineError>;

    /// 설정에 사용된 디스크립터
    fn descriptor(&self) -> &InputDescriptor;

    /// 짧은 설명 (로그/메트릭 레이블용)
    fn short_description(&self) -> String;

    /// 읽은 레코드 카운터
    fn records_read(&self) -> &StageCounter;

    /// 레코드를 읽어 체인으로 흘려보냅니다. 취소되거나 소스가 끝나면 반환합니다.
    fn read<'a>(
        &'a self,
        chain: &'a mut Chain,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<(), PipelineError>>;

    /// 활성화 여부
    fn is_enabled(&self) -> bool {
        self.descriptor().is_enabled()
    }

    /// 설정을 주어진 레벨로 로그에 남깁니다.
    fn log_configs(&self, level: Level) {
        let config = serde_json::to_string(self.descriptor()).unwrap_or_default();
        log_stage_config(level, StageKind::Input, &self.short_description(), &config);
    }

    /// 이 filter가 이 input의 체인에 필요한지 판단합니다.
    ///
    /// 조건이 없으면 모든 input에 적용되고, 있으면 `type` 조건에
    /// 이 input의 로그 타입이 있어야 합니다.
    fn is_filter_required(&self, filter: &FilterDescriptor) -> bool {
        match &filter.conditions {
            None => true,
            Some(conditions) if conditions.is_empty() => true,
            Some(conditions) => conditions.allows("type", self.descriptor().log_type.as_deref()),
        }
    }

    /// 이 output이 이 input의 레코드를 받아야 하는지 판단합니다.
    ///
    /// output의 `rowtype` 조건에 이 input의 rowtype이 있어야 합니다.
    fn is_output_required(&self, output: &dyn Output) -> bool {
        Conditions::from_output(output.configs())
            .is_some_and(|c| c.allows("rowtype", self.descriptor().rowtype.as_deref()))
    }

    /// filter가 하나도 없으면 가지치기 대상인지 여부
    fn requires_filters(&self) -> bool {
        true
    }

    /// 공유 output 대신 전용 output 사본이 필요한지 여부
    fn wants_dedicated_outputs(&self) -> bool {
        false
    }

    /// 레코드에 input 메타데이터와 `add_fields`를 붙입니다.
    fn prepare(&self, record: &mut Record) {
        input::decorate(self.descriptor(), record);
    }

    /// 더 이상 필요 없는 체크포인트를 정리합니다.
    fn clean_checkpoints(&self) {}

    /// 자원을 해제합니다. 태스크 종료 후 정확히 한 번 호출됩니다.
    fn close(&self) {}
}

/// 레코드 변환 스테이지
pub trait Filter: Send + Sync {
    /// 디스크립터로 filter를 설정합니다.
    fn load_config(&mut self, descriptor: &FilterDescriptor) -> Result<(), PipelineError>;

    /// 짧은 설명
    fn short_description(&self) -> String;

    /// 레코드에 적용합니다.
    fn apply(&mut self, record: &mut Record) -> Result<FilterAction, PipelineError>;

    /// 설정을 로그에 남깁니다.
    fn log_configs(&self, level: Level) {
        log_stage_config(level, StageKind::Filter, &self.short_description(), "");
    }
}

/// 레코드 싱크
///
/// 여러 input이 같은 output을 공유하므로 `write`는 `&self`입니다.
pub trait Output: Send + Sync {
    /// 병합된 설정으로 output을 설정합니다.
    fn load_config(&mut self, config: &OutputDescriptor) -> Result<(), PipelineError>;

    /// 병합된 설정
    fn configs(&self) -> &OutputDescriptor;

    /// destination 별칭
    fn destination(&self) -> &str;

    /// 레코드를 씁니다.
    fn write(&self, record: &Record) -> Result<(), PipelineError>;

    /// 쓴 레코드 카운터
    fn records_written(&self) -> &StageCounter;

    /// 활성화 여부 (명시적인 false만 비활성)
    fn is_enabled(&self) -> bool {
        option_bool(self.configs(), "is_enabled").unwrap_or(true)
    }

    /// 짧은 설명
    fn short_description(&self) -> String {
        format!("output:destination={}", self.destination())
    }

    /// 설정을 로그에 남깁니다.
    fn log_configs(&self, level: Level) {
        let config = serde_json::to_string(self.configs()).unwrap_or_default();
        log_stage_config(level, StageKind::Output, &self.short_description(), &config);
    }

    /// 버퍼를 비웁니다.
    fn flush(&self) -> Result<(), PipelineError> {
        Ok(())
    }

    /// 자원을 해제합니다.
    fn close(&self) -> Result<(), PipelineError> {
        self.flush()
    }
}

/// 스테이지 설정을 동적 레벨로 기록합니다.
pub fn log_stage_config(level: Level, kind: StageKind, description: &str, config: &str) {
    if level == Level::ERROR {
        tracing::error!(kind = %kind, stage = description, config, "stage configured");
    } else if level == Level::WARN {
        tracing::warn!(kind = %kind, stage = description, config, "stage configured");
    } else if level == Level::INFO {
        tracing::info!(kind = %kind, stage = description, config, "stage configured");
    } else if level == Level::DEBUG {
        tracing::debug!(kind = %kind, stage = description, config, "stage configured");
    } else {
        tracing::trace!(kind = %kind, stage = description, config, "stage configured");
    }
}
