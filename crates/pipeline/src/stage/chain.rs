//! 필터 체인과 output 핸들
//!
//! [`Chain`]은 input 하나에 속한 정렬된 filter 목록과 바인딩된 output 목록입니다.
//! input 태스크 안에서 동기적으로 실행되며, filter 에러나 output 쓰기 실패는
//! 해당 레코드만 포기하고 체인은 계속 동작합니다.

use std::fmt;
use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use logfeeder_core::metrics as m;
use logfeeder_core::types::Record;

use super::{Filter, Output};
use crate::error::PipelineError;

/// filter 적용 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterAction {
    /// 다음 filter로 진행
    Continue,
    /// 레코드 폐기
    Drop,
}

/// 레코드 한 건의 처리 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainOutcome {
    /// 주어진 수의 output에 전달됨
    Delivered(usize),
    /// filter가 폐기함
    Dropped,
    /// filter 에러로 폐기됨
    Failed,
}

/// 공유 output 핸들
///
/// 여러 input이 같은 output 인스턴스에 쓰므로 `Arc`로 공유합니다.
/// 중복 제거는 생성 시 부여되는 `id`로 합니다.
#[derive(Clone)]
pub struct OutputHandle {
    id: Uuid,
    alias: String,
    stage: Arc<dyn Output>,
}

impl OutputHandle {
    /// 설정이 끝난 output을 핸들로 감쌉니다. 별칭은 output의 `destination()`입니다.
    pub fn new(output: Box<dyn Output>) -> Self {
        let alias = output.destination().to_owned();
        Self::with_alias(output, alias)
    }

    /// 레지스트리에서 output을 찾을 때 쓴 별칭과 함께 감쌉니다.
    pub fn with_alias(output: Box<dyn Output>, alias: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            alias: alias.into(),
            stage: Arc::from(output),
        }
    }

    /// 인스턴스 식별자
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// output을 만든 레지스트리 별칭
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// output 스테이지
    pub fn stage(&self) -> &dyn Output {
        self.stage.as_ref()
    }
}

impl fmt::Debug for OutputHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputHandle")
            .field("id", &self.id)
            .field("alias", &self.alias)
            .field("destination", &self.stage.destination())
            .finish()
    }
}

/// input 하나의 처리 체인
#[derive(Default)]
pub struct Chain {
    service: String,
    filters: Vec<Box<dyn Filter>>,
    outputs: Vec<OutputHandle>,
}

impl Chain {
    /// 서비스 이름으로 빈 체인을 생성합니다.
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            filters: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// 소속 서비스 이름
    pub fn service(&self) -> &str {
        &self.service
    }

    /// filter를 체인 끝에 추가합니다.
    pub fn add_filter(&mut self, filter: Box<dyn Filter>) {
        self.filters.push(filter);
    }

    /// output을 바인딩합니다. 이미 바인딩된 인스턴스는 무시합니다.
    pub fn add_output(&mut self, output: OutputHandle) {
        if !self.outputs.iter().any(|o| o.id == output.id) {
            self.outputs.push(output);
        }
    }

    /// filter 수
    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    /// filter 설명 목록 (체인 순서)
    pub fn filter_descriptions(&self) -> Vec<String> {
        self.filters.iter().map(|f| f.short_description()).collect()
    }

    /// 바인딩된 output 목록
    pub fn outputs(&self) -> &[OutputHandle] {
        &self.outputs
    }

    /// filter만 순서대로 적용합니다. 폐기되면 `None`을 반환합니다.
    pub fn apply_filters(&mut self, mut record: Record) -> Result<Option<Record>, PipelineError> {
        for filter in &mut self.filters {
            if filter.apply(&mut record)? == FilterAction::Drop {
                return Ok(None);
            }
        }
        Ok(Some(record))
    }

    /// filter를 적용한 뒤 모든 output에 씁니다.
    pub fn process(&mut self, record: Record) -> ChainOutcome {
        metrics::counter!(m::INPUT_RECORDS_READ_TOTAL, m::LABEL_SERVICE => self.service.clone())
            .increment(1);

        let record = match self.apply_filters(record) {
            Ok(Some(record)) => record,
            Ok(None) => {
                metrics::counter!(
                    m::FILTER_RECORDS_DROPPED_TOTAL,
                    m::LABEL_SERVICE => self.service.clone()
                )
                .increment(1);
                return ChainOutcome::Dropped;
            }
            Err(e) => {
                warn!(service = %self.service, error = %e, "filter failed, record dropped");
                metrics::counter!(m::FILTER_ERRORS_TOTAL, m::LABEL_SERVICE => self.service.clone())
                    .increment(1);
                return ChainOutcome::Failed;
            }
        };

        let mut delivered = 0;
        for output in &self.outputs {
            let stage = output.stage();
            match stage.write(&record) {
                Ok(()) => {
                    stage.records_written().increment();
                    metrics::counter!(
                        m::OUTPUT_RECORDS_WRITTEN_TOTAL,
                        m::LABEL_DESTINATION => stage.destination().to_owned()
                    )
                    .increment(1);
                    delivered += 1;
                }
                Err(e) => {
                    warn!(
                        service = %self.service,
                        destination = stage.destination(),
                        error = %e,
                        "output write failed"
                    );
                    metrics::counter!(
                        m::OUTPUT_WRITE_ERRORS_TOTAL,
                        m::LABEL_DESTINATION => stage.destination().to_owned()
                    )
                    .increment(1);
                }
            }
        }
        ChainOutcome::Delivered(delivered)
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("service", &self.service)
            .field("filters", &self.filter_descriptions())
            .field("outputs", &self.outputs)
            .finish()
    }
}
