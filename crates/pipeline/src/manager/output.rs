//! output 관리자
//!
//! 등록된 output 인스턴스를 보관합니다. 여러 input이 같은 인스턴스를
//! 공유하므로 id로 중복을 제거합니다.

use tracing::{debug, info, warn};

use logfeeder_core::metrics as m;
use logfeeder_core::types::MetricData;

use crate::stage::OutputHandle;

/// output 관리자
#[derive(Debug, Default)]
pub struct OutputManager {
    outputs: Vec<OutputHandle>,
    closed: bool,
}

impl OutputManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// output을 등록합니다. 이미 등록된 인스턴스는 무시합니다.
    pub fn add(&mut self, output: OutputHandle) {
        if self.outputs.iter().any(|o| o.id() == output.id()) {
            return;
        }
        debug!(alias = output.alias(), destination = output.stage().destination(), "output registered");
        self.outputs.push(output);
        metrics::gauge!(m::OUTPUT_REGISTERED).set(self.outputs.len() as f64);
    }

    /// 등록된 output 목록 (등록 순서)
    pub fn outputs(&self) -> &[OutputHandle] {
        &self.outputs
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// 마지막 호출 이후 쓴 레코드 수를 로그에 남깁니다.
    pub fn log_stats(&self) {
        for output in &self.outputs {
            let stage = output.stage();
            let delta = stage.records_written().take_delta();
            info!(
                stage = %stage.short_description(),
                written = delta,
                total = stage.records_written().total(),
                "output stats"
            );
        }
    }

    /// output 누적 카운터 스냅샷을 추가합니다.
    pub fn collect_metrics(&self, metrics: &mut Vec<MetricData>) {
        for output in &self.outputs {
            let stage = output.stage();
            metrics.push(MetricData::counter(
                m::OUTPUT_RECORDS_WRITTEN_TOTAL,
                stage.short_description(),
                stage.records_written().total(),
            ));
        }
    }

    /// 모든 output을 닫습니다. 두 번째 호출부터는 아무것도 하지 않습니다.
    ///
    /// 개별 output의 종료 에러는 기록만 하고 나머지 output을 계속 닫습니다.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        for output in &self.outputs {
            let stage = output.stage();
            if let Err(e) = stage.close() {
                warn!(destination = stage.destination(), error = %e, "output close failed");
            }
        }
        info!(count = self.outputs.len(), "outputs closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
