//! 시뮬레이션 input
//!
//! 카탈로그의 로그 타입을 순환하며 가짜 로그 라인을 만듭니다.
//!
//! # 옵션
//! - `sleep_ms`: 레코드 사이 대기 시간 (기본 100)
//! - `log_count`: 생성할 레코드 수 (없으면 취소될 때까지)

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use logfeeder_core::types::Record;

use crate::descriptor::InputDescriptor;
use crate::error::PipelineError;
use crate::simulate::SimulationCatalog;
use crate::stage::{BoxFuture, Chain, Input, StageCounter};

const DEFAULT_SLEEP_MS: u64 = 100;

/// 시뮬레이션 input
#[derive(Debug)]
pub struct SimulateInput {
    descriptor: InputDescriptor,
    catalog: SimulationCatalog,
    interval: Duration,
    log_count: Option<u64>,
    read: StageCounter,
}

impl SimulateInput {
    pub fn new(catalog: SimulationCatalog) -> Self {
        Self {
            descriptor: InputDescriptor::default(),
            catalog,
            interval: Duration::from_millis(DEFAULT_SLEEP_MS),
            log_count: None,
            read: StageCounter::new("read"),
        }
    }

    fn next_record(&self, sequence: u64) -> Record {
        let log_type = self.catalog.pick(sequence);
        let mut record = Record::new(format!("{log_type} simulated log entry #{sequence}"));
        self.prepare(&mut record);
        record.insert("type", log_type);
        record
    }
}

impl Input for SimulateInput {
    fn load_config(&mut self, descriptor: &InputDescriptor) -> Result<(), PipelineError> {
        self.descriptor = descriptor.clone();
        if let Some(ms) = descriptor.option_u64("sleep_ms") {
            self.interval = Duration::from_millis(ms);
        }
        self.log_count = descriptor.option_u64("log_count");
        Ok(())
    }

    fn descriptor(&self) -> &InputDescriptor {
        &self.descriptor
    }

    fn short_description(&self) -> String {
        "input:source=simulate".to_owned()
    }

    fn records_read(&self) -> &StageCounter {
        &self.read
    }

    fn requires_filters(&self) -> bool {
        false
    }

    fn wants_dedicated_outputs(&self) -> bool {
        true
    }

    fn read<'a>(
        &'a self,
        chain: &'a mut Chain,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<(), PipelineError>> {
        Box::pin(async move {
            let mut sequence = 0u64;
            while self.log_count.is_none_or(|limit| sequence < limit) {
                if cancel.is_cancelled() {
                    break;
                }
                let record = self.next_record(sequence);
                self.read.increment();
                chain.process(record);
                sequence += 1;

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.interval) => {}
                }
            }
            debug!(service = chain.service(), generated = sequence, "simulation stopped");
            Ok(())
        })
    }
}
