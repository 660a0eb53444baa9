//! 표준 출력 output
//!
//! 레코드를 JSON 한 줄로 stdout에 씁니다.

use std::io::Write;

use logfeeder_core::types::Record;

use super::OutputBase;
use crate::descriptor::OutputDescriptor;
use crate::error::PipelineError;
use crate::stage::{Output, StageCounter};

/// stdout output
#[derive(Debug)]
pub struct StdoutOutput {
    base: OutputBase,
}

impl Default for StdoutOutput {
    fn default() -> Self {
        Self {
            base: OutputBase::new("stdout"),
        }
    }
}

impl Output for StdoutOutput {
    fn load_config(&mut self, config: &OutputDescriptor) -> Result<(), PipelineError> {
        self.base.load(config);
        Ok(())
    }

    fn configs(&self) -> &OutputDescriptor {
        self.base.configs()
    }

    fn destination(&self) -> &str {
        self.base.destination()
    }

    fn write(&self, record: &Record) -> Result<(), PipelineError> {
        let line = record.to_json_line()?;
        let mut out = std::io::stdout().lock();
        writeln!(out, "{line}")?;
        Ok(())
    }

    fn records_written(&self) -> &StageCounter {
        self.base.written()
    }

    fn flush(&self) -> Result<(), PipelineError> {
        std::io::stdout().lock().flush()?;
        Ok(())
    }
}
