//! 레코드를 버리는 output (부하 측정용)

use logfeeder_core::types::Record;

use super::OutputBase;
use crate::descriptor::OutputDescriptor;
use crate::error::PipelineError;
use crate::stage::{Output, StageCounter};

/// dev_null output
#[derive(Debug)]
pub struct DevNullOutput {
    base: OutputBase,
}

impl Default for DevNullOutput {
    fn default() -> Self {
        Self {
            base: OutputBase::new("dev_null"),
        }
    }
}

impl Output for DevNullOutput {
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

    fn write(&self, _record: &Record) -> Result<(), PipelineError> {
        Ok(())
    }

    fn records_written(&self) -> &StageCounter {
        self.base.written()
    }
}
