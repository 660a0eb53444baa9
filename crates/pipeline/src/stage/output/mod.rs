//! 기본 제공 output 구현

pub mod dev_null;
pub mod stdout;

use crate::descriptor::OutputDescriptor;
use crate::stage::StageCounter;

pub use dev_null::DevNullOutput;
pub use stdout::StdoutOutput;

/// output 공통 상태 (병합된 설정, destination, 카운터)
#[derive(Debug)]
pub struct OutputBase {
    configs: OutputDescriptor,
    destination: String,
    written: StageCounter,
}

impl OutputBase {
    /// destination 이름으로 생성합니다.
    pub fn new(destination: &str) -> Self {
        Self {
            configs: OutputDescriptor::new(),
            destination: destination.to_owned(),
            written: StageCounter::new("written"),
        }
    }

    /// 병합된 설정을 저장합니다.
    pub fn load(&mut self, config: &OutputDescriptor) {
        self.configs = config.clone();
    }

    pub fn configs(&self) -> &OutputDescriptor {
        &self.configs
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn written(&self) -> &StageCounter {
        &self.written
    }
}
