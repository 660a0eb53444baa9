//! 서비스 생명주기 관리자
//!
//! [`LifecycleManager`]는 [`InputManager`]와 [`OutputManager`]를 묶어
//! 서비스 → 스테이지 매핑을 단독으로 소유합니다.

pub mod input;
pub mod output;

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use logfeeder_core::types::MetricData;

use crate::stage::Input;

pub use input::{InputManager, ManagedInput};
pub use output::OutputManager;

/// 서비스 생명주기 관리자
#[derive(Debug)]
pub struct LifecycleManager {
    inputs: InputManager,
    outputs: OutputManager,
}

impl LifecycleManager {
    /// input 종료 대기 시간을 지정하여 생성합니다.
    pub fn new(shutdown_timeout: Duration) -> Self {
        Self {
            inputs: InputManager::new(shutdown_timeout),
            outputs: OutputManager::new(),
        }
    }

    pub fn inputs(&self) -> &InputManager {
        &self.inputs
    }

    pub fn inputs_mut(&mut self) -> &mut InputManager {
        &mut self.inputs
    }

    pub fn outputs(&self) -> &OutputManager {
        &self.outputs
    }

    pub fn outputs_mut(&mut self) -> &mut OutputManager {
        &mut self.outputs
    }

    /// input을 서비스에 등록합니다.
    pub fn add(&mut self, service: &str, input: Arc<dyn Input>) -> Uuid {
        self.inputs.add(service, input)
    }

    /// input 하나를 멈추고 제거합니다.
    pub async fn remove(&mut self, service: &str, id: Uuid) -> bool {
        self.inputs.remove(service, id).await
    }

    /// 서비스의 모든 input을 멈추고 제거합니다.
    pub async fn remove_all(&mut self, service: &str) -> usize {
        self.inputs.remove_all(service).await
    }

    /// 서비스의 input을 시작합니다.
    pub fn start(&mut self, service: &str) -> usize {
        self.inputs.start(service)
    }

    pub fn clean_checkpoints(&self) {
        self.inputs.clean_checkpoints();
    }

    pub fn log_stats(&self) {
        self.inputs.log_stats();
        self.outputs.log_stats();
    }

    /// 모든 스테이지의 누적 카운터 스냅샷을 추가합니다.
    pub fn collect_metrics(&self, metrics: &mut Vec<MetricData>) {
        self.inputs.collect_metrics(metrics);
        self.outputs.collect_metrics(metrics);
    }

    pub async fn wait_on_all_inputs(&mut self) {
        self.inputs.wait_on_all_inputs().await;
    }

    /// input을 모두 멈춘 뒤 output을 닫습니다. 여러 번 호출해도 안전합니다.
    pub async fn close_all(&mut self) {
        self.inputs.close().await;
        self.outputs.close();
    }

    pub fn is_closed(&self) -> bool {
        self.inputs.is_closed() && self.outputs.is_closed()
    }
}
