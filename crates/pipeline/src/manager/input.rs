//! input 관리자
//!
//! 서비스 이름별로 input과 그 체인을 소유합니다. input은 다음 상태를 거칩니다.
//!
//! ```text
//! Pending(chain) --start--> Running(task) --wait--> Finished
//!        \                      |                     |
//!         +------------------ close -----------------+--> Closed
//! ```
//!
//! 종료 시 취소 토큰을 보낸 뒤 설정된 시간만큼 태스크를 기다리고,
//! 시간 안에 끝나지 않으면 태스크를 중단합니다. `Input::close`는 정확히 한 번 호출됩니다.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use logfeeder_core::metrics as m;
use logfeeder_core::types::MetricData;

use crate::stage::{Chain, Input};

enum InputState {
    Pending(Chain),
    Running(JoinHandle<()>),
    Finished,
    Closed,
}

/// 관리 대상 input
pub struct ManagedInput {
    id: Uuid,
    input: Arc<dyn Input>,
    cancel: CancellationToken,
    state: InputState,
}

impl ManagedInput {
    fn new(service: &str, input: Arc<dyn Input>) -> Self {
        Self {
            id: Uuid::new_v4(),
            input,
            cancel: CancellationToken::new(),
            state: InputState::Pending(Chain::new(service)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn input(&self) -> &Arc<dyn Input> {
        &self.input
    }

    /// 시작 전 체인
    pub fn chain(&self) -> Option<&Chain> {
        match &self.state {
            InputState::Pending(chain) => Some(chain),
            _ => None,
        }
    }

    /// 시작 전 체인 (빌드용)
    pub fn chain_mut(&mut self) -> Option<&mut Chain> {
        match &mut self.state {
            InputState::Pending(chain) => Some(chain),
            _ => None,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, InputState::Running(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, InputState::Closed)
    }

    /// 취소 후 태스크 종료를 기다리고 input을 닫습니다.
    async fn shutdown(&mut self, timeout: Duration) {
        self.cancel.cancel();
        match std::mem::replace(&mut self.state, InputState::Closed) {
            InputState::Closed => return,
            InputState::Running(handle) => {
                join_with_timeout(handle, timeout, &self.input.short_description()).await;
            }
            InputState::Pending(_) | InputState::Finished => {}
        }
        self.input.close();
    }
}

/// 태스크가 끝날 때까지 기다립니다. 시간이 넘으면 중단시키고 실제로 끝날 때까지 기다립니다.
async fn join_with_timeout(mut handle: JoinHandle<()>, timeout: Duration, stage: &str) {
    match tokio::time::timeout(timeout, &mut handle).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(stage, error = %e, "input task panicked or was aborted"),
        Err(_) => {
            warn!(stage, timeout_secs = timeout.as_secs(), "input did not stop in time, aborting");
            handle.abort();
            if let Err(e) = handle.await {
                debug!(stage, error = %e, "aborted input task finished");
            }
        }
    }
}

/// 서비스별 input 관리자
pub struct InputManager {
    services: BTreeMap<String, Vec<ManagedInput>>,
    shutdown_timeout: Duration,
    closed: bool,
}

impl InputManager {
    pub fn new(shutdown_timeout: Duration) -> Self {
        Self {
            services: BTreeMap::new(),
            shutdown_timeout,
            closed: false,
        }
    }

    /// input을 서비스에 등록합니다. 체인은 비어 있는 상태로 시작합니다.
    pub fn add(&mut self, service: &str, input: Arc<dyn Input>) -> Uuid {
        let managed = ManagedInput::new(service, input);
        let id = managed.id;
        self.services
            .entry(service.to_owned())
            .or_default()
            .push(managed);
        id
    }

    /// 서비스의 input 목록 (등록 순서)
    pub fn inputs(&self, service: &str) -> &[ManagedInput] {
        self.services.get(service).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn inputs_mut(&mut self, service: &str) -> &mut [ManagedInput] {
        self.services
            .get_mut(service)
            .map(Vec::as_mut_slice)
            .unwrap_or_default()
    }

    /// 등록된 서비스 이름 (정렬됨)
    pub fn service_names(&self) -> Vec<&str> {
        self.services.keys().map(String::as_str).collect()
    }

    pub fn contains_service(&self, service: &str) -> bool {
        self.services.contains_key(service)
    }

    pub fn input_count(&self, service: &str) -> usize {
        self.inputs(service).len()
    }

    pub fn total_inputs(&self) -> usize {
        self.services.values().map(Vec::len).sum()
    }

    /// 서비스에서 input을 떼어냅니다. 종료 처리는 호출자 책임입니다.
    pub fn detach(&mut self, service: &str, id: Uuid) -> Option<ManagedInput> {
        let inputs = self.services.get_mut(service)?;
        let index = inputs.iter().position(|m| m.id == id)?;
        let managed = inputs.remove(index);
        if inputs.is_empty() {
            self.services.remove(service);
        }
        Some(managed)
    }

    /// 시작 전 input과 체인을 모두 떼어냅니다.
    pub fn take_pending(&mut self, service: &str) -> Vec<(Arc<dyn Input>, Chain)> {
        let Some(inputs) = self.services.remove(service) else {
            return Vec::new();
        };
        let mut pending = Vec::new();
        for managed in inputs {
            match managed.state {
                InputState::Pending(chain) => pending.push((managed.input, chain)),
                state => {
                    // 이미 시작된 input은 되돌려 놓는다.
                    self.services.entry(service.to_owned()).or_default().push(ManagedInput {
                        state,
                        ..managed
                    });
                }
            }
        }
        pending
    }

    /// input 하나를 멈추고 닫은 뒤 제거합니다.
    pub async fn remove(&mut self, service: &str, id: Uuid) -> bool {
        let Some(mut managed) = self.detach(service, id) else {
            return false;
        };
        managed.shutdown(self.shutdown_timeout).await;
        true
    }

    /// 서비스의 모든 input을 멈추고 닫은 뒤 제거합니다.
    pub async fn remove_all(&mut self, service: &str) -> usize {
        let Some(mut inputs) = self.services.remove(service) else {
            return 0;
        };
        for managed in &mut inputs {
            managed.shutdown(self.shutdown_timeout).await;
        }
        info!(service, count = inputs.len(), "inputs removed");
        inputs.len()
    }

    /// 서비스의 시작 전 input마다 tokio 태스크를 하나씩 띄웁니다.
    pub fn start(&mut self, service: &str) -> usize {
        let Some(inputs) = self.services.get_mut(service) else {
            return 0;
        };

        let mut started = 0;
        for managed in inputs.iter_mut() {
            let mut chain = match std::mem::replace(&mut managed.state, InputState::Finished) {
                InputState::Pending(chain) => chain,
                other => {
                    managed.state = other;
                    continue;
                }
            };

            let input = Arc::clone(&managed.input);
            let cancel = managed.cancel.clone();
            let handle = tokio::spawn(async move {
                metrics::gauge!(m::INPUT_ACTIVE).increment(1.0);
                let result = input.read(&mut chain, cancel).await;
                if let Err(e) = result {
                    error!(
                        service = chain.service(),
                        stage = %input.short_description(),
                        error = %e,
                        "input stopped with error"
                    );
                }
                metrics::gauge!(m::INPUT_ACTIVE).decrement(1.0);
                debug!(service = chain.service(), stage = %input.short_description(), "input finished");
            });
            managed.state = InputState::Running(handle);
            started += 1;
        }
        info!(service, started, "inputs started");
        started
    }

    /// 실행 중인 모든 input 태스크가 스스로 끝날 때까지 기다립니다.
    pub async fn wait_on_all_inputs(&mut self) {
        for (service, inputs) in &mut self.services {
            for managed in inputs.iter_mut() {
                let state = std::mem::replace(&mut managed.state, InputState::Finished);
                match state {
                    InputState::Running(handle) => {
                        if let Err(e) = handle.await {
                            warn!(service = %service, error = %e, "input task panicked");
                        }
                    }
                    other => managed.state = other,
                }
            }
        }
    }

    /// 모든 input의 체크포인트 정리를 요청합니다.
    pub fn clean_checkpoints(&self) {
        for managed in self.services.values().flatten() {
            managed.input.clean_checkpoints();
        }
    }

    /// 마지막 호출 이후 읽은 레코드 수를 로그에 남깁니다.
    pub fn log_stats(&self) {
        for (service, inputs) in &self.services {
            for managed in inputs {
                let counter = managed.input.records_read();
                info!(
                    service = %service,
                    stage = %managed.input.short_description(),
                    read = counter.take_delta(),
                    total = counter.total(),
                    "input stats"
                );
            }
        }
    }

    /// input 누적 카운터 스냅샷을 추가합니다.
    pub fn collect_metrics(&self, metrics: &mut Vec<MetricData>) {
        for (service, inputs) in &self.services {
            for managed in inputs {
                metrics.push(MetricData::counter(
                    m::INPUT_RECORDS_READ_TOTAL,
                    format!("{service}/{}", managed.input.short_description()),
                    managed.input.records_read().total(),
                ));
            }
        }
    }

    /// 모든 input을 멈추고 닫습니다. 두 번째 호출부터는 아무것도 하지 않습니다.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        for managed in self.services.values_mut().flatten() {
            managed.cancel.cancel();
        }
        let timeout = self.shutdown_timeout;
        for managed in self.services.values_mut().flatten() {
            managed.shutdown(timeout).await;
        }
        info!(count = self.total_inputs(), "inputs closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl std::fmt::Debug for InputManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: BTreeMap<&str, usize> = self
            .services
            .iter()
            .map(|(service, inputs)| (service.as_str(), inputs.len()))
            .collect();
        f.debug_struct("InputManager")
            .field("services", &counts)
            .field("closed", &self.closed)
            .finish()
    }
}
