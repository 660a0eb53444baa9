//! 시뮬레이션 -- 부하 테스트용 가짜 input 생성
//!
//! [`SimulationGenerator`]는 `simulate` input 디스크립터 N개로 이루어진
//! input 설정을 만듭니다. 시뮬레이션 모드에서 이후 도착하는 서비스 설정은
//! 파이프라인으로 빌드되지 않고 [`SimulationCatalog`]에 로그 타입 샘플로만 기록됩니다.

use std::sync::{Arc, PoisonError, RwLock};

use crate::descriptor::{InputConfig, InputDescriptor};

/// 시뮬레이션 서비스 이름
pub const SIMULATION_SERVICE: &str = "Simulation";

/// 시뮬레이션 input 별칭
pub const SIMULATE_SOURCE: &str = "simulate";

/// 시뮬레이션 input의 rowtype
pub const SIMULATE_ROWTYPE: &str = "service";

/// 카탈로그가 비어 있을 때 사용하는 로그 타입
pub const DEFAULT_SIMULATED_TYPE: &str = "simulated";

/// 시뮬레이션 input 설정 생성기
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulationGenerator;

impl SimulationGenerator {
    /// `count`개의 `simulate` input을 가진 설정을 만듭니다. filter는 없습니다.
    pub fn generate(count: usize) -> InputConfig {
        let input = (0..count)
            .map(|_| InputDescriptor {
                source: Some(SIMULATE_SOURCE.to_owned()),
                rowtype: Some(SIMULATE_ROWTYPE.to_owned()),
                ..InputDescriptor::default()
            })
            .collect();
        InputConfig {
            input,
            filter: Vec::new(),
        }
    }
}

/// 시뮬레이션 input이 순환하며 사용하는 로그 타입 목록
///
/// 복제 시 같은 목록을 공유합니다.
#[derive(Debug, Clone, Default)]
pub struct SimulationCatalog {
    log_types: Arc<RwLock<Vec<String>>>,
}

impl SimulationCatalog {
    /// 설정에 포함된 input의 로그 타입을 중복 없이 추가합니다. 추가된 수를 반환합니다.
    pub fn record_log_types(&self, config: &InputConfig) -> usize {
        let mut log_types = self.log_types.write().unwrap_or_else(PoisonError::into_inner);
        let mut added = 0;
        for log_type in config.input.iter().filter_map(|d| d.log_type.as_deref()) {
            if !log_types.iter().any(|t| t == log_type) {
                log_types.push(log_type.to_owned());
                added += 1;
            }
        }
        added
    }

    /// 기록된 로그 타입 목록
    pub fn log_types(&self) -> Vec<String> {
        self.log_types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// `sequence`번째 레코드에 사용할 로그 타입
    pub fn pick(&self, sequence: u64) -> String {
        let log_types = self.log_types.read().unwrap_or_else(PoisonError::into_inner);
        if log_types.is_empty() {
            return DEFAULT_SIMULATED_TYPE.to_owned();
        }
        let index = (sequence % log_types.len() as u64) as usize;
        log_types[index].clone()
    }

    pub fn len(&self) -> usize {
        self.log_types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
