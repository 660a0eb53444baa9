#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`loader`]: global/output 설정 문서 로딩 (파일 시스템 → 번들 리소스)
//! - [`merge`]: global 기본값을 output 설정에 병합
//! - [`descriptor`]: input/filter/output 디스크립터
//! - [`registry`]: 별칭 → 스테이지 팩토리 레지스트리
//! - [`builder`]: 디스크립터로 서비스 파이프라인 빌드
//! - [`manager`]: 서비스 → input/output 생명주기 관리
//! - [`simulate`]: 부하 테스트용 시뮬레이션 input 생성
//! - [`source`]: 서비스별 input 설정 디렉토리 감시
//! - [`assembler`]: 위 구성 요소를 묶는 조립기
//! - [`stage`]: 스테이지 trait과 기본 구현 (file, simulate, json, keyvalue, stdout, dev_null)
//! - [`checkpoint`]: 파일 input 읽기 위치 저장
//! - [`config`]: 조립기 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입

pub mod assembler;
pub mod builder;
pub mod checkpoint;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod loader;
pub mod manager;
pub mod merge;
pub mod registry;
pub mod simulate;
pub mod source;
pub mod stage;

// --- 주요 타입 re-export ---

// 조립기
pub use assembler::{InputPipeline, PipelineAssembler};
pub use builder::{BuildReport, PipelineBuilder};

// 설정
pub use config::{AssemblerConfig, AssemblerConfigBuilder};
pub use descriptor::{FilterDescriptor, InputConfig, InputDescriptor, OutputDescriptor};
pub use loader::{BundledResources, ConfigLoader, LoadedConfig};

// 에러
pub use error::PipelineError;

// 생명주기
pub use manager::LifecycleManager;

// 레지스트리와 스테이지
pub use registry::StageRegistry;
pub use stage::{Chain, Filter, Input, Output, OutputHandle, StageContext, StageKind};

// 시뮬레이션
pub use simulate::{SimulationCatalog, SimulationGenerator};

// 설정 소스
pub use source::{DirectoryInputConfigSource, InputConfigMonitor};
