//! 파이프라인 조립기
//!
//! [`PipelineAssembler`]는 설정 문서 로딩, output 등록, 서비스별 파이프라인 빌드,
//! 시뮬레이션 모드 전환과 종료까지 한 번의 조립 주기를 책임집니다.
//!
//! # 사용 예시
//! ```ignore
//! use logfeeder_pipeline::{AssemblerConfig, PipelineAssembler};
//!
//! let mut assembler = PipelineAssembler::new(AssemblerConfig::default());
//! assembler.init().await?;
//! assembler.load_service("hdfs", input_config).await?;
//! // ...
//! assembler.close().await;
//! ```
//!
//! 조립기 자체는 동기화하지 않습니다. 여러 태스크에서 다시 로딩을 요청하는 경우
//! 소유자가 `tokio::sync::Mutex` 등으로 직렬화해야 합니다.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use logfeeder_core::types::{MetricData, Record};

use crate::builder::{BuildReport, PipelineBuilder};
use crate::checkpoint::CheckpointStore;
use crate::config::AssemblerConfig;
use crate::descriptor::{FilterDescriptor, InputConfig};
use crate::error::PipelineError;
use crate::loader::{BundledResources, ConfigLoader, LoadedConfig};
use crate::manager::LifecycleManager;
use crate::registry::StageRegistry;
use crate::simulate::{SIMULATION_SERVICE, SimulationCatalog, SimulationGenerator};
use crate::source::InputConfigMonitor;
use crate::stage::{Chain, Input, StageContext};

/// [`PipelineAssembler::test_input`]에서 사용하는 서비스 이름
pub const TEST_SERVICE: &str = "test";

/// 인라인 문서의 위치 표시
const INLINE_LOCATION: &str = "<inline>";

/// 파이프라인 조립기
pub struct PipelineAssembler {
    config: AssemblerConfig,
    registry: StageRegistry,
    loader: ConfigLoader,
    loaded: LoadedConfig,
    lifecycle: LifecycleManager,
    simulation_mode: bool,
    closed: bool,
}

impl PipelineAssembler {
    /// 기본 스테이지가 등록된 레지스트리로 조립기를 생성합니다.
    pub fn new(config: AssemblerConfig) -> Self {
        let context = StageContext {
            checkpoint_dir: config.checkpoint_dir.clone(),
            catalog: SimulationCatalog::default(),
        };
        Self::with_registry(config, StageRegistry::with_builtins(context))
    }

    /// 주어진 레지스트리로 조립기를 생성합니다.
    pub fn with_registry(config: AssemblerConfig, registry: StageRegistry) -> Self {
        let lifecycle = LifecycleManager::new(config.shutdown_timeout());
        Self {
            config,
            registry,
            loader: ConfigLoader::default(),
            loaded: LoadedConfig::default(),
            lifecycle,
            simulation_mode: false,
            closed: false,
        }
    }

    /// 설정 문서를 찾을 번들 리소스를 교체합니다.
    pub fn with_resources(mut self, resources: BundledResources) -> Self {
        self.loader = ConfigLoader::new(resources);
        self
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    pub fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    /// 시뮬레이션 로그 타입 카탈로그
    pub fn catalog(&self) -> &SimulationCatalog {
        &self.registry.context().catalog
    }

    pub fn is_simulation_mode(&self) -> bool {
        self.simulation_mode
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// 설정 문서를 읽고 output을 등록한 뒤, 필요하면 시뮬레이션 서비스를 시작합니다.
    ///
    /// 문서 하나라도 읽지 못하면 output 등록 전에 에러를 반환합니다.
    pub async fn init(&mut self) -> Result<(), PipelineError> {
        for source in self.config.config_sources() {
            self.loader.load_into(&mut self.loaded, &source).await?;
        }
        self.load_outputs();
        self.simulate_if_needed();
        Ok(())
    }

    /// 인라인 설정 문서 하나를 반영합니다. [`init`](Self::init) 전에 호출해야
    /// 문서의 output이 등록됩니다.
    pub fn load_configs(&mut self, text: &str) -> Result<(), PipelineError> {
        self.loaded.apply_document(INLINE_LOCATION, text)
    }

    /// 읽은 설정 문서 원문 (로딩 순서)
    pub fn global_config_jsons(&self) -> &[String] {
        &self.loaded.raw_documents
    }

    /// 병합된 global 설정
    pub fn global_configs(&self) -> &Map<String, Value> {
        &self.loaded.global
    }

    fn load_outputs(&mut self) {
        let registered = PipelineBuilder::new(&self.registry, &mut self.lifecycle)
            .load_outputs(&self.loaded.global, &self.loaded.outputs);
        info!(
            registered,
            declared = self.loaded.outputs.len(),
            "outputs loaded"
        );
    }

    fn simulate_if_needed(&mut self) {
        let count = self.config.simulate_input_number;
        if count == 0 {
            return;
        }
        let config = SimulationGenerator::generate(count);
        let report = PipelineBuilder::new(&self.registry, &mut self.lifecycle).build(
            SIMULATION_SERVICE,
            &config.input,
            &config.filter,
        );
        self.lifecycle.start(SIMULATION_SERVICE);
        self.simulation_mode = true;
        info!(inputs = report.inputs, "simulation mode enabled");
    }

    /// 서비스의 파이프라인을 다시 빌드하고 시작합니다.
    ///
    /// 기존 input은 먼저 멈추고 제거됩니다. 시뮬레이션 모드에서는 빌드하지 않고
    /// 로그 타입만 카탈로그에 기록하며 빈 보고서를 반환합니다.
    pub async fn load_service(
        &mut self,
        service: &str,
        config: &InputConfig,
    ) -> Result<BuildReport, PipelineError> {
        if self.closed {
            return Err(PipelineError::stage(service, "assembler already closed"));
        }
        if self.simulation_mode {
            let added = self.catalog().record_log_types(config);
            debug!(service, added, "service config recorded for simulation");
            return Ok(BuildReport::default());
        }

        let removed = self.lifecycle.remove_all(service).await;
        if removed > 0 {
            info!(service, removed, "replacing service pipeline");
        }
        let report = PipelineBuilder::new(&self.registry, &mut self.lifecycle).build(
            service,
            &config.input,
            &config.filter,
        );
        self.lifecycle.start(service);
        Ok(report)
    }

    /// 서비스의 모든 input을 멈추고 제거합니다.
    pub async fn remove_service(&mut self, service: &str) -> usize {
        self.lifecycle.remove_all(service).await
    }

    /// `log_id`와 같은 `type`의 input 하나를 출력 없이 빌드합니다.
    ///
    /// 모든 filter의 `multiline_pattern`을 지워 한 줄이 바로 처리되게 합니다.
    pub fn test_input(&self, config: &InputConfig, log_id: &str) -> Result<InputPipeline, PipelineError> {
        let mut descriptor = config
            .input
            .iter()
            .find(|d| d.log_type.as_deref() == Some(log_id))
            .cloned()
            .ok_or_else(|| PipelineError::UnknownLogId(log_id.to_owned()))?;
        descriptor.is_enabled = Some(true);

        let filters: Vec<FilterDescriptor> = config
            .filter
            .iter()
            .cloned()
            .map(|mut f| {
                f.multiline_pattern = None;
                f
            })
            .collect();

        let mut scratch = LifecycleManager::new(self.config.shutdown_timeout());
        PipelineBuilder::new(&self.registry, &mut scratch).build(TEST_SERVICE, &[descriptor], &filters);

        scratch
            .inputs_mut()
            .take_pending(TEST_SERVICE)
            .into_iter()
            .next()
            .map(|(input, chain)| InputPipeline { input, chain })
            .ok_or_else(|| {
                PipelineError::stage(
                    TEST_SERVICE,
                    format!("input for '{log_id}' could not be built or has no filter"),
                )
            })
    }

    /// 로그 파일이 사라진 체크포인트를 삭제합니다. 삭제된 수를 반환합니다.
    ///
    /// 등록된 input과 상관없이 체크포인트 디렉토리 전체를 검사합니다.
    pub fn clean_checkpoints(&self) -> usize {
        let store = CheckpointStore::new(&self.config.checkpoint_dir);
        let removed = match store.remove_stale() {
            Ok(removed) => removed,
            Err(e) => {
                warn!(dir = %store.dir().display(), error = %e, "checkpoint cleanup failed");
                0
            }
        };
        self.lifecycle.clean_checkpoints();
        if removed > 0 {
            info!(dir = %store.dir().display(), removed, "stale checkpoints removed");
        }
        removed
    }

    pub fn log_stats(&self) {
        self.lifecycle.log_stats();
    }

    pub fn collect_metrics(&self, metrics: &mut Vec<MetricData>) {
        self.lifecycle.collect_metrics(metrics);
    }

    /// 실행 중인 input이 스스로 끝날 때까지 기다립니다.
    pub async fn wait_on_all_inputs(&mut self) {
        self.lifecycle.wait_on_all_inputs().await;
    }

    /// 모든 input과 output을 닫습니다. 여러 번 호출해도 안전합니다.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.lifecycle.close_all().await;
        info!("pipeline assembler closed");
    }
}

impl InputConfigMonitor for PipelineAssembler {
    async fn load_input_configs(&mut self, service: &str, config: InputConfig) -> Result<(), PipelineError> {
        self.load_service(service, &config).await.map(|_| ())
    }

    async fn remove_inputs(&mut self, service: &str) -> Result<(), PipelineError> {
        self.remove_service(service).await;
        Ok(())
    }
}

impl std::fmt::Debug for PipelineAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineAssembler")
            .field("config", &self.config)
            .field("lifecycle", &self.lifecycle)
            .field("simulation_mode", &self.simulation_mode)
            .field("closed", &self.closed)
            .finish()
    }
}

/// 출력 없이 filter 체인만 가진 단일 input 파이프라인
pub struct InputPipeline {
    input: Arc<dyn Input>,
    chain: Chain,
}

impl InputPipeline {
    pub fn input(&self) -> &dyn Input {
        self.input.as_ref()
    }

    pub fn filter_descriptions(&self) -> Vec<String> {
        self.chain.filter_descriptions()
    }

    /// 한 줄을 input의 정적 필드와 함께 체인에 통과시킵니다.
    ///
    /// filter가 레코드를 버리면 `None`을 반환합니다.
    pub fn process(&mut self, line: &str) -> Result<Option<Record>, PipelineError> {
        let mut record = Record::new(line);
        self.input.prepare(&mut record);
        let result = self.chain.apply_filters(record);
        if let Err(e) = &result {
            warn!(input = %self.input.short_description(), error = %e, "test input failed");
        }
        result
    }
}

impl std::fmt::Debug for InputPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputPipeline")
            .field("input", &self.input.short_description())
            .field("filters", &self.chain.filter_descriptions())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn assembler() -> PipelineAssembler {
        PipelineAssembler::new(AssemblerConfig::default()).with_resources(BundledResources::empty())
    }

    fn hdfs_config() -> InputConfig {
        InputConfig::parse(
            "hdfs",
            r#"{
                "input": [
                    {"source": "file", "type": "hdfs_namenode", "rowtype": "service",
                     "path": "/var/log/hdfs/nn.log", "add_fields": {"cluster": "c1"}},
                    {"source": "file", "type": "hdfs_datanode", "rowtype": "service",
                     "path": "/var/log/hdfs/dn.log"}
                ],
                "filter": [
                    {"filter": "keyvalue", "sort_order": 1,
                     "conditions": {"fields": {"type": ["hdfs_namenode"]}},
                     "multiline_pattern": "^\\d{4}"}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn inline_documents_merge_globals() {
        let mut assembler = assembler();
        assembler
            .load_configs(r#"{"global": {"a": 1, "b": {"x": 1}}}"#)
            .unwrap();
        assembler.load_configs(r#"{"global": {"a": 2}}"#).unwrap();
        assert_eq!(assembler.global_configs()["a"], json!(2));
        assert_eq!(assembler.global_config_jsons().len(), 2);
    }

    #[test]
    fn test_input_runs_filters_on_single_line() {
        let assembler = assembler();
        let mut pipeline = assembler.test_input(&hdfs_config(), "hdfs_namenode").unwrap();
        assert_eq!(pipeline.filter_descriptions().len(), 1);

        let record = pipeline.process("level=INFO\tuser=hdfs").unwrap().unwrap();
        assert_eq!(record.get_str("level"), Some("INFO"));
        assert_eq!(record.get_str("type"), Some("hdfs_namenode"));
        assert_eq!(record.get_str("cluster"), Some("c1"));
    }

    #[test]
    fn test_input_unknown_log_id() {
        let assembler = assembler();
        let err = assembler.test_input(&hdfs_config(), "yarn").unwrap_err();
        assert!(matches!(err, PipelineError::UnknownLogId(ref id) if id == "yarn"));
    }

    #[test]
    fn test_input_without_applicable_filter_fails() {
        let assembler = assembler();
        assert!(assembler.test_input(&hdfs_config(), "hdfs_datanode").is_err());
    }

    #[tokio::test]
    async fn clean_checkpoints_works_before_any_service_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let live = dir.path().join("live.log");
        std::fs::write(&live, "x\n").unwrap();
        let store = CheckpointStore::new(dir.path().join("cp"));
        store.save(std::path::Path::new("/nonexistent/gone.log"), 3).unwrap();
        store.save(&live, 2).unwrap();

        let config = crate::config::AssemblerConfigBuilder::new()
            .checkpoint_dir(dir.path().join("cp"))
            .build()
            .unwrap();
        let mut assembler = PipelineAssembler::new(config)
            .with_resources(BundledResources::empty());
        assembler.load_configs(r#"{"global": {}}"#).unwrap();

        assert_eq!(assembler.clean_checkpoints(), 1);
        assert!(store.file_for(&live).exists());
        assert_eq!(assembler.clean_checkpoints(), 0);
    }

    #[tokio::test]
    async fn closed_assembler_rejects_services() {
        let mut assembler = assembler();
        assembler.close().await;
        assembler.close().await;
        assert!(assembler.is_closed());
        assert!(assembler.load_service("hdfs", &hdfs_config()).await.is_err());
    }
}
