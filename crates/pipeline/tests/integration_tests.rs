//! 통합 테스트 -- 설정 로딩부터 서비스 파이프라인 실행까지 전체 흐름 검증

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::json;

use logfeeder_core::types::Record;
use logfeeder_pipeline::descriptor::InputDescriptor;
use logfeeder_pipeline::error::PipelineError;
use logfeeder_pipeline::simulate::SIMULATION_SERVICE;
use logfeeder_pipeline::stage::StageCounter;
use logfeeder_pipeline::{
    AssemblerConfig, AssemblerConfigBuilder, BundledResources, DirectoryInputConfigSource,
    InputConfig, LifecycleManager, Output, OutputDescriptor, PipelineAssembler, PipelineBuilder,
    SimulationCatalog, StageContext, StageRegistry,
};

/// 받은 레코드를 모아 두는 output
#[derive(Clone, Default)]
struct Sink {
    records: Arc<Mutex<Vec<Record>>>,
}

impl Sink {
    fn records(&self) -> Vec<Record> {
        self.records.lock().unwrap().clone()
    }
}

struct CaptureOutput {
    configs: OutputDescriptor,
    sink: Sink,
    written: StageCounter,
}

impl CaptureOutput {
    fn new(sink: Sink) -> Self {
        Self {
            configs: OutputDescriptor::new(),
            sink,
            written: StageCounter::new("written"),
        }
    }
}

impl Output for CaptureOutput {
    fn load_config(&mut self, config: &OutputDescriptor) -> Result<(), PipelineError> {
        self.configs = config.clone();
        Ok(())
    }

    fn configs(&self) -> &OutputDescriptor {
        &self.configs
    }

    fn destination(&self) -> &str {
        "capture"
    }

    fn write(&self, record: &Record) -> Result<(), PipelineError> {
        self.sink.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    fn records_written(&self) -> &StageCounter {
        &self.written
    }
}

fn registry(checkpoint_dir: &Path, sink: &Sink) -> StageRegistry {
    let context = StageContext {
        checkpoint_dir: checkpoint_dir.to_path_buf(),
        catalog: SimulationCatalog::default(),
    };
    let mut registry = StageRegistry::with_builtins(context);
    let sink = sink.clone();
    registry.register_output("sink1", move |_| Box::new(CaptureOutput::new(sink.clone())));
    registry
}

fn config(checkpoint_dir: &Path, files: &[&str], simulate: usize) -> AssemblerConfig {
    AssemblerConfigBuilder::new()
        .config_files(files.iter().map(|f| (*f).to_owned()).collect())
        .checkpoint_dir(checkpoint_dir)
        .simulate_input_number(simulate)
        .shutdown_timeout_secs(5)
        .build()
        .unwrap()
}

const SINK_DOC: &str = r#"{
    "global": {"add_fields": {"cluster": "c1"}},
    "output": [{"destination": "sink1", "conditions": {"fields": {"rowtype": ["service"]}}}]
}"#;

fn app_config(dir: &Path) -> InputConfig {
    let namenode = dir.join("nn.log");
    let datanode = dir.join("dn.log");
    std::fs::write(&namenode, "level=INFO\tmsg=started\nlevel=WARN\tmsg=slow\n").unwrap();
    std::fs::write(&datanode, "level=ERROR\tmsg=disk\n").unwrap();

    let text = json!({
        "input": [
            {"source": "file", "type": "app", "rowtype": "service", "path": namenode},
            {"source": "file", "type": "app", "rowtype": "service", "path": datanode},
            {"source": "file", "type": "audit", "rowtype": "audit", "path": datanode}
        ],
        "filter": [
            {"filter": "keyvalue", "sort_order": 1, "conditions": {"fields": {"type": ["app"]}}}
        ]
    })
    .to_string();
    InputConfig::parse("app", &text).unwrap()
}

#[tokio::test]
async fn global_defaults_fill_output_config() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Sink::default();
    let mut resources = BundledResources::empty();
    resources.insert("doc1.json", r#"{"global": {"a": 1, "b": {"x": 1}}}"#);
    resources.insert("doc2.json", r#"{"output": [{"destination": "sink1", "b": {"y": 2}}]}"#);

    let mut assembler = PipelineAssembler::with_registry(
        config(dir.path(), &["doc1.json", "doc2.json"], 0),
        registry(dir.path(), &sink),
    )
    .with_resources(resources);
    assembler.init().await.unwrap();

    let outputs = assembler.lifecycle().outputs().outputs();
    assert_eq!(outputs.len(), 1);
    let configs = outputs[0].stage().configs();
    assert_eq!(configs["a"], json!(1));
    assert_eq!(configs["b"], json!({"x": 1, "y": 2}));
    assert_eq!(assembler.global_config_jsons().len(), 2);

    assembler.close().await;
}

#[tokio::test]
async fn bundled_default_config_registers_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let config = AssemblerConfigBuilder::new()
        .checkpoint_dir(dir.path())
        .build()
        .unwrap();
    let mut assembler = PipelineAssembler::new(config);
    assembler.init().await.unwrap();

    let outputs = assembler.lifecycle().outputs().outputs();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].stage().destination(), "stdout");
    assert_eq!(outputs[0].stage().configs()["add_fields"]["cluster"], json!("logfeeder"));
    assembler.close().await;
}

#[tokio::test]
async fn missing_config_document_fails_init() {
    let dir = tempfile::tempdir().unwrap();
    let mut assembler = PipelineAssembler::new(config(dir.path(), &["missing.json"], 0))
        .with_resources(BundledResources::empty());
    let err = assembler.init().await.unwrap_err();
    assert!(matches!(err, PipelineError::Load { .. }));
    assert!(assembler.lifecycle().outputs().is_empty());
}

#[test]
fn empty_source_is_rejected_before_resolution() {
    let resolved = Arc::new(AtomicUsize::new(0));
    let mut registry = StageRegistry::with_builtins(StageContext::default());
    let counter = Arc::clone(&resolved);
    registry.register_input("", move |ctx| {
        counter.fetch_add(1, Ordering::SeqCst);
        Box::new(logfeeder_pipeline::stage::input::SimulateInput::new(ctx.catalog.clone()))
    });

    let mut lifecycle = LifecycleManager::new(std::time::Duration::from_secs(1));
    let report = PipelineBuilder::new(&registry, &mut lifecycle).build(
        "svc",
        &[InputDescriptor::with_source("")],
        &[],
    );
    assert_eq!(report.skipped, 1);
    assert_eq!(report.inputs, 0);
    assert_eq!(resolved.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn service_pipeline_shares_outputs_and_prunes_unfiltered_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Sink::default();
    let mut resources = BundledResources::empty();
    resources.insert("sink.json", SINK_DOC);

    let mut assembler = PipelineAssembler::with_registry(
        config(dir.path(), &["sink.json"], 0),
        registry(dir.path(), &sink),
    )
    .with_resources(resources);
    assembler.init().await.unwrap();

    let report = assembler.load_service("app", &app_config(dir.path())).await.unwrap();
    assert_eq!(report.inputs, 2);
    assert_eq!(report.pruned, 1);
    assert_eq!(report.filters, 2);
    assert_eq!(report.outputs_bound, 1);
    assert_eq!(report.dedicated_outputs, 0);

    assembler.wait_on_all_inputs().await;
    let records = sink.records();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.get_str("type") == Some("app")));
    assert!(records.iter().any(|r| r.get_str("level") == Some("ERROR")));

    let mut metrics = Vec::new();
    assembler.collect_metrics(&mut metrics);
    assert_eq!(metrics.len(), 3);
    assert_eq!(metrics.iter().map(|m| m.value).sum::<u64>(), 6);

    assembler.close().await;
    assembler.close().await;
    assert!(assembler.lifecycle().is_closed());
}

#[tokio::test]
async fn reloading_a_service_replaces_its_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Sink::default();
    let mut resources = BundledResources::empty();
    resources.insert("sink.json", SINK_DOC);

    let mut assembler = PipelineAssembler::with_registry(
        config(dir.path(), &["sink.json"], 0),
        registry(dir.path(), &sink),
    )
    .with_resources(resources);
    assembler.init().await.unwrap();

    let config = app_config(dir.path());
    assembler.load_service("app", &config).await.unwrap();
    assembler.load_service("app", &config).await.unwrap();
    assert_eq!(assembler.lifecycle().inputs().input_count("app"), 2);

    assert_eq!(assembler.remove_service("app").await, 2);
    assert!(!assembler.lifecycle().inputs().contains_service("app"));
    assembler.close().await;
}

#[tokio::test]
async fn simulation_builds_dedicated_inputs_and_skips_services() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Sink::default();
    let mut resources = BundledResources::empty();
    resources.insert("sink.json", SINK_DOC);

    let mut assembler = PipelineAssembler::with_registry(
        config(dir.path(), &["sink.json"], 3),
        registry(dir.path(), &sink),
    )
    .with_resources(resources);
    assembler.init().await.unwrap();

    assert!(assembler.is_simulation_mode());
    assert_eq!(assembler.lifecycle().inputs().input_count(SIMULATION_SERVICE), 3);
    assert_eq!(assembler.lifecycle().inputs().service_names(), vec![SIMULATION_SERVICE]);
    // 공유 output 1개 + 시뮬레이션 input별 전용 사본 3개
    assert_eq!(assembler.lifecycle().outputs().len(), 4);

    let report = assembler.load_service("app", &app_config(dir.path())).await.unwrap();
    assert_eq!(report.inputs, 0);
    assert!(!assembler.lifecycle().inputs().contains_service("app"));
    assert_eq!(assembler.catalog().log_types(), vec!["app", "audit"]);

    assembler.close().await;
}

#[tokio::test]
async fn directory_source_drives_assembler() {
    let dir = tempfile::tempdir().unwrap();
    let inputs_dir = dir.path().join("inputs");
    std::fs::create_dir(&inputs_dir).unwrap();
    let sink = Sink::default();
    let mut resources = BundledResources::empty();
    resources.insert("sink.json", SINK_DOC);

    let mut assembler = PipelineAssembler::with_registry(
        config(dir.path(), &["sink.json"], 0),
        registry(dir.path(), &sink),
    )
    .with_resources(resources);
    assembler.init().await.unwrap();

    let service_file = inputs_dir.join("input.config-app.json");
    let config = app_config(dir.path());
    std::fs::write(&service_file, serde_json::to_string(&config).unwrap()).unwrap();

    let mut source = DirectoryInputConfigSource::new(&inputs_dir);
    let summary = source.load_all(&mut assembler).await.unwrap();
    assert_eq!(summary.loaded, vec!["app"]);
    assert_eq!(assembler.lifecycle().inputs().input_count("app"), 2);

    let mut smaller = config.clone();
    smaller.input.truncate(1);
    std::fs::write(&service_file, serde_json::to_string_pretty(&smaller).unwrap()).unwrap();
    source.poll_changes(&mut assembler).await.unwrap();
    assert_eq!(assembler.lifecycle().inputs().input_count("app"), 1);

    std::fs::remove_file(&service_file).unwrap();
    let summary = source.poll_changes(&mut assembler).await.unwrap();
    assert_eq!(summary.removed, vec!["app"]);
    assert!(!assembler.lifecycle().inputs().contains_service("app"));

    assembler.close().await;
}

#[tokio::test]
async fn file_input_resumes_from_checkpoint_after_close() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Sink::default();
    let mut resources = BundledResources::empty();
    resources.insert("sink.json", SINK_DOC);
    let config = app_config(dir.path());

    let mut first = PipelineAssembler::with_registry(
        config_for(dir.path()),
        registry(dir.path(), &sink),
    )
    .with_resources(resources.clone());
    first.init().await.unwrap();
    first.load_service("app", &config).await.unwrap();
    first.wait_on_all_inputs().await;
    first.close().await;
    assert_eq!(sink.records().len(), 3);

    let mut second = PipelineAssembler::with_registry(
        config_for(dir.path()),
        registry(dir.path(), &sink),
    )
    .with_resources(resources);
    second.init().await.unwrap();
    second.load_service("app", &config).await.unwrap();
    second.wait_on_all_inputs().await;
    second.close().await;
    assert_eq!(sink.records().len(), 3);
}

fn config_for(dir: &Path) -> AssemblerConfig {
    config(dir, &["sink.json"], 0)
}
