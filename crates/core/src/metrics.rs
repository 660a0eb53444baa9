//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 스테이지는 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `logfeeder_`
//! - 영역: `input_`, `filter_`, `output_`, `assembly_`, `daemon_`
//! - 접미어: `_total` (counter), `_seconds` (gauge/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use logfeeder_core::metrics as m;
//!
//! metrics::counter!(m::INPUT_RECORDS_READ_TOTAL, m::LABEL_SERVICE => "hdfs").increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 서비스 이름 레이블 키
pub const LABEL_SERVICE: &str = "service";

/// 스테이지 종류 레이블 키 (input, filter, output)
pub const LABEL_STAGE_KIND: &str = "kind";

/// 스킵 사유 레이블 키 (missing_field, unresolved, disabled)
pub const LABEL_REASON: &str = "reason";

/// 출력 대상 레이블 키
pub const LABEL_DESTINATION: &str = "destination";

// ─── Input 메트릭 ──────────────────────────────────────────────────

/// Input: 읽어들인 레코드 수 (counter, label: service)
pub const INPUT_RECORDS_READ_TOTAL: &str = "logfeeder_input_records_read_total";

/// Input: 실행 중인 input 수 (gauge)
pub const INPUT_ACTIVE: &str = "logfeeder_input_active";

// ─── Filter 메트릭 ─────────────────────────────────────────────────

/// Filter: 체인에서 드롭된 레코드 수 (counter)
pub const FILTER_RECORDS_DROPPED_TOTAL: &str = "logfeeder_filter_records_dropped_total";

/// Filter: 필터 처리 에러 수 (counter)
pub const FILTER_ERRORS_TOTAL: &str = "logfeeder_filter_errors_total";

// ─── Output 메트릭 ─────────────────────────────────────────────────

/// Output: 기록된 레코드 수 (counter, label: destination)
pub const OUTPUT_RECORDS_WRITTEN_TOTAL: &str = "logfeeder_output_records_written_total";

/// Output: 기록 실패 수 (counter, label: destination)
pub const OUTPUT_WRITE_ERRORS_TOTAL: &str = "logfeeder_output_write_errors_total";

/// Output: 등록된 output 수 (gauge)
pub const OUTPUT_REGISTERED: &str = "logfeeder_output_registered";

// ─── 조립 메트릭 ───────────────────────────────────────────────────

/// 조립: 로드된 설정 문서 수 (counter)
pub const ASSEMBLY_DOCUMENTS_LOADED_TOTAL: &str = "logfeeder_assembly_documents_loaded_total";

/// 조립: 건너뛴 스테이지 설명자 수 (counter, label: kind, reason)
pub const ASSEMBLY_STAGES_SKIPPED_TOTAL: &str = "logfeeder_assembly_stages_skipped_total";

/// 조립: 필터가 없어 제거된 input 수 (counter)
pub const ASSEMBLY_INPUTS_PRUNED_TOTAL: &str = "logfeeder_assembly_inputs_pruned_total";

// ─── Daemon 메트릭 ─────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "logfeeder_daemon_uptime_seconds";

/// Daemon: 관리 중인 서비스 수 (gauge)
pub const DAEMON_SERVICES_ACTIVE: &str = "logfeeder_daemon_services_active";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(
        INPUT_RECORDS_READ_TOTAL,
        "Total number of records read by inputs"
    );
    describe_gauge!(INPUT_ACTIVE, "Number of inputs currently running");

    describe_counter!(
        FILTER_RECORDS_DROPPED_TOTAL,
        "Total number of records dropped by a filter chain"
    );
    describe_counter!(FILTER_ERRORS_TOTAL, "Total number of filter failures");

    describe_counter!(
        OUTPUT_RECORDS_WRITTEN_TOTAL,
        "Total number of records written by outputs"
    );
    describe_counter!(
        OUTPUT_WRITE_ERRORS_TOTAL,
        "Total number of failed output writes"
    );
    describe_gauge!(OUTPUT_REGISTERED, "Number of registered outputs");

    describe_counter!(
        ASSEMBLY_DOCUMENTS_LOADED_TOTAL,
        "Total number of configuration documents loaded"
    );
    describe_counter!(
        ASSEMBLY_STAGES_SKIPPED_TOTAL,
        "Stage descriptors skipped during assembly"
    );
    describe_counter!(
        ASSEMBLY_INPUTS_PRUNED_TOTAL,
        "Inputs discarded because no filter was bound"
    );

    describe_gauge!(DAEMON_UPTIME_SECONDS, "logfeeder daemon uptime in seconds");
    describe_gauge!(
        DAEMON_SERVICES_ACTIVE,
        "Number of services with at least one running input"
    );
}
