//! 파이프라인 빌더
//!
//! 디스크립터를 스테이지 인스턴스로 바꾸어 생명주기 관리자에 등록합니다.
//!
//! # 빌드 순서
//!
//! 1. output: global 병합 → `destination` 확인 → 해석 → 설정 → 활성화된 것만 등록
//! 2. input: `source` 확인 → 해석 → 설정 → 활성화된 것만 서비스에 등록
//! 3. filter: `sort_order`로 안정 정렬 후, input마다 필요한 filter를 체인에 추가
//! 4. filter가 없는 input 제거 (시뮬레이션 input 제외)
//! 5. input이 요구하는 output 바인딩 (시뮬레이션 input은 전용 사본)
//! 6. 시뮬레이션용으로 새로 만든 output 등록
//!
//! 디스크립터 단위 실패는 그 디스크립터만 버리고 계속 진행합니다. 롤백은 없습니다.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use logfeeder_core::metrics as m;

use crate::descriptor::{FilterDescriptor, InputDescriptor, OutputDescriptor};
use crate::manager::LifecycleManager;
use crate::merge::merge_defaults;
use crate::registry::StageRegistry;
use crate::stage::{OutputHandle, StageKind};

/// 서비스 하나의 빌드 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// 등록된 input 수 (가지치기 이후)
    pub inputs: usize,
    /// filter가 없어 제거된 input 수
    pub pruned: usize,
    /// 체인에 추가된 filter 수 (전체 input 합계)
    pub filters: usize,
    /// 이 서비스에 바인딩된 서로 다른 output 인스턴스 수
    pub outputs_bound: usize,
    /// 시뮬레이션용으로 새로 만든 output 수
    pub dedicated_outputs: usize,
    /// 건너뛴 디스크립터 수
    pub skipped: usize,
}

/// 두 filter 디스크립터의 정렬 순서를 비교합니다.
///
/// 어느 한쪽이라도 `sort_order`가 없으면 같은 것으로 봅니다.
/// 이 비교는 전순서가 아니므로 [`sort_filters`]의 인접 교환 정렬과만 함께 씁니다.
pub fn compare_sort_order(a: &FilterDescriptor, b: &FilterDescriptor) -> Ordering {
    match (a.sort_order, b.sort_order) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => Ordering::Equal,
    }
}

/// filter 디스크립터를 `sort_order`로 안정 정렬합니다.
///
/// 인접한 두 항목을 비교해 뒤 항목이 더 작을 때만 교환하는 삽입 정렬입니다.
pub fn sort_filters(filters: &mut [FilterDescriptor]) {
    for i in 1..filters.len() {
        let mut j = i;
        while j > 0 && compare_sort_order(&filters[j - 1], &filters[j]) == Ordering::Greater {
            filters.swap(j - 1, j);
            j -= 1;
        }
    }
}

fn skipped(kind: StageKind, reason: &'static str) {
    metrics::counter!(
        m::ASSEMBLY_STAGES_SKIPPED_TOTAL,
        m::LABEL_STAGE_KIND => kind.to_string(),
        m::LABEL_REASON => reason
    )
    .increment(1);
}

/// 파이프라인 빌더
///
/// 레지스트리로 스테이지를 만들고 생명주기 관리자에 등록합니다.
pub struct PipelineBuilder<'a> {
    registry: &'a StageRegistry,
    lifecycle: &'a mut LifecycleManager,
}

impl<'a> PipelineBuilder<'a> {
    pub fn new(registry: &'a StageRegistry, lifecycle: &'a mut LifecycleManager) -> Self {
        Self { registry, lifecycle }
    }

    /// global 설정을 병합하여 output을 만들고 등록합니다. 등록된 수를 반환합니다.
    pub fn load_outputs(
        &mut self,
        global: &Map<String, Value>,
        descriptors: &[OutputDescriptor],
    ) -> usize {
        let mut registered = 0;
        for descriptor in descriptors {
            let mut config = descriptor.clone();
            merge_defaults(global, &mut config);

            let Some(destination) = config
                .get("destination")
                .and_then(Value::as_str)
                .filter(|d| !d.is_empty())
            else {
                error!("output block doesn't have destination element");
                skipped(StageKind::Output, "missing_field");
                continue;
            };

            let Some(mut output) = self.registry.resolve_output(destination) else {
                error!(destination, "output destination could not be resolved");
                skipped(StageKind::Output, "unresolved");
                continue;
            };

            if let Err(e) = output.load_config(&config) {
                error!(destination, error = %e, "output config rejected");
                skipped(StageKind::Output, "invalid");
                continue;
            }

            if output.is_enabled() {
                output.log_configs(tracing::Level::INFO);
                self.lifecycle
                    .outputs_mut()
                    .add(OutputHandle::with_alias(output, destination));
                registered += 1;
            } else {
                info!(destination, "output is disabled, ignoring");
                skipped(StageKind::Output, "disabled");
            }
        }
        registered
    }

    /// 서비스 하나의 파이프라인을 빌드합니다.
    pub fn build(
        &mut self,
        service: &str,
        inputs: &[InputDescriptor],
        filters: &[FilterDescriptor],
    ) -> BuildReport {
        let mut report = BuildReport::default();
        self.load_inputs(service, inputs, &mut report);
        self.load_filters(service, filters, &mut report);
        self.assign_outputs(service, &mut report);
        report.inputs = self.lifecycle.inputs().input_count(service);
        info!(
            service,
            inputs = report.inputs,
            pruned = report.pruned,
            filters = report.filters,
            outputs = report.outputs_bound,
            skipped = report.skipped,
            "service pipeline built"
        );
        report
    }

    fn load_inputs(&mut self, service: &str, descriptors: &[InputDescriptor], report: &mut BuildReport) {
        for descriptor in descriptors {
            let Some(source) = descriptor.source.as_deref().filter(|s| !s.is_empty()) else {
                error!(service, "input block doesn't have source element");
                skipped(StageKind::Input, "missing_field");
                report.skipped += 1;
                continue;
            };

            let Some(mut input) = self.registry.resolve_input(source) else {
                error!(service, source, "input source could not be resolved");
                skipped(StageKind::Input, "unresolved");
                report.skipped += 1;
                continue;
            };

            if let Err(e) = input.load_config(descriptor) {
                error!(service, source, error = %e, "input config rejected");
                skipped(StageKind::Input, "invalid");
                report.skipped += 1;
                continue;
            }

            if input.is_enabled() {
                input.log_configs(tracing::Level::INFO);
                self.lifecycle.add(service, Arc::from(input));
            } else {
                info!(service, source, "input is disabled, ignoring");
                skipped(StageKind::Input, "disabled");
                report.skipped += 1;
            }
        }
    }

    fn load_filters(&mut self, service: &str, descriptors: &[FilterDescriptor], report: &mut BuildReport) {
        let mut sorted = descriptors.to_vec();
        sort_filters(&mut sorted);

        let mut empty = Vec::new();
        for managed in self.lifecycle.inputs_mut().inputs_mut(service) {
            let input = Arc::clone(managed.input());
            let Some(chain) = managed.chain_mut() else {
                continue;
            };

            for descriptor in &sorted {
                if descriptor.is_disabled() {
                    debug!(service, filter = ?descriptor.filter, "filter is disabled, ignoring");
                    continue;
                }
                if !input.is_filter_required(descriptor) {
                    debug!(
                        service,
                        filter = ?descriptor.filter,
                        input = %input.short_description(),
                        "filter not required for input"
                    );
                    continue;
                }
                let Some(alias) = descriptor.filter.as_deref().filter(|f| !f.is_empty()) else {
                    error!(service, "filter block doesn't have filter element");
                    skipped(StageKind::Filter, "missing_field");
                    report.skipped += 1;
                    continue;
                };
                let Some(mut filter) = self.registry.resolve_filter(alias) else {
                    error!(service, filter = alias, "filter could not be resolved");
                    skipped(StageKind::Filter, "unresolved");
                    report.skipped += 1;
                    continue;
                };
                if let Err(e) = filter.load_config(descriptor) {
                    error!(service, filter = alias, error = %e, "filter config rejected");
                    skipped(StageKind::Filter, "invalid");
                    report.skipped += 1;
                    continue;
                }
                filter.log_configs(tracing::Level::INFO);
                chain.add_filter(filter);
                report.filters += 1;
            }

            if chain.filter_count() == 0 && input.requires_filters() {
                empty.push(managed.id());
            }
        }

        for id in empty {
            if let Some(managed) = self.lifecycle.inputs_mut().detach(service, id) {
                warn!(
                    service,
                    input = %managed.input().short_description(),
                    "input doesn't have any filter, removing it"
                );
                metrics::counter!(m::ASSEMBLY_INPUTS_PRUNED_TOTAL, m::LABEL_SERVICE => service.to_owned())
                    .increment(1);
                report.pruned += 1;
            }
        }
    }

    fn assign_outputs(&mut self, service: &str, report: &mut BuildReport) {
        let registered: Vec<OutputHandle> = self.lifecycle.outputs().outputs().to_vec();
        let mut used: HashSet<Uuid> = HashSet::new();
        let mut dedicated = Vec::new();

        for managed in self.lifecycle.inputs_mut().inputs_mut(service) {
            let input = Arc::clone(managed.input());
            let Some(chain) = managed.chain_mut() else {
                continue;
            };

            for output in &registered {
                if !input.is_output_required(output.stage()) {
                    continue;
                }
                if input.wants_dedicated_outputs() {
                    match Self::duplicate_output(self.registry, output) {
                        Some(copy) => {
                            chain.add_output(copy.clone());
                            used.insert(copy.id());
                            dedicated.push(copy);
                        }
                        None => warn!(
                            service,
                            destination = output.alias(),
                            "could not create dedicated output copy"
                        ),
                    }
                } else {
                    chain.add_output(output.clone());
                    used.insert(output.id());
                }
            }
        }

        report.dedicated_outputs = dedicated.len();
        for copy in dedicated {
            self.lifecycle.outputs_mut().add(copy);
        }
        report.outputs_bound = used.len();
    }

    /// 등록된 output과 같은 별칭과 설정으로 새 인스턴스를 만듭니다.
    fn duplicate_output(registry: &StageRegistry, output: &OutputHandle) -> Option<OutputHandle> {
        let alias = output.alias();
        let mut copy = registry.resolve_output(alias)?;
        if let Err(e) = copy.load_config(output.stage().configs()) {
            error!(destination = alias, error = %e, "output copy config rejected");
            return None;
        }
        Some(OutputHandle::with_alias(copy, alias))
    }
}
