//! 스테이지 레지스트리 -- 별칭 → 구현체 팩토리
//!
//! (종류, 별칭) 쌍을 키로 팩토리를 보관하는 컴파일된 테이블입니다.
//! 해석 실패는 해당 디스크립터만 건너뛰는 비치명적 에러입니다.
//!
//! # 기본 제공 별칭
//!
//! | 종류 | 별칭 |
//! |------|------|
//! | input | `simulate`, `file` |
//! | filter | `json`, `keyvalue` |
//! | output | `stdout`, `dev_null` |
//!
//! 빌드 전에 [`StageRegistry::register_input`] 등으로 팩토리를 추가할 수 있습니다.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::PipelineError;
use crate::stage::filter::{JsonFilter, KeyValueFilter};
use crate::stage::input::{FileInput, SimulateInput};
use crate::stage::output::{DevNullOutput, StdoutOutput};
use crate::stage::{Filter, Input, Output, StageContext, StageKind};

/// input 팩토리
pub type InputFactory = Arc<dyn Fn(&StageContext) -> Box<dyn Input> + Send + Sync>;
/// filter 팩토리
pub type FilterFactory = Arc<dyn Fn(&StageContext) -> Box<dyn Filter> + Send + Sync>;
/// output 팩토리
pub type OutputFactory = Arc<dyn Fn(&StageContext) -> Box<dyn Output> + Send + Sync>;

/// 종류별 팩토리
#[derive(Clone)]
pub enum StageFactory {
    Input(InputFactory),
    Filter(FilterFactory),
    Output(OutputFactory),
}

impl StageFactory {
    /// 팩토리의 스테이지 종류
    pub fn kind(&self) -> StageKind {
        match self {
            Self::Input(_) => StageKind::Input,
            Self::Filter(_) => StageKind::Filter,
            Self::Output(_) => StageKind::Output,
        }
    }
}

/// 새로 생성된 (아직 설정되지 않은) 스테이지
pub enum Stage {
    Input(Box<dyn Input>),
    Filter(Box<dyn Filter>),
    Output(Box<dyn Output>),
}

impl Stage {
    pub fn kind(&self) -> StageKind {
        match self {
            Self::Input(_) => StageKind::Input,
            Self::Filter(_) => StageKind::Filter,
            Self::Output(_) => StageKind::Output,
        }
    }
}

/// 스테이지 레지스트리
#[derive(Clone)]
pub struct StageRegistry {
    context: StageContext,
    factories: HashMap<(StageKind, String), StageFactory>,
}

impl StageRegistry {
    /// 빈 레지스트리
    pub fn new(context: StageContext) -> Self {
        Self {
            context,
            factories: HashMap::new(),
        }
    }

    /// 기본 제공 스테이지가 등록된 레지스트리
    pub fn with_builtins(context: StageContext) -> Self {
        let mut registry = Self::new(context);
        registry.register_input("simulate", |ctx| {
            Box::new(SimulateInput::new(ctx.catalog.clone()))
        });
        registry.register_input("file", |ctx| Box::new(FileInput::new(ctx.checkpoint_dir.clone())));
        registry.register_filter("json", |_| Box::<JsonFilter>::default());
        registry.register_filter("keyvalue", |_| Box::<KeyValueFilter>::default());
        registry.register_output("stdout", |_| Box::<StdoutOutput>::default());
        registry.register_output("dev_null", |_| Box::<DevNullOutput>::default());
        registry
    }

    /// 팩토리에 전달되는 컨텍스트
    pub fn context(&self) -> &StageContext {
        &self.context
    }

    /// input 팩토리를 등록합니다. 같은 별칭은 교체됩니다.
    pub fn register_input<F>(&mut self, alias: &str, factory: F)
    where
        F: Fn(&StageContext) -> Box<dyn Input> + Send + Sync + 'static,
    {
        self.register(alias, StageFactory::Input(Arc::new(factory)));
    }

    /// filter 팩토리를 등록합니다.
    pub fn register_filter<F>(&mut self, alias: &str, factory: F)
    where
        F: Fn(&StageContext) -> Box<dyn Filter> + Send + Sync + 'static,
    {
        self.register(alias, StageFactory::Filter(Arc::new(factory)));
    }

    /// output 팩토리를 등록합니다.
    pub fn register_output<F>(&mut self, alias: &str, factory: F)
    where
        F: Fn(&StageContext) -> Box<dyn Output> + Send + Sync + 'static,
    {
        self.register(alias, StageFactory::Output(Arc::new(factory)));
    }

    /// 종류가 태그된 팩토리를 등록합니다.
    pub fn register(&mut self, alias: &str, factory: StageFactory) {
        self.factories.insert((factory.kind(), alias.to_owned()), factory);
    }

    /// 별칭이 등록되어 있는지 확인합니다.
    pub fn contains(&self, kind: StageKind, alias: &str) -> bool {
        self.factories.contains_key(&(kind, alias.to_owned()))
    }

    /// 종류와 별칭으로 새 스테이지를 생성합니다.
    pub fn resolve(&self, alias: &str, kind: StageKind) -> Result<Stage, PipelineError> {
        let factory = self
            .factories
            .get(&(kind, alias.to_owned()))
            .ok_or_else(|| PipelineError::Resolution {
                kind,
                alias: alias.to_owned(),
            })?;
        Ok(match factory {
            StageFactory::Input(f) => Stage::Input(f(&self.context)),
            StageFactory::Filter(f) => Stage::Filter(f(&self.context)),
            StageFactory::Output(f) => Stage::Output(f(&self.context)),
        })
    }

    pub fn resolve_input(&self, alias: &str) -> Option<Box<dyn Input>> {
        match self.resolve(alias, StageKind::Input).ok()? {
            Stage::Input(input) => Some(input),
            _ => None,
        }
    }

    pub fn resolve_filter(&self, alias: &str) -> Option<Box<dyn Filter>> {
        match self.resolve(alias, StageKind::Filter).ok()? {
            Stage::Filter(filter) => Some(filter),
            _ => None,
        }
    }

    pub fn resolve_output(&self, alias: &str) -> Option<Box<dyn Output>> {
        match self.resolve(alias, StageKind::Output).ok()? {
            Stage::Output(output) => Some(output),
            _ => None,
        }
    }

    /// 종류별로 등록된 별칭 목록 (정렬됨)
    pub fn aliases(&self, kind: StageKind) -> Vec<&str> {
        let mut aliases: Vec<&str> = self
            .factories
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, alias)| alias.as_str())
            .collect();
        aliases.sort_unstable();
        aliases
    }
}

impl fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageRegistry")
            .field("inputs", &self.aliases(StageKind::Input))
            .field("filters", &self.aliases(StageKind::Filter))
            .field("outputs", &self.aliases(StageKind::Output))
            .finish()
    }
}
