//! 필터 팩토리 -- [`FilterSpec`] 정의로 필터 인스턴스를 생성
//!
//! 종류([`FilterKind`])별 생성 함수를 표로 보관합니다. 팩토리는 전역 레지스트리가
//! 아니라 값이므로 호출자가 생성해 주입하고, 생성 함수를 교체하거나 시계를 바꿔
//! 테스트할 수 있습니다.
//!
//! # 사용 예시
//! ```ignore
//! use ironsieve_core::config::FilterSpec;
//! use ironsieve_filter::FilterFactory;
//!
//! let factory = FilterFactory::new();
//! let filter = factory.build(&FilterSpec::new("errors-only", "level")
//!     .with_setting("min_level", "error"))?;
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use ironsieve_core::clock::{Clock, SystemClock};
use ironsieve_core::config::FilterSpec;
use ironsieve_core::settings::Settings;

use crate::chain::FilterChain;
use crate::error::FilterError;
use crate::filter::{
    BlockFilter, CompositeFilter, ContentFilter, CorrelationFilter, Filter, FilterKind,
    LevelFilter, PassThroughFilter, RateLimitFilter, SamplingFilter, SourceFilter, TagFilter,
    TimeRangeFilter,
};

/// 종류별 생성 함수 (이름, 설정) -> 필터
pub type Constructor =
    Arc<dyn Fn(&str, &Settings) -> Result<Arc<dyn Filter>, FilterError> + Send + Sync>;

/// 필터 팩토리
#[derive(Clone)]
pub struct FilterFactory {
    constructors: BTreeMap<FilterKind, Constructor>,
}

impl FilterFactory {
    /// 모든 내장 필터 종류를 등록한 팩토리 (시스템 시계 사용)
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// 레이트 리밋 필터가 사용할 시계를 지정해 팩토리를 생성합니다.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let mut factory = Self {
            constructors: BTreeMap::new(),
        };
        factory.register(FilterKind::Level, |name, s| {
            Ok(Arc::new(LevelFilter::from_settings(name, s)?))
        });
        factory.register(FilterKind::Source, |name, s| {
            Ok(Arc::new(SourceFilter::from_settings(name, s)?))
        });
        factory.register(FilterKind::Content, |name, s| {
            Ok(Arc::new(ContentFilter::from_settings(name, s)?))
        });
        factory.register(FilterKind::Correlation, |name, s| {
            Ok(Arc::new(CorrelationFilter::from_settings(name, s)?))
        });
        factory.register(FilterKind::TimeRange, |name, s| {
            Ok(Arc::new(TimeRangeFilter::from_settings(name, s)?))
        });
        factory.register(FilterKind::Sampling, |name, s| {
            Ok(Arc::new(SamplingFilter::from_settings(name, s)?))
        });
        factory.register(FilterKind::RateLimit, move |name, s| {
            let filter = RateLimitFilter::new(name).with_clock(Arc::clone(&clock));
            filter.configure_strict(s)?;
            Ok(Arc::new(filter))
        });
        factory.register(FilterKind::Composite, |name, s| {
            Ok(Arc::new(CompositeFilter::from_settings(name, s)?))
        });
        factory.register(FilterKind::Tag, |name, s| {
            Ok(Arc::new(TagFilter::from_settings(name, s)?))
        });
        factory.register(FilterKind::Block, |name, s| {
            Ok(Arc::new(BlockFilter::from_settings(name, s)?))
        });
        factory.register(FilterKind::PassThrough, |name, s| {
            Ok(Arc::new(PassThroughFilter::from_settings(name, s)?))
        });
        factory
    }

    /// 종류의 생성 함수를 등록하거나 교체합니다.
    pub fn register<F>(&mut self, kind: FilterKind, constructor: F)
    where
        F: Fn(&str, &Settings) -> Result<Arc<dyn Filter>, FilterError> + Send + Sync + 'static,
    {
        self.constructors.insert(kind, Arc::new(constructor));
    }

    /// 등록된 종류 목록
    pub fn kinds(&self) -> Vec<FilterKind> {
        self.constructors.keys().copied().collect()
    }

    /// 종류와 설정으로 필터를 생성합니다.
    pub fn create(
        &self,
        kind: FilterKind,
        name: &str,
        settings: &Settings,
    ) -> Result<Arc<dyn Filter>, FilterError> {
        let constructor = self
            .constructors
            .get(&kind)
            .ok_or_else(|| FilterError::Config {
                filter: name.to_owned(),
                field: "kind".to_owned(),
                reason: format!("no constructor registered for '{kind}'"),
            })?;
        constructor(name, settings)
    }

    /// 정의에서 필터를 생성합니다.
    ///
    /// 정의의 `priority`/`enabled`가 설정 값보다 우선합니다.
    /// 복합 필터의 `children`은 재귀적으로 생성되어 자식으로 추가됩니다.
    pub fn build(&self, spec: &FilterSpec) -> Result<Arc<dyn Filter>, FilterError> {
        let kind = FilterKind::from_str_loose(&spec.kind).ok_or_else(|| FilterError::Config {
            filter: spec.name.clone(),
            field: "kind".to_owned(),
            reason: format!("unknown filter kind '{}'", spec.kind),
        })?;

        if !spec.children.is_empty() && kind != FilterKind::Composite {
            return Err(FilterError::Config {
                filter: spec.name.clone(),
                field: "children".to_owned(),
                reason: format!("only composite filters take children, got '{kind}'"),
            });
        }

        let filter = if kind == FilterKind::Composite {
            let composite = CompositeFilter::from_settings(spec.name.as_str(), &spec.settings)?;
            for child in &spec.children {
                composite.add_child(self.build(child)?)?;
            }
            Arc::new(composite) as Arc<dyn Filter>
        } else {
            self.create(kind, &spec.name, &spec.settings)?
        };

        if let Some(priority) = spec.priority {
            filter.set_priority(priority);
        }
        if !spec.enabled {
            filter.set_enabled(false);
        }

        debug!(
            filter = %spec.name,
            kind = %kind,
            priority = filter.priority(),
            enabled = filter.is_enabled(),
            "filter built"
        );
        Ok(filter)
    }

    /// 정의 목록을 생성해 체인에 추가합니다. 추가된 필터 수를 반환합니다.
    ///
    /// 하나라도 실패하면 즉시 에러를 반환합니다 (이미 추가된 필터는 남습니다).
    pub fn populate(&self, chain: &FilterChain, specs: &[FilterSpec]) -> Result<usize, FilterError> {
        for spec in specs {
            chain.add_filter(self.build(spec)?)?;
        }
        Ok(specs.len())
    }
}

impl Default for FilterFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FilterFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterFactory")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterContext, FilterDecision, test_support::log};
    use ironsieve_core::clock::ManualClock;
    use ironsieve_core::types::Severity;

    #[test]
    fn every_kind_is_registered() {
        assert_eq!(FilterFactory::new().kinds(), FilterKind::ALL.to_vec());
    }

    #[test]
    fn build_applies_spec_priority_and_enabled() {
        let factory = FilterFactory::new();
        let filter = factory
            .build(
                &FilterSpec::new("lv", "Level")
                    .with_setting("min_level", "warning")
                    .with_priority(7),
            )
            .unwrap();
        assert_eq!(filter.kind(), FilterKind::Level);
        assert_eq!(filter.priority(), 7);
        assert!(filter.is_enabled());

        let disabled = factory.build(&FilterSpec::new("b", "block").disabled()).unwrap();
        assert!(!disabled.is_enabled());
        assert_eq!(disabled.priority(), FilterKind::Block.default_priority());
    }

    #[test]
    fn unknown_kind_and_bad_settings_fail() {
        let factory = FilterFactory::new();
        let err = factory.build(&FilterSpec::new("x", "nope")).unwrap_err();
        assert!(err.to_string().contains("unknown filter kind"));

        let err = factory
            .build(&FilterSpec::new("lv", "level").with_setting("min_level", "loud"))
            .unwrap_err();
        assert!(matches!(err, FilterError::Config { .. }));
    }

    #[test]
    fn composite_children_are_built_recursively() {
        let factory = FilterFactory::new();
        let spec = FilterSpec::new("both", "composite")
            .with_setting("operator", "or")
            .with_child(FilterSpec::new("never", "block"))
            .with_child(FilterSpec::new("always", "pass_through"));
        let filter = factory.build(&spec).unwrap();
        let result = filter.process(&log(Severity::Info, "App", "m"), &FilterContext::default());
        assert_eq!(result.decision, FilterDecision::Allow);

        let bad = FilterSpec::new("lv", "level").with_child(FilterSpec::new("c", "block"));
        assert!(factory.build(&bad).is_err());
    }

    #[test]
    fn rate_limit_uses_injected_clock() {
        let clock = Arc::new(ManualClock::from_epoch_secs(1_000));
        let factory = FilterFactory::with_clock(clock.clone());
        let filter = factory
            .build(
                &FilterSpec::new("rl", "rate_limit")
                    .with_setting("limit", 1_i64)
                    .with_setting("window_secs", 60_i64),
            )
            .unwrap();
        let ctx = FilterContext::default();
        let event = log(Severity::Info, "App", "m");
        assert_eq!(filter.process(&event, &ctx).decision, FilterDecision::Allow);
        assert_eq!(filter.process(&event, &ctx).decision, FilterDecision::Suppress);
        clock.advance(std::time::Duration::from_secs(60));
        assert_eq!(filter.process(&event, &ctx).decision, FilterDecision::Allow);
    }

    #[test]
    fn custom_constructor_replaces_builtin() {
        let mut factory = FilterFactory::new();
        factory.register(FilterKind::Level, |name, _| Ok(Arc::new(BlockFilter::new(name))));
        let filter = factory.create(FilterKind::Level, "lv", &Settings::new()).unwrap();
        assert_eq!(filter.kind(), FilterKind::Block);
    }

    #[test]
    fn populate_adds_to_chain() {
        let chain = FilterChain::default();
        let factory = FilterFactory::new();
        let added = factory
            .populate(
                &chain,
                &[FilterSpec::new("a", "level"), FilterSpec::new("b", "source")],
            )
            .unwrap();
        assert_eq!(added, 2);
        assert_eq!(chain.filter_names(), ["a", "b"]);

        let err = factory.populate(&chain, &[FilterSpec::new("a", "tag")]).unwrap_err();
        assert!(matches!(err, FilterError::DuplicateFilter { .. }));
    }
}
