//! 항상 같은 판정을 내리는 필터 (체인 종결자, 테스트 고정값)

use ironsieve_core::event::Event;
use ironsieve_core::settings::Settings;

use super::{
    Filter, FilterBase, FilterContext, FilterKind, FilterResult, SettingsReader, ValidationResult,
    read_lock, write_lock,
};
use crate::error::FilterError;
use std::sync::RwLock;

fn parse_reason(settings: &Settings, default: &str) -> (String, ValidationResult) {
    let mut r = SettingsReader::new(settings);
    let reason = r.string("reason", default);
    (reason, r.finish())
}

/// 모든 이벤트를 억제
#[derive(Debug)]
pub struct BlockFilter {
    base: FilterBase,
    reason: RwLock<String>,
}

impl BlockFilter {
    const DEFAULT_REASON: &'static str = "blocked";

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: FilterBase::new(name, FilterKind::Block.default_priority()),
            reason: RwLock::new(Self::DEFAULT_REASON.to_owned()),
        }
    }

    pub fn from_settings(name: impl Into<String>, settings: &Settings) -> Result<Self, FilterError> {
        let filter = Self::new(name);
        filter.configure_strict(settings)?;
        Ok(filter)
    }
}

impl Filter for BlockFilter {
    fn base(&self) -> &FilterBase {
        &self.base
    }

    fn kind(&self) -> FilterKind {
        FilterKind::Block
    }

    fn evaluate(&self, _event: &Event, _ctx: &FilterContext) -> Result<FilterResult, FilterError> {
        Ok(FilterResult::suppress(read_lock(&self.reason).as_str()))
    }

    fn validate(&self, settings: &Settings) -> ValidationResult {
        parse_reason(settings, Self::DEFAULT_REASON).1
    }

    fn apply(&self, settings: &Settings) -> Result<(), FilterError> {
        *write_lock(&self.reason) = parse_reason(settings, Self::DEFAULT_REASON).0;
        Ok(())
    }
}

/// 모든 이벤트를 허용
#[derive(Debug)]
pub struct PassThroughFilter {
    base: FilterBase,
    reason: RwLock<String>,
}

impl PassThroughFilter {
    const DEFAULT_REASON: &'static str = "pass-through";

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: FilterBase::new(name, FilterKind::PassThrough.default_priority()),
            reason: RwLock::new(Self::DEFAULT_REASON.to_owned()),
        }
    }

    pub fn from_settings(name: impl Into<String>, settings: &Settings) -> Result<Self, FilterError> {
        let filter = Self::new(name);
        filter.configure_strict(settings)?;
        Ok(filter)
    }
}

impl Filter for PassThroughFilter {
    fn base(&self) -> &FilterBase {
        &self.base
    }

    fn kind(&self) -> FilterKind {
        FilterKind::PassThrough
    }

    fn evaluate(&self, _event: &Event, _ctx: &FilterContext) -> Result<FilterResult, FilterError> {
        Ok(FilterResult::allow(read_lock(&self.reason).as_str()))
    }

    fn validate(&self, settings: &Settings) -> ValidationResult {
        parse_reason(settings, Self::DEFAULT_REASON).1
    }

    fn apply(&self, settings: &Settings) -> Result<(), FilterError> {
        *write_lock(&self.reason) = parse_reason(settings, Self::DEFAULT_REASON).0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterDecision;
    use crate::filter::test_support::alert;
    use ironsieve_core::types::Severity;

    #[test]
    fn block_and_pass_through() {
        let event = alert(Severity::Critical, "Db", "down");
        let ctx = FilterContext::default();
        assert_eq!(
            BlockFilter::new("b").process(&event, &ctx).decision,
            FilterDecision::Suppress
        );
        assert_eq!(
            PassThroughFilter::new("p").process(&event, &ctx).decision,
            FilterDecision::Allow
        );
    }

    #[test]
    fn custom_reason() {
        let filter =
            BlockFilter::from_settings("b", &Settings::new().with("reason", "maintenance")).unwrap();
        let result = filter.process(&alert(Severity::Info, "x", "y"), &FilterContext::default());
        assert_eq!(result.reason, "maintenance");
    }
}
