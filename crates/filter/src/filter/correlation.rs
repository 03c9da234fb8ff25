//! 상관 필터 -- 상관 ID, 사용자 ID, 세션 ID를 패턴 목록과 대조
//!
//! 사용자/세션 ID는 이벤트 속성(알림 context, 로그 properties)에서 꺼냅니다.
//! 설정된 목록마다 해당 값이 한 패턴 이상에 매칭되어야 "일치"로 봅니다 (목록 간 AND).
//!
//! # 설정 키
//! - `correlation_patterns`, `user_id_patterns`, `session_id_patterns`: 와일드카드 목록
//! - `mode`: `include`(일치 시 통과) | `exclude`(일치 시 억제)
//! - `allow_empty_correlation`: 상관 ID가 빈 이벤트 통과 여부 (기본 true)
//! - `max_related_in_window`: 최근 윈도우에 같은 상관 ID 이벤트가 이 수 이상이면 억제 (0 = 끔)
//! - `user_id_property`, `session_id_property`: 속성 키 (기본 `user_id`, `session_id`)

use std::collections::BTreeMap;
use std::sync::RwLock;

use ironsieve_core::event::Event;
use ironsieve_core::settings::{ConfigValue, Settings};
use tracing::debug;

use super::{
    Filter, FilterBase, FilterContext, FilterKind, FilterResult, SettingsReader, ValidationResult,
    read_lock, write_lock,
};
use crate::error::FilterError;
use crate::pattern::{MatchMode, PatternMatcher};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum CorrelationMode {
    #[default]
    Include,
    Exclude,
}

impl CorrelationMode {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "include" | "whitelist" => Some(Self::Include),
            "exclude" | "blacklist" => Some(Self::Exclude),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct CorrelationConfig {
    correlation_patterns: Vec<String>,
    user_id_patterns: Vec<String>,
    session_id_patterns: Vec<String>,
    mode: CorrelationMode,
    allow_empty_correlation: bool,
    max_related_in_window: u64,
    user_id_property: String,
    session_id_property: String,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            correlation_patterns: Vec::new(),
            user_id_patterns: Vec::new(),
            session_id_patterns: Vec::new(),
            mode: CorrelationMode::Include,
            allow_empty_correlation: true,
            max_related_in_window: 0,
            user_id_property: "user_id".to_owned(),
            session_id_property: "session_id".to_owned(),
        }
    }
}

impl CorrelationConfig {
    fn parse(settings: &Settings) -> (Self, ValidationResult) {
        let mut r = SettingsReader::new(settings);
        let config = Self {
            correlation_patterns: r.list("correlation_patterns"),
            user_id_patterns: r.list("user_id_patterns"),
            session_id_patterns: r.list("session_id_patterns"),
            mode: r.enum_value("mode", "include|exclude", CorrelationMode::Include, CorrelationMode::parse),
            allow_empty_correlation: r.bool("allow_empty_correlation", true),
            max_related_in_window: r.non_negative("max_related_in_window", 0),
            user_id_property: r.string("user_id_property", "user_id"),
            session_id_property: r.string("session_id_property", "session_id"),
        };
        if config.user_id_property.is_empty() || config.session_id_property.is_empty() {
            r.error("property keys must not be empty");
        }
        (config, r.finish())
    }

    fn has_patterns(&self) -> bool {
        !(self.correlation_patterns.is_empty()
            && self.user_id_patterns.is_empty()
            && self.session_id_patterns.is_empty())
    }
}

/// 상관/사용자/세션 필터
#[derive(Debug)]
pub struct CorrelationFilter {
    base: FilterBase,
    config: RwLock<CorrelationConfig>,
    matcher: PatternMatcher,
}

impl CorrelationFilter {
    /// 모든 이벤트를 통과시키는 필터를 생성합니다.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: FilterBase::new(name, FilterKind::Correlation.default_priority()),
            config: RwLock::new(CorrelationConfig::default()),
            matcher: PatternMatcher::new(),
        }
    }

    /// 설정으로 필터를 생성합니다.
    pub fn from_settings(name: impl Into<String>, settings: &Settings) -> Result<Self, FilterError> {
        let filter = Self::new(name);
        filter.configure_strict(settings)?;
        Ok(filter)
    }

    /// 패턴 목록이 비어 있으면 조건 없음(true), 아니면 한 패턴 이상 매칭
    fn list_matches(&self, value: Option<&str>, patterns: &[String]) -> bool {
        if patterns.is_empty() {
            return true;
        }
        match value {
            Some(v) if !v.is_empty() => patterns
                .iter()
                .any(|p| self.matcher.matches(v, p, true, MatchMode::Wildcard)),
            _ => false,
        }
    }
}

impl Filter for CorrelationFilter {
    fn base(&self) -> &FilterBase {
        &self.base
    }

    fn kind(&self) -> FilterKind {
        FilterKind::Correlation
    }

    fn evaluate(&self, event: &Event, ctx: &FilterContext) -> Result<FilterResult, FilterError> {
        let config = read_lock(&self.config);
        // 이벤트에 ID가 없으면 호출자가 넘긴 ID를 사용
        let correlation_id = match event.correlation_id() {
            "" => ctx.correlation_id.as_str(),
            id => id,
        };

        if correlation_id.is_empty() && !config.allow_empty_correlation {
            return Ok(FilterResult::suppress("empty correlation id"));
        }

        if config.max_related_in_window > 0 && !correlation_id.is_empty() {
            let related = ctx
                .recent_events
                .iter()
                .filter(|e| e.correlation_id() == correlation_id)
                .count() as u64;
            if related >= config.max_related_in_window {
                debug!(filter = %self.name(), correlation_id, related, "correlated burst suppressed");
                return Ok(FilterResult::suppress(format!(
                    "{related} related events already in window for '{correlation_id}'"
                ))
                .with_metadata("related", related as i64));
            }
        }

        if !config.has_patterns() {
            return Ok(FilterResult::allow("no correlation patterns"));
        }

        let cid = (!correlation_id.is_empty()).then_some(correlation_id);
        let matched = self.list_matches(cid, &config.correlation_patterns)
            && self.list_matches(event.property(&config.user_id_property), &config.user_id_patterns)
            && self.list_matches(
                event.property(&config.session_id_property),
                &config.session_id_patterns,
            );

        Ok(match (config.mode, matched) {
            (CorrelationMode::Include, true) => FilterResult::allow("correlation matched"),
            (CorrelationMode::Include, false) => FilterResult::suppress("correlation not matched"),
            (CorrelationMode::Exclude, true) => FilterResult::suppress("correlation excluded"),
            (CorrelationMode::Exclude, false) => FilterResult::allow("correlation not excluded"),
        })
    }

    fn validate(&self, settings: &Settings) -> ValidationResult {
        CorrelationConfig::parse(settings).1
    }

    fn apply(&self, settings: &Settings) -> Result<(), FilterError> {
        let (config, _) = CorrelationConfig::parse(settings);
        *write_lock(&self.config) = config;
        Ok(())
    }

    fn details(&self) -> BTreeMap<String, ConfigValue> {
        let config = read_lock(&self.config);
        BTreeMap::from([(
            "max_related_in_window".to_owned(),
            ConfigValue::from(config.max_related_in_window),
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterDecision;
    use ironsieve_core::types::{Alert, LogEntry, Severity};
    use std::sync::Arc;

    fn event(cid: &str, user: Option<&str>) -> Event {
        let mut entry = LogEntry::new(Severity::Info, "app", "m").with_correlation_id(cid);
        if let Some(user) = user {
            entry = entry.with_property("user_id", user);
        }
        entry.into()
    }

    #[test]
    fn empty_correlation_policy() {
        let filter = CorrelationFilter::from_settings(
            "c",
            &Settings::new().with("allow_empty_correlation", false),
        )
        .unwrap();
        let ctx = FilterContext::default();
        assert_eq!(filter.process(&event("", None), &ctx).decision, FilterDecision::Suppress);
        assert_eq!(filter.process(&event("req-1", None), &ctx).decision, FilterDecision::Allow);
    }

    #[test]
    fn caller_correlation_id_fills_in_for_missing_event_id() {
        let filter = CorrelationFilter::from_settings(
            "c",
            &Settings::new()
                .with("allow_empty_correlation", false)
                .with("correlation_patterns", "batch-*"),
        )
        .unwrap();
        let ctx = FilterContext::new("batch-7");
        assert_eq!(filter.process(&event("", None), &ctx).decision, FilterDecision::Allow);
        // 이벤트 자체 ID가 우선
        assert_eq!(
            filter.process(&event("req-1", None), &ctx).decision,
            FilterDecision::Suppress
        );
        assert_eq!(
            filter.process(&event("", None), &FilterContext::default()).decision,
            FilterDecision::Suppress
        );
    }

    #[test]
    fn user_and_correlation_lists_must_both_match() {
        let filter = CorrelationFilter::from_settings(
            "c",
            &Settings::new()
                .with("correlation_patterns", "req-*")
                .with("user_id_patterns", vec!["admin", "ops-*"]),
        )
        .unwrap();
        let ctx = FilterContext::default();
        assert_eq!(
            filter.process(&event("req-1", Some("ops-7")), &ctx).decision,
            FilterDecision::Allow
        );
        assert_eq!(
            filter.process(&event("req-1", Some("guest")), &ctx).decision,
            FilterDecision::Suppress
        );
        assert_eq!(
            filter.process(&event("job-1", Some("admin")), &ctx).decision,
            FilterDecision::Suppress
        );
    }

    #[test]
    fn exclude_mode_reads_alert_context() {
        let filter = CorrelationFilter::from_settings(
            "c",
            &Settings::new()
                .with("mode", "exclude")
                .with("session_id_patterns", "test-*"),
        )
        .unwrap();
        let alert: Event = Alert::new(Severity::Error, "Db", "down")
            .with_context("session_id", "test-42")
            .into();
        assert_eq!(
            filter.process(&alert, &FilterContext::default()).decision,
            FilterDecision::Suppress
        );
    }

    #[test]
    fn related_events_in_window_are_capped() {
        let filter = CorrelationFilter::from_settings(
            "c",
            &Settings::new().with("max_related_in_window", 2_i64),
        )
        .unwrap();
        let recent = vec![Arc::new(event("req-1", None)), Arc::new(event("req-2", None))];
        let ctx = FilterContext::default().with_recent_events(recent.clone());
        assert_eq!(filter.process(&event("req-1", None), &ctx).decision, FilterDecision::Allow);

        let mut more = recent;
        more.push(Arc::new(event("req-1", None)));
        let ctx = FilterContext::default().with_recent_events(more);
        assert_eq!(
            filter.process(&event("req-1", None), &ctx).decision,
            FilterDecision::Suppress
        );
    }
}
