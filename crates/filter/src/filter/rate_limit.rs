//! 레이트 리밋 필터 -- 소스 키별 버킷으로 이벤트 유입량 제한
//!
//! # 설정 키
//! - `strategy`: `token_bucket`(기본) | `fixed_window` | `sliding_window` | `leaky_bucket`
//! - `limit`, `window_secs`, `burst_size` (기본 `limit`)
//! - `source_patterns`: 비어 있지 않으면 매칭되는 소스에만 적용
//! - `key_by`: `source`(소스마다 버킷) | `pattern`(매칭된 패턴마다 버킷)
//! - `on_limit`: `suppress`(기본) | `defer`
//! - `idle_timeout_secs`, `cleanup_interval_secs`, `max_buckets`

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use ironsieve_core::clock::{Clock, SystemClock};
use ironsieve_core::event::Event;
use ironsieve_core::metrics as m;
use ironsieve_core::settings::{ConfigValue, Settings};
use metrics::{counter, gauge};
use tracing::debug;

use super::{
    Filter, FilterBase, FilterContext, FilterKind, FilterResult, SettingsReader, ValidationResult,
    read_lock, write_lock,
};
use crate::error::FilterError;
use crate::pattern::{MatchMode, PatternMatcher};
use crate::ratelimit::{
    DEFAULT_CLEANUP_INTERVAL, DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_BUCKETS, KeyedRateLimiter,
    RateLimitConfig, RateLimitStrategy,
};

/// 한도 초과 시 판정
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OnLimit {
    /// 억제
    #[default]
    Suppress,
    /// 보류
    Defer,
}

impl OnLimit {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "suppress" | "drop" => Some(Self::Suppress),
            "defer" | "delay" => Some(Self::Defer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum KeyBy {
    #[default]
    Source,
    Pattern,
}

impl KeyBy {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "source" => Some(Self::Source),
            "pattern" | "group" => Some(Self::Pattern),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct RateLimitSettings {
    limit: RateLimitConfig,
    source_patterns: Vec<String>,
    key_by: KeyBy,
    on_limit: OnLimit,
    idle_timeout: Duration,
    cleanup_interval: Duration,
    max_buckets: usize,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            limit: RateLimitConfig::default(),
            source_patterns: Vec::new(),
            key_by: KeyBy::Source,
            on_limit: OnLimit::Suppress,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            max_buckets: DEFAULT_MAX_BUCKETS,
        }
    }
}

impl RateLimitSettings {
    fn parse(settings: &Settings) -> (Self, ValidationResult) {
        let mut r = SettingsReader::new(settings);
        let defaults = RateLimitConfig::default();
        let strategy = r.enum_value(
            "strategy",
            "token_bucket|fixed_window|sliding_window|leaky_bucket",
            defaults.strategy,
            RateLimitStrategy::from_str_loose,
        );
        let limit = r.non_negative("limit", defaults.limit);
        let window = r.duration_secs("window_secs", defaults.window);
        let burst_size = r.non_negative("burst_size", limit);

        if limit == 0 {
            r.warn("limit is 0, every matching event is rejected");
        }
        if window.is_zero() {
            r.error("window_secs must be greater than 0");
        }
        if burst_size < limit && strategy != RateLimitStrategy::FixedWindow {
            r.warn(format!("burst_size {burst_size} is smaller than limit {limit}"));
        }

        let max_buckets = r.non_negative("max_buckets", DEFAULT_MAX_BUCKETS as u64);
        if max_buckets == 0 {
            r.error("max_buckets must be greater than 0");
        }

        let config = Self {
            limit: RateLimitConfig::new(strategy, limit, window).with_burst_size(burst_size),
            source_patterns: r.list("source_patterns"),
            key_by: r.enum_value("key_by", "source|pattern", KeyBy::Source, KeyBy::parse),
            on_limit: r.enum_value("on_limit", "suppress|defer", OnLimit::Suppress, OnLimit::parse),
            idle_timeout: r.duration_secs("idle_timeout_secs", DEFAULT_IDLE_TIMEOUT),
            cleanup_interval: r.duration_secs("cleanup_interval_secs", DEFAULT_CLEANUP_INTERVAL),
            max_buckets: usize::try_from(max_buckets).unwrap_or(usize::MAX),
        };
        if config.key_by == KeyBy::Pattern && config.source_patterns.is_empty() {
            r.warn("key_by = pattern without source_patterns, all sources share one bucket");
        }

        (config, r.finish())
    }

    fn limiter(&self) -> KeyedRateLimiter {
        KeyedRateLimiter::new(self.limit)
            .with_idle_timeout(self.idle_timeout)
            .with_cleanup_interval(self.cleanup_interval)
            .with_max_buckets(self.max_buckets)
    }
}

/// 레이트 리밋 필터
pub struct RateLimitFilter {
    base: FilterBase,
    config: RwLock<RateLimitSettings>,
    limiter: RwLock<Arc<KeyedRateLimiter>>,
    matcher: PatternMatcher,
    clock: Arc<dyn Clock>,
    dropped: AtomicU64,
}

impl RateLimitFilter {
    /// 기본 한도 (60초당 100건, 토큰 버킷) 필터를 생성합니다.
    pub fn new(name: impl Into<String>) -> Self {
        let config = RateLimitSettings::default();
        Self {
            base: FilterBase::new(name, FilterKind::RateLimit.default_priority()),
            limiter: RwLock::new(Arc::new(config.limiter())),
            config: RwLock::new(config),
            matcher: PatternMatcher::new(),
            clock: Arc::new(SystemClock),
            dropped: AtomicU64::new(0),
        }
    }

    /// 설정으로 필터를 생성합니다.
    pub fn from_settings(name: impl Into<String>, settings: &Settings) -> Result<Self, FilterError> {
        let filter = Self::new(name);
        filter.configure_strict(settings)?;
        Ok(filter)
    }

    /// 시계를 교체합니다.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// 한도 초과로 거부된 이벤트 수
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// 현재 버킷 수
    pub fn bucket_count(&self) -> usize {
        read_lock(&self.limiter).bucket_count()
    }

    fn matching_pattern<'a>(&self, config: &'a RateLimitSettings, source: &str) -> Option<&'a str> {
        config
            .source_patterns
            .iter()
            .find(|p| self.matcher.matches(source, p, true, MatchMode::Wildcard))
            .map(String::as_str)
    }
}

impl fmt::Debug for RateLimitFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitFilter")
            .field("base", &self.base)
            .field("config", &*read_lock(&self.config))
            .field("dropped", &self.dropped())
            .finish_non_exhaustive()
    }
}

impl Filter for RateLimitFilter {
    fn base(&self) -> &FilterBase {
        &self.base
    }

    fn kind(&self) -> FilterKind {
        FilterKind::RateLimit
    }

    fn can_handle(&self, event: &Event) -> bool {
        let config = read_lock(&self.config);
        config.source_patterns.is_empty()
            || self.matching_pattern(&config, event.source()).is_some()
    }

    fn evaluate(&self, event: &Event, _ctx: &FilterContext) -> Result<FilterResult, FilterError> {
        let config = read_lock(&self.config);
        let key = match config.key_by {
            KeyBy::Source => event.source(),
            KeyBy::Pattern => self
                .matching_pattern(&config, event.source())
                .unwrap_or("*"),
        };

        let limiter = Arc::clone(&read_lock(&self.limiter));
        let allowed = limiter.try_acquire(key, self.clock.now());
        gauge!(m::RATE_LIMIT_BUCKETS, m::LABEL_FILTER => self.name().to_owned())
            .set(limiter.bucket_count() as f64);

        if allowed {
            return Ok(FilterResult::allow(format!("within rate limit for '{key}'")));
        }

        let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        counter!(m::RATE_LIMIT_DROPPED_TOTAL, m::LABEL_FILTER => self.name().to_owned()).increment(1);
        debug!(filter = %self.name(), key, dropped, "rate limit exceeded");

        let reason = format!(
            "rate limit {} per {}s exceeded for '{key}'",
            config.limit.limit,
            config.limit.window.as_secs_f64()
        );
        let result = match config.on_limit {
            OnLimit::Suppress => FilterResult::suppress(reason),
            OnLimit::Defer => FilterResult::defer(reason),
        };
        Ok(result.with_metadata("dropped", dropped))
    }

    fn validate(&self, settings: &Settings) -> ValidationResult {
        RateLimitSettings::parse(settings).1
    }

    fn apply(&self, settings: &Settings) -> Result<(), FilterError> {
        let (config, _) = RateLimitSettings::parse(settings);
        let mut current = write_lock(&self.config);
        *write_lock(&self.limiter) = Arc::new(config.limiter());
        *current = config;
        self.matcher.clear_cache();
        Ok(())
    }

    fn reset_state(&self) {
        read_lock(&self.limiter).reset();
        self.dropped.store(0, Ordering::Relaxed);
    }

    fn details(&self) -> BTreeMap<String, ConfigValue> {
        let config = read_lock(&self.config);
        let limiter = Arc::clone(&read_lock(&self.limiter));
        let (total, suppressed) = limiter.totals();
        BTreeMap::from([
            ("strategy".to_owned(), ConfigValue::from(config.limit.strategy.as_str())),
            ("buckets".to_owned(), ConfigValue::from(limiter.bucket_count())),
            ("dropped".to_owned(), ConfigValue::from(self.dropped())),
            ("bucket_total".to_owned(), ConfigValue::from(total)),
            ("bucket_suppressed".to_owned(), ConfigValue::from(suppressed)),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterDecision;
    use crate::filter::test_support::log;
    use ironsieve_core::clock::ManualClock;
    use ironsieve_core::types::Severity;

    fn filter(settings: Settings) -> (RateLimitFilter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::from_epoch_secs(1_700_000_040));
        let filter = RateLimitFilter::from_settings("rl", &settings)
            .unwrap()
            .with_clock(clock.clone());
        (filter, clock)
    }

    fn decide(filter: &RateLimitFilter, source: &str) -> FilterDecision {
        filter
            .process(&log(Severity::Info, source, "m"), &FilterContext::default())
            .decision
    }

    #[test]
    fn three_per_minute_token_bucket() {
        let (filter, clock) = filter(
            Settings::new()
                .with("limit", 3_i64)
                .with("window_secs", 60_i64)
                .with("strategy", "TokenBucket"),
        );
        for _ in 0..3 {
            assert_eq!(decide(&filter, "App"), FilterDecision::Allow);
        }
        assert_eq!(decide(&filter, "App"), FilterDecision::Suppress);
        assert_eq!(filter.dropped(), 1);

        clock.advance(Duration::from_secs(60));
        assert_eq!(decide(&filter, "App"), FilterDecision::Allow);
    }

    #[test]
    fn sources_get_separate_buckets() {
        let (filter, _) = filter(Settings::new().with("limit", 1_i64));
        assert_eq!(decide(&filter, "A"), FilterDecision::Allow);
        assert_eq!(decide(&filter, "B"), FilterDecision::Allow);
        assert_eq!(decide(&filter, "A"), FilterDecision::Suppress);
        assert_eq!(filter.bucket_count(), 2);
    }

    #[test]
    fn patterns_limit_scope_and_group_keys() {
        let (filter, _) = filter(
            Settings::new()
                .with("limit", 1_i64)
                .with("source_patterns", "Net.*")
                .with("key_by", "pattern"),
        );
        assert_eq!(decide(&filter, "Net.Tcp"), FilterDecision::Allow);
        // 같은 패턴 그룹이므로 버킷 공유
        assert_eq!(decide(&filter, "Net.Udp"), FilterDecision::Suppress);
        // 패턴 밖 소스는 적용 대상 아님
        assert_eq!(decide(&filter, "Db"), FilterDecision::Allow);
        assert_eq!(decide(&filter, "Db"), FilterDecision::Allow);
    }

    #[test]
    fn defer_on_limit() {
        let (filter, _) = filter(
            Settings::new()
                .with("limit", 1_i64)
                .with("on_limit", "defer"),
        );
        decide(&filter, "A");
        let result = filter.process(&log(Severity::Info, "A", "m"), &FilterContext::default());
        assert_eq!(result.decision, FilterDecision::Defer);
        assert_eq!(filter.statistics().deferred, 1);
    }

    #[test]
    fn reset_clears_buckets_and_dropped() {
        let (filter, _) = filter(Settings::new().with("limit", 1_i64));
        decide(&filter, "A");
        decide(&filter, "A");
        filter.reset();
        assert_eq!(filter.dropped(), 0);
        assert_eq!(filter.bucket_count(), 0);
        assert_eq!(decide(&filter, "A"), FilterDecision::Allow);
    }

    #[test]
    fn invalid_window_is_rejected() {
        let result = RateLimitFilter::new("rl").validate(
            &Settings::new()
                .with("window_secs", 0_i64)
                .with("limit", -5_i64),
        );
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn huge_window_is_reported_not_fatal() {
        let result =
            RateLimitFilter::new("rl").validate(&Settings::new().with("window_secs", 1e30_f64));
        assert!(!result.is_valid);
        assert!(result.errors[0].contains("window_secs"));
    }
}
