//! 내용 필터 -- 메시지 본문을 순서 있는 패턴 목록과 대조
//!
//! # 설정 키
//! - `mode`: `include`(매칭 시 통과) | `exclude`(매칭 시 억제) | `redact`(매칭 부분 치환)
//! - `patterns`: 패턴 목록. 앞의 패턴이 먼저 검사되며 첫 매칭이 결정합니다.
//! - `match_mode`: `substring`(기본) | `wildcard` | `regex`
//! - `case_sensitive`: 기본 false
//! - `replacement`: redact 모드의 치환 문자열 (기본 `***`)
//!
//! 패턴 목록이 비어 있으면 모든 이벤트를 통과시킵니다.

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

/// 기본 치환 문자열
pub const DEFAULT_REPLACEMENT: &str = "***";

/// 매칭 결과 적용 방식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContentMode {
    /// 매칭되는 이벤트만 통과
    Include,
    /// 매칭되는 이벤트를 억제
    #[default]
    Exclude,
    /// 매칭된 부분을 치환한 이벤트로 통과
    Redact,
}

impl ContentMode {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "include" => Some(Self::Include),
            "exclude" => Some(Self::Exclude),
            "redact" | "mask" => Some(Self::Redact),
            _ => None,
        }
    }
}

/// 본문 매칭 방식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum ContentMatch {
    #[default]
    Substring,
    Wildcard,
    Regex,
}

impl ContentMatch {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "substring" | "literal" | "contains" => Some(Self::Substring),
            "wildcard" | "glob" => Some(Self::Wildcard),
            "regex" | "regexp" => Some(Self::Regex),
            _ => None,
        }
    }

    fn mode(self) -> MatchMode {
        match self {
            Self::Substring => MatchMode::Literal,
            Self::Wildcard => MatchMode::Wildcard,
            Self::Regex => MatchMode::Regex,
        }
    }
}

#[derive(Debug, Clone)]
struct ContentConfig {
    mode: ContentMode,
    patterns: Vec<String>,
    match_mode: ContentMatch,
    case_sensitive: bool,
    replacement: String,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            mode: ContentMode::Exclude,
            patterns: Vec::new(),
            match_mode: ContentMatch::Substring,
            case_sensitive: false,
            replacement: DEFAULT_REPLACEMENT.to_owned(),
        }
    }
}

impl ContentConfig {
    fn parse(settings: &Settings) -> (Self, ValidationResult) {
        let mut r = SettingsReader::new(settings);
        let config = Self {
            mode: r.enum_value("mode", "include|exclude|redact", ContentMode::Exclude, ContentMode::parse),
            patterns: r.list("patterns"),
            match_mode: r.enum_value(
                "match_mode",
                "substring|wildcard|regex",
                ContentMatch::Substring,
                ContentMatch::parse,
            ),
            case_sensitive: r.bool("case_sensitive", false),
            replacement: r.string("replacement", DEFAULT_REPLACEMENT),
        };

        let mode = config.match_mode.mode();
        for pattern in &config.patterns {
            if pattern.is_empty() {
                r.warn("patterns: empty pattern never matches");
            } else if let Err(e) = PatternMatcher::check(pattern, mode) {
                r.error(format!("patterns: invalid regex '{pattern}': {e}"));
            }
        }
        if config.mode == ContentMode::Redact && config.match_mode == ContentMatch::Wildcard {
            r.warn("redact with wildcard patterns replaces the whole message");
        }

        (config, r.finish())
    }

    fn first_match<'a>(&'a self, message: &str, matcher: &PatternMatcher) -> Option<&'a str> {
        self.patterns
            .iter()
            .find(|p| match self.match_mode {
                ContentMatch::Substring => matcher.contains(message, p, self.case_sensitive),
                other => matcher.matches(message, p, self.case_sensitive, other.mode()),
            })
            .map(String::as_str)
    }
}

/// 메시지 본문 필터
#[derive(Debug)]
pub struct ContentFilter {
    base: FilterBase,
    config: RwLock<ContentConfig>,
    matcher: PatternMatcher,
}

impl ContentFilter {
    /// 패턴이 없는 (모두 통과) 필터를 생성합니다.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: FilterBase::new(name, FilterKind::Content.default_priority()),
            config: RwLock::new(ContentConfig::default()),
            matcher: PatternMatcher::new(),
        }
    }

    /// 설정으로 필터를 생성합니다.
    pub fn from_settings(name: impl Into<String>, settings: &Settings) -> Result<Self, FilterError> {
        let filter = Self::new(name);
        filter.configure_strict(settings)?;
        Ok(filter)
    }

    fn redact(&self, event: &Event, config: &ContentConfig) -> FilterResult {
        let mode = config.match_mode.mode();
        let mut message = event.message().to_owned();
        let mut hits = 0_usize;
        for pattern in &config.patterns {
            if let Some(replaced) = self.matcher.replace_all(
                &message,
                pattern,
                config.case_sensitive,
                mode,
                &config.replacement,
            ) {
                message = replaced;
                hits += 1;
            }
        }

        if hits == 0 {
            FilterResult::allow("nothing to redact")
        } else {
            debug!(filter = %self.name(), patterns = hits, "message redacted");
            FilterResult::modify(
                event.with_message(message),
                format!("redacted {hits} pattern(s)"),
            )
            .with_metadata("redacted_patterns", hits)
        }
    }
}

impl Filter for ContentFilter {
    fn base(&self) -> &FilterBase {
        &self.base
    }

    fn kind(&self) -> FilterKind {
        FilterKind::Content
    }

    fn evaluate(&self, event: &Event, _ctx: &FilterContext) -> Result<FilterResult, FilterError> {
        let config = read_lock(&self.config);
        if config.patterns.is_empty() {
            return Ok(FilterResult::allow("no content patterns"));
        }
        if config.mode == ContentMode::Redact {
            return Ok(self.redact(event, &config));
        }

        let matched = config.first_match(event.message(), &self.matcher);
        let result = match (config.mode, matched) {
            (ContentMode::Include, Some(p)) => FilterResult::allow(format!("content matched '{p}'")),
            (ContentMode::Include, None) => FilterResult::suppress("content matched no pattern"),
            (_, Some(p)) => FilterResult::suppress(format!("content matched '{p}'")),
            (_, None) => FilterResult::allow("content matched no pattern"),
        };
        if !result.decision.is_pass() {
            debug!(filter = %self.name(), reason = %result.reason, "event suppressed by content");
        }
        Ok(result)
    }

    fn validate(&self, settings: &Settings) -> ValidationResult {
        ContentConfig::parse(settings).1
    }

    fn apply(&self, settings: &Settings) -> Result<(), FilterError> {
        let (config, _) = ContentConfig::parse(settings);
        *write_lock(&self.config) = config;
        self.matcher.clear_cache();
        Ok(())
    }

    fn details(&self) -> BTreeMap<String, ConfigValue> {
        BTreeMap::from([(
            "patterns".to_owned(),
            ConfigValue::from(read_lock(&self.config).patterns.len()),
        )])
    }
}
