//! 소스 필터 -- 이벤트 소스 이름의 화이트리스트/블랙리스트
//!
//! # 설정 키
//! - `mode`: `whitelist` | `blacklist` (기본 whitelist)
//! - `sources`: 정확한 소스 이름 목록. `hierarchical`이면 `이름.` 하위 소스도 포함
//! - `patterns`: 와일드카드 패턴 목록 (`use_regex`이면 정규식)
//! - `allow_empty_source`: 소스가 빈 이벤트 통과 여부 (기본 true)
//! - `case_sensitive`: 기본 false
//!
//! 이름과 패턴이 모두 비어 있으면 모든 이벤트를 통과시킵니다.

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

/// 목록 적용 방식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SourceMode {
    /// 목록에 있는 소스만 통과
    #[default]
    Whitelist,
    /// 목록에 있는 소스를 억제
    Blacklist,
}

impl SourceMode {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "whitelist" | "allow" | "include" => Some(Self::Whitelist),
            "blacklist" | "block" | "deny" | "exclude" => Some(Self::Blacklist),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct SourceConfig {
    mode: SourceMode,
    sources: Vec<String>,
    patterns: Vec<String>,
    use_regex: bool,
    allow_empty_source: bool,
    case_sensitive: bool,
    hierarchical: bool,
}

impl SourceConfig {
    fn parse(settings: &Settings) -> (Self, ValidationResult) {
        let mut r = SettingsReader::new(settings);
        let config = Self {
            mode: r.enum_value("mode", "whitelist|blacklist", SourceMode::Whitelist, SourceMode::parse),
            sources: r.list("sources"),
            patterns: r.list("patterns"),
            use_regex: r.bool("use_regex", false),
            allow_empty_source: r.bool("allow_empty_source", true),
            case_sensitive: r.bool("case_sensitive", false),
            hierarchical: r.bool("hierarchical", false),
        };

        let mode = config.pattern_mode();
        for pattern in &config.patterns {
            if pattern.is_empty() {
                r.warn("patterns: empty pattern never matches");
            } else if let Err(e) = PatternMatcher::check(pattern, mode) {
                r.error(format!("patterns: invalid regex '{pattern}': {e}"));
            }
        }
        if config.sources.is_empty() && config.patterns.is_empty() {
            r.warn("no sources or patterns configured, every event passes");
        }

        (config, r.finish())
    }

    fn pattern_mode(&self) -> MatchMode {
        if self.use_regex {
            MatchMode::Regex
        } else {
            MatchMode::Wildcard
        }
    }

    fn name_mode(&self) -> MatchMode {
        if self.hierarchical {
            MatchMode::Hierarchical
        } else {
            MatchMode::Literal
        }
    }

    /// 소스와 일치하는 첫 항목
    fn find_match<'a>(&'a self, source: &str, matcher: &PatternMatcher) -> Option<&'a str> {
        let name_mode = self.name_mode();
        let pattern_mode = self.pattern_mode();
        self.sources
            .iter()
            .find(|s| matcher.matches(source, s, self.case_sensitive, name_mode))
            .or_else(|| {
                self.patterns
                    .iter()
                    .find(|p| matcher.matches(source, p, self.case_sensitive, pattern_mode))
            })
            .map(String::as_str)
    }
}

/// 소스 이름 필터
#[derive(Debug)]
pub struct SourceFilter {
    base: FilterBase,
    config: RwLock<SourceConfig>,
    matcher: PatternMatcher,
}

impl SourceFilter {
    /// 모든 소스를 통과시키는 필터를 생성합니다.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: FilterBase::new(name, FilterKind::Source.default_priority()),
            config: RwLock::new(SourceConfig {
                allow_empty_source: true,
                ..SourceConfig::default()
            }),
            matcher: PatternMatcher::new(),
        }
    }

    /// 설정으로 필터를 생성합니다.
    pub fn from_settings(name: impl Into<String>, settings: &Settings) -> Result<Self, FilterError> {
        let filter = Self::new(name);
        filter.configure_strict(settings)?;
        Ok(filter)
    }
}

impl Filter for SourceFilter {
    fn base(&self) -> &FilterBase {
        &self.base
    }

    fn kind(&self) -> FilterKind {
        FilterKind::Source
    }

    fn evaluate(&self, event: &Event, _ctx: &FilterContext) -> Result<FilterResult, FilterError> {
        let config = read_lock(&self.config);
        let source = event.source();

        if source.is_empty() {
            return Ok(if config.allow_empty_source {
                FilterResult::allow("empty source allowed")
            } else {
                FilterResult::suppress("empty source")
            });
        }
        if config.sources.is_empty() && config.patterns.is_empty() {
            return Ok(FilterResult::allow("no source rules"));
        }

        let matched = config.find_match(source, &self.matcher);
        let result = match (config.mode, matched) {
            (SourceMode::Whitelist, Some(entry)) => {
                FilterResult::allow(format!("source '{source}' whitelisted by '{entry}'"))
            }
            (SourceMode::Whitelist, None) => {
                FilterResult::suppress(format!("source '{source}' not whitelisted"))
            }
            (SourceMode::Blacklist, Some(entry)) => {
                FilterResult::suppress(format!("source '{source}' blacklisted by '{entry}'"))
            }
            (SourceMode::Blacklist, None) => {
                FilterResult::allow(format!("source '{source}' not blacklisted"))
            }
        };
        if !result.decision.is_pass() {
            debug!(filter = %self.name(), source, "event suppressed by source");
        }
        Ok(result)
    }

    fn validate(&self, settings: &Settings) -> ValidationResult {
        SourceConfig::parse(settings).1
    }

    fn apply(&self, settings: &Settings) -> Result<(), FilterError> {
        let (config, _) = SourceConfig::parse(settings);
        *write_lock(&self.config) = config;
        self.matcher.clear_cache();
        Ok(())
    }

    fn details(&self) -> BTreeMap<String, ConfigValue> {
        let config = read_lock(&self.config);
        BTreeMap::from([
            ("sources".to_owned(), ConfigValue::from(config.sources.len())),
            ("patterns".to_owned(), ConfigValue::from(config.patterns.len())),
            ("cached_regexes".to_owned(), ConfigValue::from(self.matcher.cached_len())),
        ])
    }
}
