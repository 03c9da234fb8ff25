//! 태그 필터 -- 알림 태그 / 로그 채널을 와일드카드 목록과 대조
//!
//! # 설정 키
//! - `mode`: `allow`(목록의 태그만 통과) | `block`(목록의 태그 억제)
//! - `tags`: 와일드카드 패턴 목록
//! - `case_sensitive`: 기본 false
//! - `allow_empty_tag`: 태그가 빈 이벤트 통과 여부 (기본 true)

use std::sync::RwLock;

use ironsieve_core::event::Event;
use ironsieve_core::settings::Settings;

use super::{
    Filter, FilterBase, FilterContext, FilterKind, FilterResult, SettingsReader, ValidationResult,
    read_lock, write_lock,
};
use crate::error::FilterError;
use crate::pattern::{MatchMode, PatternMatcher};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum TagMode {
    #[default]
    Allow,
    Block,
}

impl TagMode {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" | "whitelist" | "include" => Some(Self::Allow),
            "block" | "blacklist" | "exclude" => Some(Self::Block),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct TagConfig {
    mode: TagMode,
    tags: Vec<String>,
    case_sensitive: bool,
    allow_empty_tag: bool,
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            mode: TagMode::Allow,
            tags: Vec::new(),
            case_sensitive: false,
            allow_empty_tag: true,
        }
    }
}

impl TagConfig {
    fn parse(settings: &Settings) -> (Self, ValidationResult) {
        let mut r = SettingsReader::new(settings);
        let config = Self {
            mode: r.enum_value("mode", "allow|block", TagMode::Allow, TagMode::parse),
            tags: r.list("tags"),
            case_sensitive: r.bool("case_sensitive", false),
            allow_empty_tag: r.bool("allow_empty_tag", true),
        };
        if config.tags.is_empty() {
            r.warn("no tags configured, every event passes");
        }
        (config, r.finish())
    }
}

/// 태그/채널 필터
#[derive(Debug)]
pub struct TagFilter {
    base: FilterBase,
    config: RwLock<TagConfig>,
    matcher: PatternMatcher,
}

impl TagFilter {
    /// 모든 태그를 통과시키는 필터를 생성합니다.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: FilterBase::new(name, FilterKind::Tag.default_priority()),
            config: RwLock::new(TagConfig::default()),
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

impl Filter for TagFilter {
    fn base(&self) -> &FilterBase {
        &self.base
    }

    fn kind(&self) -> FilterKind {
        FilterKind::Tag
    }

    fn evaluate(&self, event: &Event, _ctx: &FilterContext) -> Result<FilterResult, FilterError> {
        let config = read_lock(&self.config);
        let tag = event.tag();
        if config.tags.is_empty() {
            return Ok(FilterResult::allow("no tag rules"));
        }
        if tag.is_empty() {
            return Ok(if config.allow_empty_tag {
                FilterResult::allow("empty tag allowed")
            } else {
                FilterResult::suppress("empty tag")
            });
        }

        let matched = config
            .tags
            .iter()
            .any(|p| self.matcher.matches(tag, p, config.case_sensitive, MatchMode::Wildcard));
        Ok(match (config.mode, matched) {
            (TagMode::Allow, true) => FilterResult::allow(format!("tag '{tag}' allowed")),
            (TagMode::Allow, false) => FilterResult::suppress(format!("tag '{tag}' not allowed")),
            (TagMode::Block, true) => FilterResult::suppress(format!("tag '{tag}' blocked")),
            (TagMode::Block, false) => FilterResult::allow(format!("tag '{tag}' not blocked")),
        })
    }

    fn validate(&self, settings: &Settings) -> ValidationResult {
        TagConfig::parse(settings).1
    }

    fn apply(&self, settings: &Settings) -> Result<(), FilterError> {
        let (config, _) = TagConfig::parse(settings);
        *write_lock(&self.config) = config;
        Ok(())
    }
}
