//! 레벨 필터 -- 심각도 범위로 이벤트를 통과/억제
//!
//! # 설정 키
//! - `min_level` / `max_level`: 범위 (기본 `trace` ..= `critical`)
//! - `mode`: `include`(범위 안 통과) | `exclude`(범위 밖 통과)
//! - `critical_always_passes`: `critical`은 항상 통과 (기본 true)
//! - `source_overrides`: `"소스=레벨"` 목록. 소스별 최소 레벨을 덮어씁니다.
//!   정확히 일치하는 항목이 와일드카드 항목보다 우선합니다.

use std::collections::BTreeMap;
use std::sync::RwLock;

use ironsieve_core::event::Event;
use ironsieve_core::settings::{ConfigValue, Settings};
use ironsieve_core::types::Severity;
use tracing::debug;

use super::{
    Filter, FilterBase, FilterContext, FilterKind, FilterResult, SettingsReader, ValidationResult,
    read_lock, write_lock,
};
use crate::error::FilterError;
use crate::pattern::{MatchMode, PatternMatcher, has_wildcards};

/// 범위 적용 방식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LevelMode {
    /// 범위 안의 이벤트를 통과
    #[default]
    Include,
    /// 범위 밖의 이벤트를 통과
    Exclude,
}

impl LevelMode {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "include" | "inside" => Some(Self::Include),
            "exclude" | "outside" => Some(Self::Exclude),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct LevelConfig {
    min: Severity,
    max: Severity,
    mode: LevelMode,
    critical_always_passes: bool,
    /// (소스 패턴, 최소 레벨), 설정 순서 유지
    overrides: Vec<(String, Severity)>,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            min: Severity::Trace,
            max: Severity::Critical,
            mode: LevelMode::Include,
            critical_always_passes: true,
            overrides: Vec::new(),
        }
    }
}

impl LevelConfig {
    fn parse(settings: &Settings) -> (Self, ValidationResult) {
        let mut r = SettingsReader::new(settings);
        let min = r.enum_value("min_level", "severity", Severity::Trace, Severity::from_str_loose);
        let max = r.enum_value("max_level", "severity", Severity::Critical, Severity::from_str_loose);
        let mode = r.enum_value("mode", "include|exclude", LevelMode::Include, LevelMode::parse);
        let critical_always_passes = r.bool("critical_always_passes", true);

        let mut overrides = Vec::new();
        for entry in r.list("source_overrides") {
            match entry.split_once('=') {
                Some((source, level)) if !source.trim().is_empty() => {
                    match Severity::from_str_loose(level) {
                        Some(level) => overrides.push((source.trim().to_owned(), level)),
                        None => r.error(format!(
                            "source_overrides: invalid level '{}' for '{}'",
                            level.trim(),
                            source.trim()
                        )),
                    }
                }
                _ => r.error(format!(
                    "source_overrides: expected 'source=level', got '{entry}'"
                )),
            }
        }

        if min > max {
            r.error(format!("min_level ({min}) must not exceed max_level ({max})"));
        }

        (
            Self {
                min,
                max,
                mode,
                critical_always_passes,
                overrides,
            },
            r.finish(),
        )
    }

    /// 소스에 적용할 최소 레벨: 정확히 일치 -> 와일드카드 -> 전역 최소
    fn min_for(&self, source: &str, matcher: &PatternMatcher) -> Severity {
        if let Some((_, level)) = self.overrides.iter().find(|(p, _)| p == source) {
            return *level;
        }
        self.overrides
            .iter()
            .filter(|(p, _)| has_wildcards(p))
            .find(|(p, _)| matcher.matches(source, p, true, MatchMode::Wildcard))
            .map(|(_, level)| *level)
            .unwrap_or(self.min)
    }
}

/// 심각도 범위 필터
#[derive(Debug)]
pub struct LevelFilter {
    base: FilterBase,
    config: RwLock<LevelConfig>,
    matcher: PatternMatcher,
}

impl LevelFilter {
    /// 모든 레벨을 통과시키는 필터를 생성합니다.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: FilterBase::new(name, FilterKind::Level.default_priority()),
            config: RwLock::new(LevelConfig::default()),
            matcher: PatternMatcher::new(),
        }
    }

    /// 최소 레벨만 지정한 필터를 생성합니다.
    pub fn with_min_level(name: impl Into<String>, min: Severity) -> Self {
        let filter = Self::new(name);
        write_lock(&filter.config).min = min;
        filter
    }

    /// 설정으로 필터를 생성합니다. 설정이 유효하지 않으면 에러를 반환합니다.
    pub fn from_settings(name: impl Into<String>, settings: &Settings) -> Result<Self, FilterError> {
        let filter = Self::new(name);
        filter.configure_strict(settings)?;
        Ok(filter)
    }
}

impl Filter for LevelFilter {
    fn base(&self) -> &FilterBase {
        &self.base
    }

    fn kind(&self) -> FilterKind {
        FilterKind::Level
    }

    fn evaluate(&self, event: &Event, _ctx: &FilterContext) -> Result<FilterResult, FilterError> {
        let config = read_lock(&self.config);
        let level = event.severity();

        if config.critical_always_passes && level == Severity::Critical {
            return Ok(FilterResult::allow("critical always passes"));
        }

        let min = config.min_for(event.source(), &self.matcher);
        let inside = level >= min && level <= config.max;
        let pass = match config.mode {
            LevelMode::Include => inside,
            LevelMode::Exclude => !inside,
        };

        if pass {
            Ok(FilterResult::allow(format!("level {level} accepted")))
        } else {
            debug!(filter = %self.name(), level = %level, min = %min, "event suppressed by level");
            Ok(FilterResult::suppress(format!(
                "level {level} outside [{min}, {}]",
                config.max
            ))
            .with_metadata("min_level", min.as_str()))
        }
    }

    fn validate(&self, settings: &Settings) -> ValidationResult {
        LevelConfig::parse(settings).1
    }

    fn apply(&self, settings: &Settings) -> Result<(), FilterError> {
        let (config, _) = LevelConfig::parse(settings);
        *write_lock(&self.config) = config;
        Ok(())
    }

    fn details(&self) -> BTreeMap<String, ConfigValue> {
        let config = read_lock(&self.config);
        BTreeMap::from([
            ("min_level".to_owned(), ConfigValue::from(config.min.as_str())),
            ("max_level".to_owned(), ConfigValue::from(config.max.as_str())),
            ("overrides".to_owned(), ConfigValue::from(config.overrides.len())),
        ])
    }
}
