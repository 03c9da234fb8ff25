//! 시간대 필터 -- 하루 중 시각 범위로 이벤트를 통과/억제
//!
//! 범위는 `[start, end)`이며 `start > end`이면 자정을 넘어갑니다 (예: `22:00-06:00`).
//! 이벤트 타임스탬프는 고정 UTC 오프셋으로 변환한 뒤 비교합니다.
//!
//! # 설정 키
//! - `ranges`: `"HH:MM[:SS]-HH:MM[:SS]"` 목록. 끝 시각에 `24:00`을 쓸 수 있습니다.
//! - `mode`: `allow_inside`(범위 안 통과) | `deny_inside`(범위 안 억제)
//! - `utc_offset_minutes`: -1439 ..= 1439 (기본 0)
//!
//! 범위가 겹치면 경고만 남깁니다.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::RwLock;

use chrono::{DateTime, FixedOffset, NaiveTime, Offset, Timelike, Utc};
use ironsieve_core::event::Event;
use ironsieve_core::settings::{ConfigValue, Settings};

use super::{
    Filter, FilterBase, FilterContext, FilterKind, FilterResult, SettingsReader, ValidationResult,
    read_lock, write_lock,
};
use crate::error::FilterError;

const SECONDS_PER_DAY: u32 = 86_400;
const MAX_OFFSET_MINUTES: i64 = 24 * 60 - 1;

/// 범위 적용 방식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeRangeMode {
    /// 범위 안의 이벤트를 통과
    #[default]
    AllowInside,
    /// 범위 안의 이벤트를 억제
    DenyInside,
}

impl TimeRangeMode {
    fn parse(s: &str) -> Option<Self> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "allowinside" | "allow" | "include" => Some(Self::AllowInside),
            "denyinside" | "deny" | "exclude" => Some(Self::DenyInside),
            _ => None,
        }
    }
}

/// 하루 중 `[start, end)` 범위 (자정 기준 초)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyRange {
    start: u32,
    end: u32,
}

impl DailyRange {
    /// `"HH:MM[:SS]-HH:MM[:SS]"` 형식을 파싱합니다.
    pub fn parse(s: &str) -> Result<Self, String> {
        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| format!("expected 'start-end', got '{s}'"))?;
        let start = parse_time(start.trim(), false)?;
        let end = parse_time(end.trim(), true)?;
        if start == end {
            return Err(format!("range '{s}' is empty"));
        }
        Ok(Self { start, end })
    }

    /// 자정을 넘어가는 범위인지
    pub fn wraps(&self) -> bool {
        self.start > self.end
    }

    /// 자정 기준 초 `t`가 범위 안인지
    pub fn contains(&self, t: u32) -> bool {
        if self.wraps() {
            t >= self.start || t < self.end
        } else {
            t >= self.start && t < self.end
        }
    }

    /// 자정을 넘지 않는 구간들로 분해
    fn segments(&self) -> Vec<(u32, u32)> {
        if self.wraps() {
            vec![(self.start, SECONDS_PER_DAY), (0, self.end)]
        } else {
            vec![(self.start, self.end)]
        }
    }

    fn overlaps(&self, other: &DailyRange) -> bool {
        self.segments().iter().any(|(a0, a1)| {
            other
                .segments()
                .iter()
                .any(|(b0, b1)| a0 < b1 && b0 < a1)
        })
    }
}

impl fmt::Display for DailyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hms = |t: u32| format!("{:02}:{:02}:{:02}", t / 3600, (t / 60) % 60, t % 60);
        write!(f, "{}-{}", hms(self.start), hms(self.end))
    }
}

fn parse_time(s: &str, allow_end_of_day: bool) -> Result<u32, String> {
    if allow_end_of_day && (s == "24:00" || s == "24:00:00") {
        return Ok(SECONDS_PER_DAY);
    }
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map(|t| t.num_seconds_from_midnight())
        .map_err(|_| format!("invalid time '{s}', expected HH:MM or HH:MM:SS"))
}

#[derive(Debug, Clone)]
struct TimeRangeConfig {
    ranges: Vec<DailyRange>,
    mode: TimeRangeMode,
    offset: FixedOffset,
}

impl Default for TimeRangeConfig {
    fn default() -> Self {
        Self {
            ranges: Vec::new(),
            mode: TimeRangeMode::AllowInside,
            offset: utc(),
        }
    }
}

fn utc() -> FixedOffset {
    Utc.fix()
}

impl TimeRangeConfig {
    fn parse(settings: &Settings) -> (Self, ValidationResult) {
        let mut r = SettingsReader::new(settings);
        let mode = r.enum_value(
            "mode",
            "allow_inside|deny_inside",
            TimeRangeMode::AllowInside,
            TimeRangeMode::parse,
        );

        let offset_minutes = r.int("utc_offset_minutes", 0);
        let offset = if (-MAX_OFFSET_MINUTES..=MAX_OFFSET_MINUTES).contains(&offset_minutes) {
            i32::try_from(offset_minutes * 60)
                .ok()
                .and_then(FixedOffset::east_opt)
                .unwrap_or_else(utc)
        } else {
            r.error(format!(
                "utc_offset_minutes must be within ±{MAX_OFFSET_MINUTES}, got {offset_minutes}"
            ));
            utc()
        };

        let mut ranges = Vec::new();
        for raw in r.list("ranges") {
            match DailyRange::parse(&raw) {
                Ok(range) => ranges.push(range),
                Err(e) => r.error(format!("ranges: {e}")),
            }
        }
        for (i, a) in ranges.iter().enumerate() {
            for b in &ranges[i + 1..] {
                if a.overlaps(b) {
                    r.warn(format!("ranges {a} and {b} overlap"));
                }
            }
        }
        if ranges.is_empty() {
            r.warn("no ranges configured, every event passes");
        }

        (
            Self {
                ranges,
                mode,
                offset,
            },
            r.finish(),
        )
    }
}

/// 하루 중 시각 범위 필터
#[derive(Debug)]
pub struct TimeRangeFilter {
    base: FilterBase,
    config: RwLock<TimeRangeConfig>,
}

impl TimeRangeFilter {
    /// 범위가 없는 (모두 통과) 필터를 생성합니다.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: FilterBase::new(name, FilterKind::TimeRange.default_priority()),
            config: RwLock::new(TimeRangeConfig::default()),
        }
    }

    /// 설정으로 필터를 생성합니다.
    pub fn from_settings(name: impl Into<String>, settings: &Settings) -> Result<Self, FilterError> {
        let filter = Self::new(name);
        filter.configure_strict(settings)?;
        Ok(filter)
    }
}

impl Filter for TimeRangeFilter {
    fn base(&self) -> &FilterBase {
        &self.base
    }

    fn kind(&self) -> FilterKind {
        FilterKind::TimeRange
    }

    fn evaluate(&self, event: &Event, _ctx: &FilterContext) -> Result<FilterResult, FilterError> {
        let config = read_lock(&self.config);
        if config.ranges.is_empty() {
            return Ok(FilterResult::allow("no time ranges"));
        }

        let local = DateTime::<Utc>::from(event.timestamp()).with_timezone(&config.offset);
        let t = local.time().num_seconds_from_midnight();
        let hit = config.ranges.iter().find(|r| r.contains(t));

        Ok(match (config.mode, hit) {
            (TimeRangeMode::AllowInside, Some(range)) => {
                FilterResult::allow(format!("{} inside {range}", local.time()))
            }
            (TimeRangeMode::AllowInside, None) => {
                FilterResult::suppress(format!("{} outside all ranges", local.time()))
            }
            (TimeRangeMode::DenyInside, Some(range)) => {
                FilterResult::suppress(format!("{} inside denied {range}", local.time()))
            }
            (TimeRangeMode::DenyInside, None) => {
                FilterResult::allow(format!("{} outside denied ranges", local.time()))
            }
        })
    }

    fn validate(&self, settings: &Settings) -> ValidationResult {
        TimeRangeConfig::parse(settings).1
    }

    fn apply(&self, settings: &Settings) -> Result<(), FilterError> {
        let (config, _) = TimeRangeConfig::parse(settings);
        *write_lock(&self.config) = config;
        Ok(())
    }

    fn details(&self) -> BTreeMap<String, ConfigValue> {
        let config = read_lock(&self.config);
        BTreeMap::from([
            (
                "ranges".to_owned(),
                ConfigValue::from(config.ranges.iter().map(ToString::to_string).collect::<Vec<_>>()),
            ),
            (
                "utc_offset_minutes".to_owned(),
                ConfigValue::from(i64::from(config.offset.local_minus_utc() / 60)),
            ),
        ])
    }
}
