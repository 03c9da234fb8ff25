//! 설정 판독기 -- 필터 설정을 타입 변환하면서 에러/경고를 모읍니다.
//!
//! 필터 설정의 개별 항목 오류는 치명적이지 않습니다. 판독기는 잘못된 항목에 대해
//! 기본값을 돌려주고 [`ValidationResult`]에 에러를 기록하므로, 검증(validate)과
//! 적용(configure)이 같은 파싱 코드를 공유할 수 있습니다.

use std::collections::HashSet;
use std::time::Duration;

use ironsieve_core::settings::Settings;

use super::ValidationResult;

/// 모든 필터가 공통으로 받는 설정 키
pub(crate) const COMMON_KEYS: [&str; 2] = ["priority", "enabled"];

pub(crate) struct SettingsReader<'a> {
    settings: &'a Settings,
    consumed: HashSet<&'a str>,
    result: ValidationResult,
}

impl<'a> SettingsReader<'a> {
    pub(crate) fn new(settings: &'a Settings) -> Self {
        Self {
            settings,
            consumed: HashSet::new(),
            result: ValidationResult::valid(),
        }
    }

    pub(crate) fn bool(&mut self, key: &'a str, default: bool) -> bool {
        self.consumed.insert(key);
        match self.settings.bool(key) {
            Ok(v) => v.unwrap_or(default),
            Err(e) => {
                self.result.add_error(e.to_string());
                default
            }
        }
    }

    pub(crate) fn int(&mut self, key: &'a str, default: i64) -> i64 {
        self.consumed.insert(key);
        match self.settings.int(key) {
            Ok(v) => v.unwrap_or(default),
            Err(e) => {
                self.result.add_error(e.to_string());
                default
            }
        }
    }

    pub(crate) fn non_negative(&mut self, key: &'a str, default: u64) -> u64 {
        self.consumed.insert(key);
        match self.settings.non_negative(key) {
            Ok(v) => v.unwrap_or(default),
            Err(e) => {
                self.result.add_error(e.to_string());
                default
            }
        }
    }

    pub(crate) fn float(&mut self, key: &'a str, default: f64) -> f64 {
        self.consumed.insert(key);
        match self.settings.float(key) {
            Ok(v) => v.unwrap_or(default),
            Err(e) => {
                self.result.add_error(e.to_string());
                default
            }
        }
    }

    pub(crate) fn string(&mut self, key: &'a str, default: &str) -> String {
        self.consumed.insert(key);
        match self.settings.string(key) {
            Ok(v) => v.unwrap_or_else(|| default.to_owned()),
            Err(e) => {
                self.result.add_error(e.to_string());
                default.to_owned()
            }
        }
    }

    pub(crate) fn list(&mut self, key: &'a str) -> Vec<String> {
        self.consumed.insert(key);
        match self.settings.string_list(key) {
            Ok(v) => v.unwrap_or_default(),
            Err(e) => {
                self.result.add_error(e.to_string());
                Vec::new()
            }
        }
    }

    pub(crate) fn duration_secs(&mut self, key: &'a str, default: Duration) -> Duration {
        self.consumed.insert(key);
        match self.settings.duration_secs(key) {
            Ok(v) => v.unwrap_or(default),
            Err(e) => {
                self.result.add_error(e.to_string());
                default
            }
        }
    }

    pub(crate) fn enum_value<T>(
        &mut self,
        key: &'a str,
        expected: &'static str,
        default: T,
        parse: impl Fn(&str) -> Option<T>,
    ) -> T {
        self.consumed.insert(key);
        match self.settings.enum_value(key, expected, parse) {
            Ok(v) => v.unwrap_or(default),
            Err(e) => {
                self.result.add_error(e.to_string());
                default
            }
        }
    }

    pub(crate) fn error(&mut self, message: impl Into<String>) {
        self.result.add_error(message);
    }

    pub(crate) fn warn(&mut self, message: impl Into<String>) {
        self.result.add_warning(message);
    }

    /// 판독을 마치고 결과를 반환합니다. 읽지 않은 키는 경고로 남깁니다.
    pub(crate) fn finish(mut self) -> ValidationResult {
        for (key, _) in self.settings.iter() {
            if !self.consumed.contains(key.as_str()) && !COMMON_KEYS.contains(&key.as_str()) {
                self.result
                    .add_warning(format!("unknown setting '{key}' is ignored"));
            }
        }
        self.result
    }
}
