//! 필터 설정 값 — 문자열 키 기반 설정 맵과 관대한 타입 변환
//!
//! 필터 설정은 TOML/YAML 파일, CLI, 코드 등 여러 경로로 들어오기 때문에
//! 값의 원래 타입을 신뢰할 수 없습니다. [`ConfigValue`]는 값을 태그된 합 타입으로
//! 보관하고, 조회 시점에 요청한 타입으로 변환합니다.
//!
//! # 변환 규칙
//! - 문자열 -> 불리언: `true/false`, `yes/no`, `on/off`, `1/0` (대소문자 무시)
//! - 문자열 -> 숫자: 표준 파싱 (앞뒤 공백 무시)
//! - 정수 -> 실수: 항상 허용
//! - 실수 -> 정수: 소수부가 0일 때만 허용
//! - 스칼라 -> 리스트: 원소 하나짜리 리스트
//! - 쉼표 구분 문자열 -> 리스트: 각 항목을 trim, 빈 항목 제거
//! - 문자열 -> 열거형: 호출자가 넘긴 파서로 대소문자 무시 파싱

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SettingError;

/// 설정 값
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    /// 불리언
    Bool(bool),
    /// 정수
    Int(i64),
    /// 실수
    Float(f64),
    /// 문자열
    String(String),
    /// 문자열 리스트
    StringList(Vec<String>),
    /// 열거형 이름 (코드에서 명시적으로 만든 값, 직렬화는 문자열)
    Enum(String),
}

impl ConfigValue {
    /// 값 종류 이름 (에러 메시지용)
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::StringList(_) => "list",
            Self::Enum(_) => "enum",
        }
    }

    /// 불리언으로 변환합니다.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Int(0) => Some(false),
            Self::Int(1) => Some(true),
            Self::String(s) | Self::Enum(s) => parse_bool(s),
            _ => None,
        }
    }

    /// 정수로 변환합니다.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Float(f) if f.is_finite() && f.fract() == 0.0 => {
                if *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                    Some(*f as i64)
                } else {
                    None
                }
            }
            Self::String(s) => {
                let trimmed = s.trim();
                trimmed.parse::<i64>().ok().or_else(|| {
                    trimmed
                        .parse::<f64>()
                        .ok()
                        .and_then(|f| Self::Float(f).as_i64())
                })
            }
            _ => None,
        }
    }

    /// 실수로 변환합니다.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::String(s) => s.trim().parse::<f64>().ok().filter(|f| !f.is_nan()),
            _ => None,
        }
    }

    /// 문자열로 변환합니다. 스칼라 값은 표시 형식으로 변환됩니다.
    pub fn as_string(&self) -> Option<String> {
        match self {
            Self::String(s) | Self::Enum(s) => Some(s.clone()),
            Self::Bool(b) => Some(b.to_string()),
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::StringList(_) => None,
        }
    }

    /// 문자열 리스트로 변환합니다.
    pub fn as_string_list(&self) -> Option<Vec<String>> {
        match self {
            Self::StringList(items) => Some(items.clone()),
            Self::String(s) => Some(split_csv(s)),
            other => other.as_string().map(|s| vec![s]),
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) | Self::Enum(s) => write!(f, "{s}"),
            Self::StringList(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for ConfigValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for ConfigValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u32> for ConfigValue {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u64> for ConfigValue {
    fn from(v: u64) -> Self {
        Self::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<usize> for ConfigValue {
    fn from(v: usize) -> Self {
        Self::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for ConfigValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ConfigValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for ConfigValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<String>> for ConfigValue {
    fn from(v: Vec<String>) -> Self {
        Self::StringList(v)
    }
}

impl From<Vec<&str>> for ConfigValue {
    fn from(v: Vec<&str>) -> Self {
        Self::StringList(v.into_iter().map(str::to_owned).collect())
    }
}

/// 필터 설정 맵
///
/// 키 순서가 결정적이도록 `BTreeMap`을 사용합니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(BTreeMap<String, ConfigValue>);

impl Settings {
    /// 빈 설정 맵을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 값을 추가한 설정 맵을 반환합니다 (빌더 스타일).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// 값을 추가합니다. 기존 값은 덮어씁니다.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// 원본 값을 조회합니다.
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.0.get(key)
    }

    /// 키 존재 여부
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// 항목 수
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// (키, 값) 순회
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ConfigValue)> {
        self.0.iter()
    }

    /// 다른 설정 맵의 값으로 덮어쓴 새 맵을 반환합니다.
    pub fn merged(&self, overrides: &Settings) -> Settings {
        let mut merged = self.clone();
        for (k, v) in overrides.iter() {
            merged.0.insert(k.clone(), v.clone());
        }
        merged
    }

    /// 불리언 설정을 조회합니다. 키가 없으면 `Ok(None)`.
    pub fn bool(&self, key: &str) -> Result<Option<bool>, SettingError> {
        self.coerce(key, "bool", ConfigValue::as_bool)
    }

    /// 정수 설정을 조회합니다.
    pub fn int(&self, key: &str) -> Result<Option<i64>, SettingError> {
        self.coerce(key, "integer", ConfigValue::as_i64)
    }

    /// 실수 설정을 조회합니다.
    pub fn float(&self, key: &str) -> Result<Option<f64>, SettingError> {
        self.coerce(key, "float", ConfigValue::as_f64)
    }

    /// 문자열 설정을 조회합니다.
    pub fn string(&self, key: &str) -> Result<Option<String>, SettingError> {
        self.coerce(key, "string", ConfigValue::as_string)
    }

    /// 문자열 리스트 설정을 조회합니다.
    pub fn string_list(&self, key: &str) -> Result<Option<Vec<String>>, SettingError> {
        self.coerce(key, "list", ConfigValue::as_string_list)
    }

    /// 음수가 아닌 정수 설정을 조회합니다.
    pub fn non_negative(&self, key: &str) -> Result<Option<u64>, SettingError> {
        match self.int(key)? {
            Some(v) if v < 0 => Err(SettingError::OutOfRange {
                key: key.to_owned(),
                reason: format!("must not be negative, got {v}"),
            }),
            Some(v) => Ok(Some(v as u64)),
            None => Ok(None),
        }
    }

    /// 초 단위 기간 설정을 조회합니다. 실수 초를 허용합니다.
    pub fn duration_secs(&self, key: &str) -> Result<Option<Duration>, SettingError> {
        match self.float(key)? {
            Some(secs) if !secs.is_finite() || secs < 0.0 => Err(SettingError::OutOfRange {
                key: key.to_owned(),
                reason: format!("duration must be a non-negative number of seconds, got {secs}"),
            }),
            Some(secs) => Duration::try_from_secs_f64(secs)
                .map(Some)
                .map_err(|e| SettingError::OutOfRange {
                    key: key.to_owned(),
                    reason: format!("duration {secs} seconds is not representable: {e}"),
                }),
            None => Ok(None),
        }
    }

    /// 열거형 설정을 조회합니다.
    ///
    /// `parse`는 대소문자를 무시하고 이름을 해석하는 함수여야 합니다.
    pub fn enum_value<T>(
        &self,
        key: &str,
        expected: &'static str,
        parse: impl Fn(&str) -> Option<T>,
    ) -> Result<Option<T>, SettingError> {
        self.coerce(key, expected, |v| v.as_string().and_then(|s| parse(&s)))
    }

    fn coerce<T>(
        &self,
        key: &str,
        expected: &'static str,
        convert: impl Fn(&ConfigValue) -> Option<T>,
    ) -> Result<Option<T>, SettingError> {
        match self.0.get(key) {
            None => Ok(None),
            Some(value) => convert(value).map(Some).ok_or_else(|| SettingError::TypeMismatch {
                key: key.to_owned(),
                expected,
                actual: format!("{} '{}'", value.type_name(), value),
            }),
        }
    }
}

impl FromIterator<(String, ConfigValue)> for Settings {
    fn from_iter<I: IntoIterator<Item = (String, ConfigValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<BTreeMap<String, ConfigValue>> for Settings {
    fn from(map: BTreeMap<String, ConfigValue>) -> Self {
        Self(map)
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}
