//! 패턴 매칭 -- 리터럴, 와일드카드, 정규식, 계층 매칭과 정규식 캐싱
//!
//! [`PatternMatcher`]는 필터들이 공유하는 문자열 매칭 엔진입니다.
//! 와일드카드(`*`, `?`)는 리터럴 구간을 이스케이프한 뒤 시작/끝이 고정된 정규식으로
//! 변환하고, 컴파일된 정규식은 (패턴, 모드, 대소문자 구분) 단위로 캐싱합니다.
//!
//! # 매칭 규칙
//! - 빈 패턴은 아무것도 매칭하지 않습니다.
//! - `"*"`는 비어 있지 않은 모든 문자열을 매칭합니다.
//! - 잘못된 정규식은 에러 대신 리터럴 부분 문자열 매칭으로 대체됩니다.
//! - 대소문자 무시는 로케일과 무관한 단순 케이스 폴딩입니다.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use regex::{Regex, RegexBuilder};

use crate::error::FilterError;

/// 기본 정규식 캐시 크기
pub const DEFAULT_CACHE_CAPACITY: usize = 1_024;

/// 컴파일된 정규식 크기 상한 (바이트)
const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// 매칭 모드
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MatchMode {
    /// 정확히 일치
    Literal,
    /// `*`, `?` 와일드카드 (전체 일치)
    #[default]
    Wildcard,
    /// 정규식 (부분 일치)
    Regex,
    /// 점으로 구분된 네임스페이스 접두 일치
    Hierarchical,
}

impl MatchMode {
    /// 문자열에서 모드를 파싱합니다 (대소문자 무시).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "literal" | "exact" => Some(Self::Literal),
            "wildcard" | "glob" => Some(Self::Wildcard),
            "regex" | "regexp" => Some(Self::Regex),
            "hierarchical" | "prefix" => Some(Self::Hierarchical),
            _ => None,
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal => write!(f, "literal"),
            Self::Wildcard => write!(f, "wildcard"),
            Self::Regex => write!(f, "regex"),
            Self::Hierarchical => write!(f, "hierarchical"),
        }
    }
}

/// 패턴에 와일드카드 문자가 있는지 확인합니다.
pub fn has_wildcards(pattern: &str) -> bool {
    pattern.contains(['*', '?'])
}

/// 와일드카드 패턴을 시작/끝이 고정된 정규식 문자열로 변환합니다.
///
/// ```
/// use ironsieve_filter::pattern::wildcard_to_regex;
/// assert_eq!(wildcard_to_regex("App.*"), r"^App\..*$");
/// ```
pub fn wildcard_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');
    let mut literal = String::new();
    for ch in pattern.chars() {
        match ch {
            '*' | '?' => {
                if !literal.is_empty() {
                    out.push_str(&regex::escape(&literal));
                    literal.clear();
                }
                out.push_str(if ch == '*' { ".*" } else { "." });
            }
            other => literal.push(other),
        }
    }
    if !literal.is_empty() {
        out.push_str(&regex::escape(&literal));
    }
    out.push('$');
    out
}

type CacheKey = (MatchMode, bool, String);

/// 문자열 매칭 엔진
///
/// 내부 캐시는 `RwLock`으로 보호되므로 여러 스레드에서 공유할 수 있습니다.
/// 캐시가 가득 차면 비우고 다시 채웁니다.
pub struct PatternMatcher {
    /// (모드, 대소문자 구분, 패턴) -> 컴파일 결과 (`None`이면 잘못된 패턴)
    cache: RwLock<HashMap<CacheKey, Option<Regex>>>,
    capacity: usize,
}

impl PatternMatcher {
    /// 기본 캐시 크기로 매처를 생성합니다.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    /// 캐시 크기를 지정하여 매처를 생성합니다.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// `text`가 `pattern`에 매칭되는지 확인합니다.
    pub fn matches(&self, text: &str, pattern: &str, case_sensitive: bool, mode: MatchMode) -> bool {
        if pattern.is_empty() {
            return false;
        }
        match mode {
            MatchMode::Literal => eq(text, pattern, case_sensitive),
            MatchMode::Hierarchical => hierarchical(text, pattern, case_sensitive),
            MatchMode::Wildcard => {
                if pattern == "*" {
                    return !text.is_empty();
                }
                if !has_wildcards(pattern) {
                    return eq(text, pattern, case_sensitive);
                }
                match self.regex_for(pattern, case_sensitive, MatchMode::Wildcard) {
                    Some(re) => re.is_match(text),
                    None => false,
                }
            }
            MatchMode::Regex => match self.regex_for(pattern, case_sensitive, MatchMode::Regex) {
                Some(re) => re.is_match(text),
                None => self.contains(text, pattern, case_sensitive),
            },
        }
    }

    /// 부분 문자열 포함 여부 (리터럴)
    pub fn contains(&self, text: &str, needle: &str, case_sensitive: bool) -> bool {
        if needle.is_empty() {
            return false;
        }
        if case_sensitive {
            text.contains(needle)
        } else {
            text.to_lowercase().contains(&needle.to_lowercase())
        }
    }

    /// 매칭된 부분을 `replacement`로 바꾼 문자열을 반환합니다.
    ///
    /// 매칭이 없으면 `None`을 반환합니다. 리터럴과 정규식은 모든 출현을 치환하고,
    /// 와일드카드와 계층 매칭은 전체 일치 시 문자열 전체를 치환합니다.
    pub fn replace_all(
        &self,
        text: &str,
        pattern: &str,
        case_sensitive: bool,
        mode: MatchMode,
        replacement: &str,
    ) -> Option<String> {
        if pattern.is_empty() {
            return None;
        }
        let re = match mode {
            MatchMode::Literal => self.regex_for(pattern, case_sensitive, MatchMode::Literal),
            MatchMode::Regex => self
                .regex_for(pattern, case_sensitive, MatchMode::Regex)
                .or_else(|| self.regex_for(pattern, case_sensitive, MatchMode::Literal)),
            MatchMode::Wildcard | MatchMode::Hierarchical => {
                return self
                    .matches(text, pattern, case_sensitive, mode)
                    .then(|| replacement.to_owned());
            }
        }?;
        if !re.is_match(text) {
            return None;
        }
        Some(re.replace_all(text, regex::NoExpand(replacement)).into_owned())
    }

    /// 패턴이 유효한지 검사합니다 (정규식 모드에서만 실패할 수 있음).
    ///
    /// 평가 시에는 잘못된 정규식이 리터럴 매칭으로 대체되지만,
    /// 설정 검증 단계에서는 이 함수로 에러를 보고합니다.
    pub fn check(pattern: &str, mode: MatchMode) -> Result<(), FilterError> {
        if mode == MatchMode::Regex {
            RegexBuilder::new(pattern)
                .size_limit(REGEX_SIZE_LIMIT)
                .build()?;
        }
        Ok(())
    }

    /// 캐시된 정규식 수
    pub fn cached_len(&self) -> usize {
        self.cache
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// 캐시를 비웁니다.
    pub fn clear_cache(&self) {
        self.cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    fn regex_for(&self, pattern: &str, case_sensitive: bool, mode: MatchMode) -> Option<Regex> {
        let key = (mode, case_sensitive, pattern.to_owned());
        if let Some(cached) = self
            .cache
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&key)
        {
            return cached.clone();
        }

        let source = match mode {
            MatchMode::Wildcard => wildcard_to_regex(pattern),
            MatchMode::Regex => pattern.to_owned(),
            MatchMode::Literal | MatchMode::Hierarchical => regex::escape(pattern),
        };
        let compiled = RegexBuilder::new(&source)
            .case_insensitive(!case_sensitive)
            .dot_matches_new_line(mode == MatchMode::Wildcard)
            .size_limit(REGEX_SIZE_LIMIT)
            .build();
        let compiled = match compiled {
            Ok(re) => Some(re),
            Err(e) => {
                tracing::debug!(pattern, error = %e, "invalid pattern, falling back to literal match");
                None
            }
        };

        let mut cache = self
            .cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if cache.len() >= self.capacity {
            cache.clear();
        }
        cache.insert(key, compiled.clone());
        compiled
    }
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PatternMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternMatcher")
            .field("cached", &self.cached_len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

fn eq(a: &str, b: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        a == b
    } else {
        a.chars()
            .flat_map(char::to_lowercase)
            .eq(b.chars().flat_map(char::to_lowercase))
    }
}

fn hierarchical(value: &str, prefix: &str, case_sensitive: bool) -> bool {
    if eq(value, prefix, case_sensitive) {
        return true;
    }
    // 접두 뒤에 반드시 '.' 구분자가 와야 함
    match value.char_indices().nth(prefix.chars().count()) {
        Some((idx, '.')) => eq(&value[..idx], prefix, case_sensitive),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn wildcard_matches_dotted_namespace() {
        let m = PatternMatcher::new();
        assert!(m.matches(
            "AhBearStudios.Core.Service",
            "Ah*Studios.*Service",
            true,
            MatchMode::Wildcard
        ));
        assert!(!m.matches(
            "SomeOther.Service",
            "Ah*Studios.*Service",
            true,
            MatchMode::Wildcard
        ));
    }

    #[test]
    fn star_matches_any_non_empty_string() {
        let m = PatternMatcher::new();
        assert!(m.matches("anything", "*", true, MatchMode::Wildcard));
        assert!(m.matches("x", "*", false, MatchMode::Wildcard));
        assert!(!m.matches("", "*", true, MatchMode::Wildcard));
    }

    #[test]
    fn empty_pattern_matches_nothing() {
        let m = PatternMatcher::new();
        for mode in [
            MatchMode::Literal,
            MatchMode::Wildcard,
            MatchMode::Regex,
            MatchMode::Hierarchical,
        ] {
            assert!(!m.matches("text", "", true, mode), "{mode}");
        }
        assert!(!m.contains("text", "", true));
    }

    #[test]
    fn question_mark_matches_single_char() {
        let m = PatternMatcher::new();
        assert!(m.matches("svc-1", "svc-?", true, MatchMode::Wildcard));
        assert!(!m.matches("svc-12", "svc-?", true, MatchMode::Wildcard));
    }

    #[test]
    fn wildcard_escapes_regex_metacharacters() {
        let m = PatternMatcher::new();
        assert!(m.matches("a+b(c)", "a+b(*)", true, MatchMode::Wildcard));
        assert!(!m.matches("aab(c)", "a+b(*)", true, MatchMode::Wildcard));
    }

    #[test]
    fn case_insensitive_wildcard_and_literal() {
        let m = PatternMatcher::new();
        assert!(m.matches("APP.Billing", "app.*", false, MatchMode::Wildcard));
        assert!(!m.matches("APP.Billing", "app.*", true, MatchMode::Wildcard));
        // 단순 케이스 폴딩만 사용 (ß != ss)
        assert!(!m.matches("Straße", "STRASSE", false, MatchMode::Literal));
        assert!(m.matches("ÄRGER", "ärger", false, MatchMode::Literal));
    }

    #[test]
    fn regex_matches_and_invalid_regex_falls_back_to_substring() {
        let m = PatternMatcher::new();
        assert!(m.matches("user 42 logged in", r"user \d+", true, MatchMode::Regex));
        // 잘못된 정규식 -> 리터럴 부분 문자열
        assert!(m.matches("value (unclosed here", "(unclosed", true, MatchMode::Regex));
        assert!(!m.matches("nothing to see", "(unclosed", true, MatchMode::Regex));
        assert!(PatternMatcher::check("(unclosed", MatchMode::Regex).is_err());
        assert!(PatternMatcher::check("(unclosed", MatchMode::Wildcard).is_ok());
    }

    #[test]
    fn hierarchical_requires_dot_boundary() {
        let m = PatternMatcher::new();
        assert!(m.matches("App.Services", "App.Services", true, MatchMode::Hierarchical));
        assert!(m.matches(
            "App.Services.Billing",
            "App.Services",
            true,
            MatchMode::Hierarchical
        ));
        assert!(!m.matches(
            "App.ServicesOther",
            "App.Services",
            true,
            MatchMode::Hierarchical
        ));
        assert!(m.matches(
            "app.services.billing",
            "App.Services",
            false,
            MatchMode::Hierarchical
        ));
    }

    #[test]
    fn contains_respects_case_flag() {
        let m = PatternMatcher::new();
        assert!(m.contains("Connection TIMEOUT", "timeout", false));
        assert!(!m.contains("Connection TIMEOUT", "timeout", true));
    }

    #[test]
    fn replace_all_redacts_every_occurrence() {
        let m = PatternMatcher::new();
        let out = m
            .replace_all(
                "password=hunter2 retry password=hunter3",
                r"password=\S+",
                true,
                MatchMode::Regex,
                "[redacted]",
            )
            .unwrap();
        assert_eq!(out, "[redacted] retry [redacted]");

        let literal = m
            .replace_all("Token abc token", "token", false, MatchMode::Literal, "***")
            .unwrap();
        assert_eq!(literal, "*** abc ***");

        assert!(m
            .replace_all("clean", "secret", true, MatchMode::Literal, "x")
            .is_none());
    }

    #[test]
    fn replacement_is_not_expanded() {
        let m = PatternMatcher::new();
        let out = m
            .replace_all("id=7", r"id=(\d)", true, MatchMode::Regex, "$1")
            .unwrap();
        assert_eq!(out, "$1");
    }

    #[test]
    fn cache_is_bounded() {
        let m = PatternMatcher::with_capacity(4);
        for i in 0..10 {
            m.matches("x", &format!("x*{i}"), true, MatchMode::Wildcard);
        }
        assert!(m.cached_len() <= 4);
    }

    #[test]
    fn wildcard_to_regex_escapes_literals() {
        assert_eq!(wildcard_to_regex("a.b?c*"), r"^a\.b.c.*$");
    }

    #[test]
    fn match_mode_parses_loosely() {
        assert_eq!(MatchMode::from_str_loose("REGEX"), Some(MatchMode::Regex));
        assert_eq!(MatchMode::from_str_loose("glob"), Some(MatchMode::Wildcard));
        assert_eq!(MatchMode::from_str_loose("fuzzy"), None);
    }

    proptest! {
        #[test]
        fn literal_text_matches_itself_as_wildcard(text in "[A-Za-z0-9._-]{1,32}") {
            let m = PatternMatcher::new();
            prop_assert!(m.matches(&text, &text, true, MatchMode::Wildcard));
        }

        #[test]
        fn prefix_star_matches_any_suffix(prefix in "[A-Za-z.]{1,12}", suffix in "[A-Za-z0-9.]{0,12}") {
            let m = PatternMatcher::new();
            let text = format!("{prefix}{suffix}");
            let pattern = format!("{prefix}*");
            prop_assert!(m.matches(&text, &pattern, true, MatchMode::Wildcard));
        }

        #[test]
        fn hierarchical_never_matches_bare_prefix(base in "[A-Za-z]{1,10}", tail in "[A-Za-z]{1,10}") {
            let m = PatternMatcher::new();
            let text = format!("{base}{tail}");
            prop_assert!(!m.matches(&text, &base, true, MatchMode::Hierarchical));
        }
    }
}
