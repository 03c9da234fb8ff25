//! 복합 필터 -- 자식 필터 결과를 논리 연산자로 결합
//!
//! 활성화되어 있고 이벤트에 적용 가능한 자식만 우선순위 오름차순으로 평가합니다.
//! 자식의 에러/패닉은 자식의 [`Filter::process`]에서 허용으로 변환되므로
//! 다른 자식의 평가를 막지 않습니다.
//!
//! | 연산자 | 통과 조건 |
//! |---|---|
//! | `and` | 모든 자식이 통과 |
//! | `or` | 하나 이상 통과 |
//! | `xor` | 정확히 하나 통과 |
//! | `not` | 모든 자식이 억제 |
//!
//! 평가 대상 자식이 없으면 통과합니다. 결합 결과가 통과이고 자식 중 하나가
//! 이벤트를 변경했다면 처음 변경된 이벤트로 `Modify`를 반환합니다.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use ironsieve_core::event::Event;
use ironsieve_core::settings::{ConfigValue, Settings};

use super::{
    Filter, FilterBase, FilterContext, FilterDecision, FilterKind, FilterResult, SettingsReader,
    ValidationResult, read_lock, write_lock,
};
use crate::error::FilterError;

/// 결합 연산자
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogicalOperator {
    /// 모두 통과
    #[default]
    And,
    /// 하나 이상 통과
    Or,
    /// 정확히 하나 통과
    Xor,
    /// 모두 억제
    Not,
}

impl LogicalOperator {
    /// 문자열에서 연산자를 파싱합니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "and" | "all" => Some(Self::And),
            "or" | "any" => Some(Self::Or),
            "xor" | "one" => Some(Self::Xor),
            "not" | "none" => Some(Self::Not),
            _ => None,
        }
    }

    /// 소문자 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::Not => "not",
        }
    }

    /// 통과한 자식 수와 평가한 자식 수로 결합 결과를 계산합니다.
    pub fn combine(&self, passed: usize, evaluated: usize) -> bool {
        match self {
            Self::And => passed == evaluated,
            Self::Or => passed > 0,
            Self::Xor => passed == 1,
            Self::Not => passed == 0,
        }
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 복합 필터
pub struct CompositeFilter {
    base: FilterBase,
    operator: RwLock<LogicalOperator>,
    /// (삽입 순번, 자식)
    children: RwLock<Vec<(u64, Arc<dyn Filter>)>>,
    next_seq: AtomicU64,
}

impl CompositeFilter {
    /// 자식이 없는 복합 필터를 생성합니다.
    pub fn new(name: impl Into<String>, operator: LogicalOperator) -> Self {
        Self {
            base: FilterBase::new(name, FilterKind::Composite.default_priority()),
            operator: RwLock::new(operator),
            children: RwLock::new(Vec::new()),
            next_seq: AtomicU64::new(0),
        }
    }

    /// 설정으로 필터를 생성합니다. 자식은 [`add_child`](Self::add_child)로 추가합니다.
    pub fn from_settings(name: impl Into<String>, settings: &Settings) -> Result<Self, FilterError> {
        let filter = Self::new(name, LogicalOperator::And);
        filter.configure_strict(settings)?;
        Ok(filter)
    }

    /// 현재 연산자
    pub fn operator(&self) -> LogicalOperator {
        *read_lock(&self.operator)
    }

    /// 자식을 추가합니다. 같은 이름의 자식이 있으면 에러를 반환합니다.
    pub fn add_child(&self, child: Arc<dyn Filter>) -> Result<(), FilterError> {
        let mut children = write_lock(&self.children);
        if children.iter().any(|(_, c)| c.name() == child.name()) {
            return Err(FilterError::DuplicateFilter {
                name: child.name().to_owned(),
            });
        }
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        children.push((seq, child));
        Ok(())
    }

    /// 이름으로 자식을 제거합니다.
    pub fn remove_child(&self, name: &str) -> bool {
        let mut children = write_lock(&self.children);
        let before = children.len();
        children.retain(|(_, c)| c.name() != name);
        children.len() != before
    }

    /// 우선순위 순으로 정렬된 자식 목록
    pub fn children(&self) -> Vec<Arc<dyn Filter>> {
        let mut children = read_lock(&self.children).clone();
        children.sort_by_key(|(seq, c)| (c.priority(), *seq));
        children.into_iter().map(|(_, c)| c).collect()
    }

    fn parse(settings: &Settings) -> (LogicalOperator, ValidationResult) {
        let mut r = SettingsReader::new(settings);
        let operator = r.enum_value(
            "operator",
            "and|or|xor|not",
            LogicalOperator::And,
            LogicalOperator::from_str_loose,
        );
        (operator, r.finish())
    }
}

impl fmt::Debug for CompositeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeFilter")
            .field("base", &self.base)
            .field("operator", &self.operator())
            .field("children", &read_lock(&self.children).len())
            .finish()
    }
}

impl Filter for CompositeFilter {
    fn base(&self) -> &FilterBase {
        &self.base
    }

    fn kind(&self) -> FilterKind {
        FilterKind::Composite
    }

    fn evaluate(&self, event: &Event, ctx: &FilterContext) -> Result<FilterResult, FilterError> {
        let operator = self.operator();
        let mut evaluated = 0_usize;
        let mut passed = 0_usize;
        let mut modified: Option<Event> = None;

        for child in self.children() {
            if !child.is_enabled() || !child.can_handle(event) {
                continue;
            }
            let result = child.process(event, ctx);
            evaluated += 1;
            if result.decision.is_pass() {
                passed += 1;
            }
            if modified.is_none() && result.decision == FilterDecision::Modify {
                modified = result.modified_event;
            }
        }

        if evaluated == 0 {
            return Ok(FilterResult::allow("no applicable children"));
        }

        let summary = format!("{operator}: {passed}/{evaluated} children passed");
        let result = if !operator.combine(passed, evaluated) {
            FilterResult::suppress(summary)
        } else if let Some(event) = modified {
            FilterResult::modify(event, summary)
        } else {
            FilterResult::allow(summary)
        };
        Ok(result
            .with_metadata("evaluated", evaluated)
            .with_metadata("passed", passed))
    }

    fn validate(&self, settings: &Settings) -> ValidationResult {
        Self::parse(settings).1
    }

    fn apply(&self, settings: &Settings) -> Result<(), FilterError> {
        *write_lock(&self.operator) = Self::parse(settings).0;
        Ok(())
    }

    fn reset_state(&self) {
        for child in self.children() {
            child.reset();
        }
    }

    fn details(&self) -> BTreeMap<String, ConfigValue> {
        let names: Vec<String> = self
            .children()
            .iter()
            .map(|c| c.name().to_owned())
            .collect();
        BTreeMap::from([
            ("operator".to_owned(), ConfigValue::from(self.operator().as_str())),
            ("children".to_owned(), ConfigValue::from(names)),
        ])
    }
}
