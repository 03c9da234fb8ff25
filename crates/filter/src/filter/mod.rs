//! 필터 계약 -- 판정, 결과, 컨텍스트, 공통 평가 알고리즘
//!
//! 모든 필터는 [`Filter`] trait을 구현합니다. 필터별 로직은 [`Filter::evaluate`]에만
//! 두고, 비활성/적용 불가/에러/패닉 처리와 통계 기록은 제공 메서드
//! [`Filter::process`]가 공통으로 수행합니다.
//!
//! # 공통 평가 알고리즘
//! 1. 비활성 -> Allow (허용으로 기록)
//! 2. `can_handle` 거부 -> Allow (이 이벤트에는 no-op)
//! 3. `evaluate` 실행. `Err` 또는 패닉 -> Allow + 에러 카운트 증가 (fail-open)
//! 4. 모든 분기에서 통계 기록
//!
//! # 우선순위
//! 숫자가 낮을수록 먼저 실행됩니다. 종류별 기본값은 [`FilterKind::default_priority`].

mod reader;

pub mod composite;
pub mod content;
pub mod correlation;
pub mod level;
pub mod rate_limit;
pub mod sampling;
pub mod simple;
pub mod source;
pub mod tag;
pub mod time_range;

pub(crate) use reader::SettingsReader;

pub use composite::{CompositeFilter, LogicalOperator};
pub use content::{ContentFilter, ContentMode};
pub use correlation::CorrelationFilter;
pub use level::{LevelFilter, LevelMode};
pub use rate_limit::{OnLimit, RateLimitFilter};
pub use sampling::{SamplingFilter, SamplingStrategy};
pub use simple::{BlockFilter, PassThroughFilter};
pub use source::{SourceFilter, SourceMode};
pub use tag::TagFilter;
pub use time_range::{TimeRangeFilter, TimeRangeMode};

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant, SystemTime};

use metrics::{counter, histogram};
use serde::Serialize;
use tracing::{debug, warn};

use ironsieve_core::event::Event;
use ironsieve_core::metrics as m;
use ironsieve_core::publish::{MessagePublisher, Notification, NullPublisher};
use ironsieve_core::settings::{ConfigValue, Settings};

use crate::error::FilterError;
use crate::stats::{FilterStatistics, StatisticsSnapshot};

/// 판정 사유 최대 길이 (문자 수)
pub const MAX_REASON_LEN: usize = 256;

/// fail-open 결과에 붙는 메타데이터 키
pub const FAIL_OPEN_KEY: &str = "fail_open";

/// 필터 판정
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterDecision {
    /// 통과
    Allow,
    /// 억제
    Suppress,
    /// 변경된 이벤트로 통과
    Modify,
    /// 나중에 다시 처리하도록 보류
    Defer,
}

impl FilterDecision {
    /// 소문자 이름 (메트릭 레이블용)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Suppress => "suppress",
            Self::Modify => "modify",
            Self::Defer => "defer",
        }
    }

    /// 이벤트가 계속 처리되는 판정인지 (Allow, Modify)
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Allow | Self::Modify)
    }
}

impl fmt::Display for FilterDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 필터 평가 결과
///
/// 평가마다 새로 만들어지며 캐싱하지 않습니다.
#[derive(Debug, Clone, Serialize)]
pub struct FilterResult {
    /// 판정
    pub decision: FilterDecision,
    /// 사유 (최대 [`MAX_REASON_LEN`] 문자)
    pub reason: String,
    /// `Modify` 판정 시 변경된 이벤트
    #[serde(skip)]
    pub modified_event: Option<Event>,
    /// 부가 정보
    pub metadata: BTreeMap<String, ConfigValue>,
    /// 처리 시간
    pub processing_time: Duration,
}

impl FilterResult {
    fn new(decision: FilterDecision, reason: impl Into<String>) -> Self {
        Self {
            decision,
            reason: truncate_reason(reason.into()),
            modified_event: None,
            metadata: BTreeMap::new(),
            processing_time: Duration::ZERO,
        }
    }

    /// 허용
    pub fn allow(reason: impl Into<String>) -> Self {
        Self::new(FilterDecision::Allow, reason)
    }

    /// 억제
    pub fn suppress(reason: impl Into<String>) -> Self {
        Self::new(FilterDecision::Suppress, reason)
    }

    /// 보류
    pub fn defer(reason: impl Into<String>) -> Self {
        Self::new(FilterDecision::Defer, reason)
    }

    /// 변경된 이벤트로 통과
    pub fn modify(event: Event, reason: impl Into<String>) -> Self {
        let mut result = Self::new(FilterDecision::Modify, reason);
        result.modified_event = Some(event);
        result
    }

    /// 평가 실패를 허용으로 대신한 결과
    pub fn fail_open(reason: impl Into<String>) -> Self {
        Self::new(FilterDecision::Allow, reason).with_metadata(FAIL_OPEN_KEY, true)
    }

    /// 평가 실패로 인한 허용인지
    pub fn is_fail_open(&self) -> bool {
        matches!(self.metadata.get(FAIL_OPEN_KEY), Some(ConfigValue::Bool(true)))
    }

    /// 부가 정보를 추가합니다.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// 사유 문자열을 문자 경계에서 잘라 [`MAX_REASON_LEN`] 이하로 만듭니다.
pub fn truncate_reason(mut reason: String) -> String {
    if let Some((idx, _)) = reason.char_indices().nth(MAX_REASON_LEN) {
        reason.truncate(idx);
    }
    reason
}

/// 체인 호출 한 번 동안 공유되는 평가 컨텍스트
#[derive(Debug, Clone)]
pub struct FilterContext {
    /// 상관 ID
    pub correlation_id: String,
    /// 체인 평가 시작 시각
    pub started_at: SystemTime,
    /// 현재 평가 중인 필터의 체인 내 위치
    pub position: usize,
    /// 최근 이벤트 윈도우 (오래된 순)
    pub recent_events: Vec<Arc<Event>>,
    /// 자유 형식 속성
    pub properties: BTreeMap<String, String>,
}

impl FilterContext {
    /// 새 컨텍스트를 생성합니다.
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            started_at: SystemTime::now(),
            position: 0,
            recent_events: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    /// 최근 이벤트 윈도우를 지정합니다.
    pub fn with_recent_events(mut self, recent_events: Vec<Arc<Event>>) -> Self {
        self.recent_events = recent_events;
        self
    }

    /// 속성을 추가합니다.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

impl Default for FilterContext {
    fn default() -> Self {
        Self::new(String::new())
    }
}

/// 설정 검증 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    /// 에러가 없으면 true
    pub is_valid: bool,
    /// 설정을 적용할 수 없게 만드는 문제
    pub errors: Vec<String>,
    /// 적용은 가능하지만 주의가 필요한 문제
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// 문제 없는 결과
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// 에러 하나짜리 결과
    pub fn invalid(error: impl Into<String>) -> Self {
        let mut result = Self::valid();
        result.add_error(error);
        result
    }

    /// 에러를 추가합니다.
    pub fn add_error(&mut self, error: impl Into<String>) {
        self.is_valid = false;
        self.errors.push(error.into());
    }

    /// 경고를 추가합니다.
    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// 다른 결과를 접두어를 붙여 합칩니다.
    pub fn merge(&mut self, prefix: &str, other: ValidationResult) {
        for e in other.errors {
            self.add_error(format!("{prefix}: {e}"));
        }
        for w in other.warnings {
            self.add_warning(format!("{prefix}: {w}"));
        }
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::valid()
    }
}

/// 필터 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    /// 심각도/레벨
    Level,
    /// 소스 이름/패턴
    Source,
    /// 메시지 내용
    Content,
    /// 상관 ID, 사용자/세션
    Correlation,
    /// 하루 중 시간대
    TimeRange,
    /// 확률적 샘플링
    Sampling,
    /// 레이트 리밋
    RateLimit,
    /// 자식 필터 조합
    Composite,
    /// 태그/채널
    Tag,
    /// 항상 억제
    Block,
    /// 항상 허용
    PassThrough,
}

impl FilterKind {
    /// 모든 종류
    pub const ALL: [FilterKind; 11] = [
        Self::Level,
        Self::Source,
        Self::Content,
        Self::Correlation,
        Self::TimeRange,
        Self::Sampling,
        Self::RateLimit,
        Self::Composite,
        Self::Tag,
        Self::Block,
        Self::PassThrough,
    ];

    /// 문자열에서 종류를 파싱합니다 (대소문자, `-`/`_` 무시, `filter` 접미어 허용).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-' && *c != ' ')
            .collect::<String>()
            .to_ascii_lowercase();
        let normalized = normalized.strip_suffix("filter").unwrap_or(&normalized);
        match normalized {
            "level" | "severity" => Some(Self::Level),
            "source" => Some(Self::Source),
            "content" | "pattern" => Some(Self::Content),
            "correlation" => Some(Self::Correlation),
            "timerange" | "time" => Some(Self::TimeRange),
            "sampling" | "sample" => Some(Self::Sampling),
            "ratelimit" | "rate" => Some(Self::RateLimit),
            "composite" => Some(Self::Composite),
            "tag" | "channel" => Some(Self::Tag),
            "block" => Some(Self::Block),
            "passthrough" | "pass" => Some(Self::PassThrough),
            _ => None,
        }
    }

    /// 스네이크 케이스 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Level => "level",
            Self::Source => "source",
            Self::Content => "content",
            Self::Correlation => "correlation",
            Self::TimeRange => "time_range",
            Self::Sampling => "sampling",
            Self::RateLimit => "rate_limit",
            Self::Composite => "composite",
            Self::Tag => "tag",
            Self::Block => "block",
            Self::PassThrough => "pass_through",
        }
    }

    /// 종류별 기본 우선순위 (낮을수록 먼저)
    ///
    /// 값싼 필터가 앞에, 상태를 소비하는 샘플링/레이트 리밋이 뒤에 옵니다.
    /// 앞선 필터가 억제한 이벤트는 토큰을 소비하지 않습니다.
    pub fn default_priority(&self) -> i32 {
        match self {
            Self::Level => 100,
            Self::Source => 200,
            Self::Tag => 250,
            Self::Content => 300,
            Self::Correlation => 400,
            Self::TimeRange => 500,
            Self::Composite => 600,
            Self::Sampling => 800,
            Self::RateLimit => 900,
            Self::Block | Self::PassThrough => 1_000,
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 필터 진단 정보 (직렬화 가능한 요약)
#[derive(Debug, Clone, Serialize)]
pub struct FilterDiagnostics {
    /// 이름
    pub name: String,
    /// 종류
    pub kind: FilterKind,
    /// 활성화 여부
    pub enabled: bool,
    /// 우선순위
    pub priority: i32,
    /// 현재 설정
    pub settings: Settings,
    /// 통계 스냅샷
    pub statistics: StatisticsSnapshot,
    /// 필터별 상세 (버킷 수, 자식 수 등)
    pub details: BTreeMap<String, ConfigValue>,
}

/// 모든 필터가 공유하는 상태 (이름, 활성화, 우선순위, 통계, 설정, 발행자)
pub struct FilterBase {
    name: String,
    enabled: AtomicBool,
    priority: AtomicI32,
    statistics: FilterStatistics,
    settings: RwLock<Settings>,
    publisher: RwLock<Arc<dyn MessagePublisher>>,
}

impl FilterBase {
    /// 새 공통 상태를 생성합니다.
    pub fn new(name: impl Into<String>, priority: i32) -> Self {
        Self {
            name: name.into(),
            enabled: AtomicBool::new(true),
            priority: AtomicI32::new(priority),
            statistics: FilterStatistics::new(),
            settings: RwLock::new(Settings::new()),
            publisher: RwLock::new(Arc::new(NullPublisher)),
        }
    }

    /// 이름
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 통계
    pub fn statistics(&self) -> &FilterStatistics {
        &self.statistics
    }

    /// 알림 발행자를 교체합니다. 체인에 추가될 때 체인의 발행자가 주입됩니다.
    pub fn set_publisher(&self, publisher: Arc<dyn MessagePublisher>) {
        *write_lock(&self.publisher) = publisher;
    }

    /// 알림을 발행합니다.
    pub fn publish(&self, notification: Notification) {
        let publisher = Arc::clone(&read_lock(&self.publisher));
        publisher.publish(notification);
    }
}

impl fmt::Debug for FilterBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterBase")
            .field("name", &self.name)
            .field("enabled", &self.enabled.load(Ordering::Relaxed))
            .field("priority", &self.priority.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// 필터 계약
///
/// 모든 메서드는 `&self`를 받으며, 가변 상태는 내부에서 원자 변수/락으로 관리합니다.
pub trait Filter: Send + Sync {
    /// 공통 상태
    fn base(&self) -> &FilterBase;

    /// 필터 종류
    fn kind(&self) -> FilterKind;

    /// 필터별 판정 로직
    fn evaluate(&self, event: &Event, ctx: &FilterContext) -> Result<FilterResult, FilterError>;

    /// 설정을 검증만 합니다 (적용하지 않음).
    fn validate(&self, settings: &Settings) -> ValidationResult;

    /// 검증된 설정을 필터별 상태에 반영합니다. [`configure`](Self::configure)가 호출합니다.
    fn apply(&self, settings: &Settings) -> Result<(), FilterError>;

    /// 이 이벤트에 적용 가능한지 여부
    fn can_handle(&self, _event: &Event) -> bool {
        true
    }

    /// 필터별 런타임 상태 초기화 (버킷, 샘플링 카운터 등)
    fn reset_state(&self) {}

    /// 필터별 진단 상세
    fn details(&self) -> BTreeMap<String, ConfigValue> {
        BTreeMap::new()
    }

    /// 이름
    fn name(&self) -> &str {
        self.base().name()
    }

    /// 활성화 여부
    fn is_enabled(&self) -> bool {
        self.base().enabled.load(Ordering::Acquire)
    }

    /// 활성화 여부를 바꿉니다. 통계는 유지됩니다.
    fn set_enabled(&self, enabled: bool) {
        self.base().enabled.store(enabled, Ordering::Release);
    }

    /// 우선순위 (낮을수록 먼저)
    fn priority(&self) -> i32 {
        self.base().priority.load(Ordering::Acquire)
    }

    /// 우선순위를 바꿉니다. 체인에 이미 등록된 경우 체인이 재정렬해야 반영됩니다.
    fn set_priority(&self, priority: i32) {
        self.base().priority.store(priority, Ordering::Release);
    }

    /// 통계 스냅샷
    fn statistics(&self) -> StatisticsSnapshot {
        self.base().statistics.snapshot()
    }

    /// 마지막으로 적용된 설정
    fn settings(&self) -> Settings {
        read_lock(&self.base().settings).clone()
    }

    /// 설정을 검증한 뒤 적용합니다.
    ///
    /// 검증에 실패하면 이전 설정을 유지하고 `ConfigurationRejected`를 발행하며,
    /// 실패 내용이 담긴 [`ValidationResult`]를 `Ok`로 돌려줍니다.
    /// `priority`, `enabled` 키는 모든 필터가 공통으로 처리합니다.
    fn configure(&self, settings: &Settings) -> Result<ValidationResult, FilterError> {
        let mut validation = self.validate(settings);
        let priority = settings.int("priority");
        let enabled = settings.bool("enabled");
        if let Err(e) = &priority {
            validation.add_error(e.to_string());
        }
        if let Err(e) = &enabled {
            validation.add_error(e.to_string());
        }

        if !validation.is_valid {
            warn!(
                filter = %self.name(),
                errors = ?validation.errors,
                "filter configuration rejected, keeping previous settings"
            );
            self.base().publish(Notification::ConfigurationRejected {
                filter: self.name().to_owned(),
                errors: validation.errors.clone(),
            });
            return Ok(validation);
        }

        self.apply(settings)?;
        if let Ok(Some(p)) = priority {
            self.set_priority(i32::try_from(p).unwrap_or(if p < 0 { i32::MIN } else { i32::MAX }));
        }
        if let Ok(Some(e)) = enabled {
            self.set_enabled(e);
        }
        *write_lock(&self.base().settings) = settings.clone();

        debug!(filter = %self.name(), warnings = validation.warnings.len(), "filter configured");
        self.base().publish(Notification::ConfigurationChanged {
            filter: self.name().to_owned(),
        });
        Ok(validation)
    }

    /// 설정이 유효하지 않으면 에러를 반환하는 [`configure`](Self::configure)
    fn configure_strict(&self, settings: &Settings) -> Result<ValidationResult, FilterError> {
        let validation = self.configure(settings)?;
        if validation.is_valid {
            Ok(validation)
        } else {
            Err(FilterError::Config {
                filter: self.name().to_owned(),
                field: "settings".to_owned(),
                reason: validation.errors.join("; "),
            })
        }
    }

    /// 통계와 필터별 런타임 상태를 초기화합니다.
    fn reset(&self) {
        self.base().statistics.reset();
        self.reset_state();
    }

    /// 진단 정보
    fn diagnostics(&self) -> FilterDiagnostics {
        FilterDiagnostics {
            name: self.name().to_owned(),
            kind: self.kind(),
            enabled: self.is_enabled(),
            priority: self.priority(),
            settings: self.settings(),
            statistics: self.statistics(),
            details: self.details(),
        }
    }

    /// 공통 평가 알고리즘을 적용해 이벤트를 처리합니다.
    ///
    /// 에러와 패닉은 허용으로 변환되며(fail-open) 통계에 에러로 남습니다.
    fn process(&self, event: &Event, ctx: &FilterContext) -> FilterResult {
        let started = Instant::now();

        let mut result = if !self.is_enabled() {
            FilterResult::allow("filter disabled")
        } else if !self.can_handle(event) {
            FilterResult::allow("filter not applicable")
        } else {
            match catch_unwind(AssertUnwindSafe(|| self.evaluate(event, ctx))) {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => {
                    warn!(filter = %self.name(), error = %e, "filter evaluation failed, allowing event");
                    self.record_failure();
                    FilterResult::fail_open(format!("fail-open: {e}"))
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    warn!(filter = %self.name(), panic = %message, "filter panicked, allowing event");
                    self.record_failure();
                    FilterResult::fail_open(format!("fail-open: filter panicked: {message}"))
                }
            }
        };

        if result.decision == FilterDecision::Modify && result.modified_event.is_none() {
            result.decision = FilterDecision::Allow;
        }
        result.processing_time = started.elapsed();
        self.base()
            .statistics
            .record(result.decision, result.processing_time);

        counter!(
            m::FILTER_EVENTS_TOTAL,
            m::LABEL_FILTER => self.name().to_owned(),
            m::LABEL_DECISION => result.decision.as_str(),
        )
        .increment(1);
        histogram!(
            m::FILTER_PROCESSING_DURATION_SECONDS,
            m::LABEL_FILTER => self.name().to_owned(),
        )
        .record(result.processing_time.as_secs_f64());

        result
    }

    #[doc(hidden)]
    fn record_failure(&self) {
        self.base().statistics.record_error();
        counter!(m::FILTER_ERRORS_TOTAL, m::LABEL_FILTER => self.name().to_owned()).increment(1);
    }
}

impl fmt::Debug for dyn Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("name", &self.name())
            .field("kind", &self.kind())
            .field("priority", &self.priority())
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

/// 독점 락을 잡습니다. 오염된 락은 복구합니다.
pub(crate) fn write_lock<T: ?Sized>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 공유 락을 잡습니다. 오염된 락은 복구합니다.
pub(crate) fn read_lock<T: ?Sized>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}
