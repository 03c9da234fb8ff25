//! 필터 체인 -- 우선순위 순으로 필터를 평가하고 최종 판정을 내림
//!
//! [`FilterChain`]은 필터 목록을 `RwLock`으로 보호합니다. 평가는 공유 락으로
//! 여러 스레드에서 동시에 수행할 수 있고, 추가/제거/초기화는 독점 락을 잡습니다.
//!
//! # 평가 흐름
//! 1. 체인 비활성 또는 필터 없음 -> Allow
//! 2. 우선순위 오름차순(동률이면 추가 순서)으로 활성 필터 평가
//! 3. 첫 Suppress/Defer에서 중단
//! 4. Modify 결과는 이후 필터가 보는 이벤트를 대체
//! 5. 필터가 실패하면 허용으로 간주하고 다음 필터로 진행
//!    (`continue_on_error = false`이면 그 자리에서 허용으로 종료)
//!
//! # 상태
//! `Created -> Configured -> Evaluating -> Disposed`

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};

use metrics::counter;
use serde::Serialize;
use tracing::{debug, info, warn};

use ironsieve_core::event::Event;
use ironsieve_core::metrics as m;
use ironsieve_core::publish::{MessagePublisher, Notification, NullPublisher};

use crate::config::ChainOptions;
use crate::error::FilterError;
use crate::filter::{
    Filter, FilterContext, FilterDecision, FilterDiagnostics, ValidationResult, read_lock,
    write_lock,
};
use crate::stats::{FilterStatistics, StatisticsSnapshot, serialize_micros};

/// 체인 생명주기 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainState {
    /// 생성됨 (필터 없음)
    Created,
    /// 필터가 추가됨
    Configured,
    /// 한 번 이상 평가함
    Evaluating,
    /// 폐기됨 (종료 상태)
    Disposed,
}

impl ChainState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Created,
            1 => Self::Configured,
            2 => Self::Evaluating,
            _ => Self::Disposed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Created => 0,
            Self::Configured => 1,
            Self::Evaluating => 2,
            Self::Disposed => 3,
        }
    }
}

impl fmt::Display for ChainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Configured => write!(f, "configured"),
            Self::Evaluating => write!(f, "evaluating"),
            Self::Disposed => write!(f, "disposed"),
        }
    }
}

/// 필터 하나의 평가 기록
#[derive(Debug, Clone, Serialize)]
pub struct FilterTrace {
    /// 필터 이름
    pub filter: String,
    /// 판정
    pub decision: FilterDecision,
    /// 사유
    pub reason: String,
    /// 실패를 허용으로 대신했는지
    pub failed: bool,
    /// 처리 시간
    #[serde(serialize_with = "serialize_micros")]
    pub processing_time: Duration,
}

/// 체인 평가 결과
#[derive(Debug, Clone, Serialize)]
pub struct ChainOutcome {
    /// 최종 판정
    pub decision: FilterDecision,
    /// 판정을 결정한 필터 (통과면 `None`)
    pub deciding_filter: Option<String>,
    /// 사유
    pub reason: String,
    /// Modify 결과가 있었다면 최종 이벤트
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<Event>,
    /// 평가된 필터별 기록 (평가 순)
    pub trace: Vec<FilterTrace>,
    /// 전체 처리 시간
    #[serde(serialize_with = "serialize_micros")]
    pub processing_time: Duration,
}

impl ChainOutcome {
    fn pass(reason: impl Into<String>) -> Self {
        Self {
            decision: FilterDecision::Allow,
            deciding_filter: None,
            reason: reason.into(),
            event: None,
            trace: Vec::new(),
            processing_time: Duration::ZERO,
        }
    }

    /// 이벤트를 계속 처리해야 하는지 (Allow, Modify)
    pub fn should_process(&self) -> bool {
        self.decision.is_pass()
    }
}

/// 체인 진단 정보
#[derive(Debug, Clone, Serialize)]
pub struct ChainDiagnostics {
    /// 상태
    pub state: ChainState,
    /// 체인 활성화 여부
    pub enabled: bool,
    /// 필터 수
    pub filter_count: usize,
    /// 체인 전체 통계 (최종 판정 기준)
    pub statistics: StatisticsSnapshot,
    /// 모든 필터의 통계 합계 (필터 판정 기준)
    pub filter_totals: StatisticsSnapshot,
    /// 필터별 진단 (평가 순)
    pub filters: Vec<FilterDiagnostics>,
}

struct Entry {
    seq: u64,
    filter: Arc<dyn Filter>,
}

/// 필터 체인
pub struct FilterChain {
    filters: RwLock<Vec<Entry>>,
    next_seq: AtomicU64,
    enabled: AtomicBool,
    continue_on_error: AtomicBool,
    state: AtomicU8,
    statistics: FilterStatistics,
    publisher: Arc<dyn MessagePublisher>,
    recent: Mutex<VecDeque<Arc<Event>>>,
    recent_window: usize,
}

impl FilterChain {
    /// 옵션으로 빈 체인을 생성합니다.
    pub fn new(options: &ChainOptions) -> Self {
        Self {
            filters: RwLock::new(Vec::new()),
            next_seq: AtomicU64::new(0),
            enabled: AtomicBool::new(options.enabled),
            continue_on_error: AtomicBool::new(options.continue_on_error),
            state: AtomicU8::new(ChainState::Created.as_u8()),
            statistics: FilterStatistics::new(),
            publisher: Arc::new(NullPublisher),
            recent: Mutex::new(VecDeque::with_capacity(options.recent_window)),
            recent_window: options.recent_window,
        }
    }

    /// 알림 발행자를 지정합니다. 이후 추가되는 필터에도 주입됩니다.
    pub fn with_publisher(mut self, publisher: Arc<dyn MessagePublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    /// 현재 상태
    pub fn state(&self) -> ChainState {
        ChainState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// 필터를 추가합니다.
    ///
    /// 같은 이름이 이미 있으면 [`FilterError::DuplicateFilter`],
    /// 폐기된 체인이면 [`FilterError::Disposed`]를 반환합니다.
    pub fn add_filter(&self, filter: Arc<dyn Filter>) -> Result<(), FilterError> {
        let mut filters = write_lock(&self.filters);
        if self.state() == ChainState::Disposed {
            return Err(FilterError::Disposed);
        }
        if filters.iter().any(|e| e.filter.name() == filter.name()) {
            return Err(FilterError::DuplicateFilter {
                name: filter.name().to_owned(),
            });
        }

        filter.base().set_publisher(Arc::clone(&self.publisher));
        let name = filter.name().to_owned();
        let priority = filter.priority();
        filters.push(Entry {
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            filter,
        });
        sort_entries(&mut filters);
        let _ = self.state.compare_exchange(
            ChainState::Created.as_u8(),
            ChainState::Configured.as_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        drop(filters);

        info!(filter = %name, priority, "filter added to chain");
        self.publisher.publish(Notification::FilterAdded { filter: name });
        Ok(())
    }

    /// 이름으로 필터를 제거합니다. 없으면 `false`를 반환합니다.
    pub fn remove_filter(&self, name: &str) -> bool {
        let removed = {
            let mut filters = write_lock(&self.filters);
            let before = filters.len();
            filters.retain(|e| e.filter.name() != name);
            filters.len() != before
        };
        if removed {
            info!(filter = %name, "filter removed from chain");
            self.publisher.publish(Notification::FilterRemoved {
                filter: name.to_owned(),
            });
        }
        removed
    }

    /// 모든 필터를 제거하고 제거한 수를 반환합니다.
    pub fn clear_filters(&self) -> usize {
        let removed: Vec<String> = write_lock(&self.filters)
            .drain(..)
            .map(|e| e.filter.name().to_owned())
            .collect();
        for name in &removed {
            self.publisher.publish(Notification::FilterRemoved {
                filter: name.clone(),
            });
        }
        if !removed.is_empty() {
            info!(count = removed.len(), "all filters cleared from chain");
        }
        removed.len()
    }

    /// 이름으로 필터를 찾습니다.
    pub fn get_filter(&self, name: &str) -> Option<Arc<dyn Filter>> {
        read_lock(&self.filters)
            .iter()
            .find(|e| e.filter.name() == name)
            .map(|e| Arc::clone(&e.filter))
    }

    /// 평가 순서대로 필터 이름
    pub fn filter_names(&self) -> Vec<String> {
        self.snapshot()
            .iter()
            .map(|f| f.name().to_owned())
            .collect()
    }

    /// 필터 수
    pub fn len(&self) -> usize {
        read_lock(&self.filters).len()
    }

    /// 필터가 없는지
    pub fn is_empty(&self) -> bool {
        read_lock(&self.filters).is_empty()
    }

    /// 체인 활성화 여부
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// 체인 전체를 켜거나 끕니다. 꺼진 체인은 모든 이벤트를 허용합니다.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
        info!(enabled, "filter chain toggled");
    }

    /// 필터 하나를 켜거나 끕니다. 통계는 유지됩니다.
    pub fn set_filter_enabled(&self, name: &str, enabled: bool) -> Result<(), FilterError> {
        let filter = self.get_filter(name).ok_or_else(|| FilterError::NotFound {
            name: name.to_owned(),
        })?;
        filter.set_enabled(enabled);
        debug!(filter = %name, enabled, "filter toggled");
        Ok(())
    }

    /// 필터 우선순위를 바꾸고 평가 순서를 다시 정렬합니다.
    pub fn set_filter_priority(&self, name: &str, priority: i32) -> Result<(), FilterError> {
        let mut filters = write_lock(&self.filters);
        let entry = filters
            .iter()
            .find(|e| e.filter.name() == name)
            .ok_or_else(|| FilterError::NotFound {
                name: name.to_owned(),
            })?;
        entry.filter.set_priority(priority);
        sort_entries(&mut filters);
        Ok(())
    }

    /// 이벤트를 처리해야 하는지 판정합니다.
    pub fn should_process(&self, event: &Event, correlation_id: &str) -> bool {
        self.evaluate(event, correlation_id).should_process()
    }

    /// 이벤트를 체인에 통과시키고 상세 결과를 반환합니다.
    pub fn evaluate(&self, event: &Event, correlation_id: &str) -> ChainOutcome {
        let started = Instant::now();

        if self.state() == ChainState::Disposed {
            return ChainOutcome::pass("chain disposed");
        }
        if !self.is_enabled() {
            return self.finish(ChainOutcome::pass("chain disabled"), started);
        }

        let filters = self.snapshot();
        if filters.is_empty() {
            return self.finish(ChainOutcome::pass("no filters"), started);
        }
        let _ = self.state.compare_exchange(
            ChainState::Configured.as_u8(),
            ChainState::Evaluating.as_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );

        let mut ctx = FilterContext::new(correlation_id).with_recent_events(self.recent_snapshot());
        let continue_on_error = self.continue_on_error.load(Ordering::Acquire);
        let mut outcome = ChainOutcome::pass("all filters passed");
        let mut current: Option<Event> = None;

        for (position, filter) in filters.iter().enumerate() {
            if !filter.is_enabled() {
                continue;
            }
            ctx.position = position;
            let seen = current.as_ref().unwrap_or(event);
            let result = filter.process(seen, &ctx);
            let failed = result.is_fail_open();

            outcome.trace.push(FilterTrace {
                filter: filter.name().to_owned(),
                decision: result.decision,
                reason: result.reason.clone(),
                failed,
                processing_time: result.processing_time,
            });

            match result.decision {
                FilterDecision::Suppress | FilterDecision::Defer => {
                    debug!(
                        filter = %filter.name(),
                        decision = %result.decision,
                        reason = %result.reason,
                        "event stopped by filter"
                    );
                    outcome.decision = result.decision;
                    outcome.deciding_filter = Some(filter.name().to_owned());
                    outcome.reason = result.reason;
                    break;
                }
                FilterDecision::Modify => {
                    if let Some(modified) = result.modified_event {
                        current = Some(modified);
                        outcome.decision = FilterDecision::Modify;
                    }
                }
                FilterDecision::Allow => {
                    if failed && !continue_on_error {
                        outcome.deciding_filter = Some(filter.name().to_owned());
                        outcome.reason = result.reason;
                        break;
                    }
                }
            }
        }

        if outcome.decision == FilterDecision::Modify {
            outcome.event = current;
            if outcome.deciding_filter.is_none() {
                outcome.reason = "event modified".to_owned();
            }
        }

        self.remember(event);
        self.finish(outcome, started)
    }

    /// 필터별 통계
    pub fn filter_statistics(&self) -> BTreeMap<String, StatisticsSnapshot> {
        self.snapshot()
            .iter()
            .map(|f| (f.name().to_owned(), f.statistics()))
            .collect()
    }

    /// 체인 전체 통계 (최종 판정 기준)
    pub fn statistics(&self) -> StatisticsSnapshot {
        self.statistics.snapshot()
    }

    /// 각 필터의 현재 설정을 다시 검증합니다.
    ///
    /// 검증 중 패닉한 필터는 에러 항목으로 보고됩니다.
    pub fn validate_filters(&self) -> BTreeMap<String, ValidationResult> {
        self.snapshot()
            .iter()
            .map(|f| {
                let result = catch_unwind(AssertUnwindSafe(|| f.validate(&f.settings())))
                    .unwrap_or_else(|_| {
                        warn!(filter = %f.name(), "filter validation panicked");
                        ValidationResult::invalid("validation panicked")
                    });
                (f.name().to_owned(), result)
            })
            .collect()
    }

    /// 모든 필터와 체인 통계를 초기화합니다.
    ///
    /// 필터별 결과를 반환하며, 초기화 중 패닉한 필터는 에러 항목이 됩니다.
    pub fn reset_filters(&self) -> BTreeMap<String, Result<(), String>> {
        let results = self
            .snapshot()
            .iter()
            .map(|f| {
                let result = catch_unwind(AssertUnwindSafe(|| f.reset())).map_err(|_| {
                    warn!(filter = %f.name(), "filter reset panicked");
                    "reset panicked".to_owned()
                });
                (f.name().to_owned(), result)
            })
            .collect();
        self.statistics.reset();
        self.lock_recent().clear();
        self.publisher
            .publish(Notification::StatisticsReset { filter: None });
        results
    }

    /// 필터 하나를 초기화합니다.
    pub fn reset_filter(&self, name: &str) -> Result<(), FilterError> {
        let filter = self.get_filter(name).ok_or_else(|| FilterError::NotFound {
            name: name.to_owned(),
        })?;
        filter.reset();
        self.publisher.publish(Notification::StatisticsReset {
            filter: Some(name.to_owned()),
        });
        Ok(())
    }

    /// 진단 정보
    pub fn diagnostics(&self) -> ChainDiagnostics {
        let filters: Vec<FilterDiagnostics> =
            self.snapshot().iter().map(|f| f.diagnostics()).collect();
        let filter_totals = filters
            .iter()
            .fold(StatisticsSnapshot::default(), |acc, f| acc.combined(&f.statistics));
        ChainDiagnostics {
            state: self.state(),
            enabled: self.is_enabled(),
            filter_count: filters.len(),
            statistics: self.statistics(),
            filter_totals,
            filters,
        }
    }

    /// 체인을 폐기합니다. 이후 평가는 모두 허용되고 추가는 실패합니다.
    pub fn dispose(&self) {
        let previous = self
            .state
            .swap(ChainState::Disposed.as_u8(), Ordering::AcqRel);
        if ChainState::from_u8(previous) == ChainState::Disposed {
            return;
        }
        write_lock(&self.filters).clear();
        self.lock_recent().clear();
        info!("filter chain disposed");
        self.publisher.publish(Notification::ChainDisposed);
    }

    /// 평가 순서대로 정렬된 필터 목록
    ///
    /// `configure`로 우선순위가 바뀐 필터도 반영되도록 호출마다 현재 우선순위로 정렬합니다.
    fn snapshot(&self) -> Vec<Arc<dyn Filter>> {
        let mut entries: Vec<(i32, u64, Arc<dyn Filter>)> = read_lock(&self.filters)
            .iter()
            .map(|e| (e.filter.priority(), e.seq, Arc::clone(&e.filter)))
            .collect();
        entries.sort_by_key(|(priority, seq, _)| (*priority, *seq));
        entries.into_iter().map(|(_, _, filter)| filter).collect()
    }

    fn finish(&self, mut outcome: ChainOutcome, started: Instant) -> ChainOutcome {
        outcome.processing_time = started.elapsed();
        self.statistics
            .record(outcome.decision, outcome.processing_time);
        counter!(m::CHAIN_EVALUATIONS_TOTAL, m::LABEL_DECISION => outcome.decision.as_str())
            .increment(1);
        if !outcome.should_process() {
            counter!(m::CHAIN_SUPPRESSED_TOTAL).increment(1);
        }
        outcome
    }

    fn recent_snapshot(&self) -> Vec<Arc<Event>> {
        if self.recent_window == 0 {
            return Vec::new();
        }
        self.lock_recent().iter().cloned().collect()
    }

    fn remember(&self, event: &Event) {
        if self.recent_window == 0 {
            return;
        }
        let mut recent = self.lock_recent();
        if recent.len() >= self.recent_window {
            recent.pop_front();
        }
        recent.push_back(Arc::new(event.clone()));
    }

    fn lock_recent(&self) -> MutexGuard<'_, VecDeque<Arc<Event>>> {
        self.recent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for FilterChain {
    fn default() -> Self {
        Self::new(&ChainOptions::default())
    }
}

impl fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterChain")
            .field("state", &self.state())
            .field("enabled", &self.is_enabled())
            .field("filters", &self.filter_names())
            .finish_non_exhaustive()
    }
}

/// 우선순위 오름차순, 동률이면 추가 순서
fn sort_entries(entries: &mut [Entry]) {
    entries.sort_by_key(|e| (e.filter.priority(), e.seq));
}
