//! 필터 통계 집계
//!
//! [`FilterStatistics`]는 필터 하나가 내린 판정 수와 처리 시간을 원자적 카운터로
//! 집계합니다. 여러 스레드가 동시에 기록해도 안전하며, 카운터는 [`reset`] 외에는
//! 감소하지 않습니다. 필드 단위로만 원자적이므로 동시 호출 중의 스냅샷은
//! 필드 간 일관성을 보장하지 않습니다.
//!
//! [`reset`]: FilterStatistics::reset

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::filter::FilterDecision;

/// 필터별 원자적 통계 카운터
#[derive(Debug, Default)]
pub struct FilterStatistics {
    total: AtomicU64,
    allowed: AtomicU64,
    suppressed: AtomicU64,
    modified: AtomicU64,
    deferred: AtomicU64,
    errors: AtomicU64,
    total_processing_nanos: AtomicU64,
    max_processing_nanos: AtomicU64,
    /// epoch 밀리초, 0이면 기록 없음
    last_updated_millis: AtomicU64,
}

impl FilterStatistics {
    /// 빈 통계를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 판정 한 건을 기록합니다.
    pub fn record(&self, decision: FilterDecision, elapsed: Duration) {
        self.total.fetch_add(1, Ordering::Relaxed);
        let counter = match decision {
            FilterDecision::Allow => &self.allowed,
            FilterDecision::Suppress => &self.suppressed,
            FilterDecision::Modify => &self.modified,
            FilterDecision::Defer => &self.deferred,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.total_processing_nanos
            .fetch_add(nanos, Ordering::Relaxed);
        self.max_processing_nanos.fetch_max(nanos, Ordering::Relaxed);
        self.touch();
    }

    /// 평가 에러 한 건을 기록합니다. 판정 자체는 [`record`](Self::record)로 따로 기록합니다.
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    /// 현재 값의 불변 복사본을 만듭니다.
    pub fn snapshot(&self) -> StatisticsSnapshot {
        let total = self.total.load(Ordering::Relaxed);
        let total_nanos = self.total_processing_nanos.load(Ordering::Relaxed);
        let average_processing_time = if total == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(total_nanos / total)
        };
        let last_updated = match self.last_updated_millis.load(Ordering::Relaxed) {
            0 => None,
            millis => Some(UNIX_EPOCH + Duration::from_millis(millis)),
        };

        StatisticsSnapshot {
            total,
            allowed: self.allowed.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            modified: self.modified.load(Ordering::Relaxed),
            deferred: self.deferred.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            average_processing_time,
            max_processing_time: Duration::from_nanos(
                self.max_processing_nanos.load(Ordering::Relaxed),
            ),
            last_updated,
        }
    }

    /// 모든 카운터를 0으로 되돌립니다.
    pub fn reset(&self) {
        for counter in [
            &self.total,
            &self.allowed,
            &self.suppressed,
            &self.modified,
            &self.deferred,
            &self.errors,
            &self.total_processing_nanos,
            &self.max_processing_nanos,
            &self.last_updated_millis,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    fn touch(&self) {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(1)
            .max(1);
        self.last_updated_millis.store(millis, Ordering::Relaxed);
    }
}

/// 통계 스냅샷
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatisticsSnapshot {
    /// 처리한 이벤트 수
    pub total: u64,
    /// 허용
    pub allowed: u64,
    /// 억제
    pub suppressed: u64,
    /// 변경
    pub modified: u64,
    /// 보류
    pub deferred: u64,
    /// 평가 에러 (fail-open으로 허용된 수에도 포함됨)
    pub errors: u64,
    /// 평균 처리 시간
    #[serde(serialize_with = "serialize_micros")]
    pub average_processing_time: Duration,
    /// 최대 처리 시간
    #[serde(serialize_with = "serialize_micros")]
    pub max_processing_time: Duration,
    /// 마지막 기록 시각
    pub last_updated: Option<SystemTime>,
}

impl StatisticsSnapshot {
    /// 허용 비율 (0.0 ~ 1.0). 기록이 없으면 1.0
    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            (self.allowed + self.modified) as f64 / self.total as f64
        }
    }

    /// 억제 비율 (보류 포함)
    pub fn suppression_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.suppressed + self.deferred) as f64 / self.total as f64
        }
    }

    /// 다른 스냅샷의 카운터를 더한 합계를 반환합니다 (체인 전체 집계용).
    pub fn combined(&self, other: &StatisticsSnapshot) -> StatisticsSnapshot {
        let total = self.total + other.total;
        let weighted = |s: &StatisticsSnapshot| s.average_processing_time.as_nanos() * u128::from(s.total);
        let average_processing_time = if total == 0 {
            Duration::ZERO
        } else {
            let nanos = (weighted(self) + weighted(other)) / u128::from(total);
            Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
        };
        StatisticsSnapshot {
            total,
            allowed: self.allowed + other.allowed,
            suppressed: self.suppressed + other.suppressed,
            modified: self.modified + other.modified,
            deferred: self.deferred + other.deferred,
            errors: self.errors + other.errors,
            average_processing_time,
            max_processing_time: self.max_processing_time.max(other.max_processing_time),
            last_updated: self.last_updated.max(other.last_updated),
        }
    }
}

/// `Duration`을 마이크로초 실수로 직렬화합니다.
pub(crate) fn serialize_micros<S: serde::Serializer>(
    d: &Duration,
    s: S,
) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_nanos() as f64 / 1_000.0)
}
