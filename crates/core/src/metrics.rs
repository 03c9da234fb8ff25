//! 메트릭 상수 및 설명 등록
//!
//! 필터 엔진이 기록하는 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다. 레코더 설치는 바이너리의 몫이며,
//! 레코더가 없으면 기록은 아무 일도 하지 않습니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `ironsieve_`
//! - 영역: `filter_`, `chain_`, `rate_limit_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(
//!     ironsieve_core::metrics::FILTER_EVENTS_TOTAL,
//!     ironsieve_core::metrics::LABEL_FILTER => "level",
//!     ironsieve_core::metrics::LABEL_DECISION => "suppress",
//! )
//! .increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 필터 이름 레이블
pub const LABEL_FILTER: &str = "filter";

/// 필터 판정 레이블 (allow, suppress, modify, defer)
pub const LABEL_DECISION: &str = "decision";

/// 필터 종류 레이블
pub const LABEL_KIND: &str = "kind";

// ─── 필터 메트릭 ────────────────────────────────────────────────────

/// 필터별 판정 수 (labels: filter, decision)
pub const FILTER_EVENTS_TOTAL: &str = "ironsieve_filter_events_total";

/// 평가 중 에러로 fail-open 처리된 수 (labels: filter)
pub const FILTER_ERRORS_TOTAL: &str = "ironsieve_filter_errors_total";

/// 필터 1회 처리 시간 (labels: filter)
pub const FILTER_PROCESSING_DURATION_SECONDS: &str =
    "ironsieve_filter_processing_duration_seconds";

// ─── 체인 메트릭 ────────────────────────────────────────────────────

/// 체인 평가 수
pub const CHAIN_EVALUATIONS_TOTAL: &str = "ironsieve_chain_evaluations_total";

/// 체인이 억제(또는 보류)한 이벤트 수
pub const CHAIN_SUPPRESSED_TOTAL: &str = "ironsieve_chain_suppressed_total";

// ─── 레이트 리미터 메트릭 ──────────────────────────────────────────

/// 토큰 부족으로 거부된 이벤트 수 (labels: filter)
pub const RATE_LIMIT_DROPPED_TOTAL: &str = "ironsieve_rate_limit_dropped_total";

/// 현재 활성 버킷 수 (labels: filter)
pub const RATE_LIMIT_BUCKETS: &str = "ironsieve_rate_limit_buckets";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 필터 처리 시간 히스토그램 버킷 (초). 필터 평가는 마이크로초 단위입니다.
pub const PROCESSING_DURATION_BUCKETS: [f64; 9] = [
    0.000_001, 0.000_005, 0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.01, 0.1,
];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명을 등록합니다.
///
/// 레코더 설치 직후 한 번 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(
        FILTER_EVENTS_TOTAL,
        "Filter decisions by filter name and decision"
    );
    describe_counter!(
        FILTER_ERRORS_TOTAL,
        "Filter evaluation errors converted to allow (fail-open)"
    );
    describe_histogram!(
        FILTER_PROCESSING_DURATION_SECONDS,
        "Single filter evaluation latency in seconds"
    );
    describe_counter!(CHAIN_EVALUATIONS_TOTAL, "Events evaluated by the filter chain");
    describe_counter!(
        CHAIN_SUPPRESSED_TOTAL,
        "Events the filter chain suppressed or deferred"
    );
    describe_counter!(
        RATE_LIMIT_DROPPED_TOTAL,
        "Events rejected by a rate limiter for lack of capacity"
    );
    describe_gauge!(RATE_LIMIT_BUCKETS, "Live rate-limit buckets per filter");
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        FILTER_EVENTS_TOTAL,
        FILTER_ERRORS_TOTAL,
        FILTER_PROCESSING_DURATION_SECONDS,
        CHAIN_EVALUATIONS_TOTAL,
        CHAIN_SUPPRESSED_TOTAL,
        RATE_LIMIT_DROPPED_TOTAL,
        RATE_LIMIT_BUCKETS,
    ];

    #[test]
    fn all_metrics_start_with_ironsieve_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("ironsieve_"),
                "Metric '{}' does not start with 'ironsieve_' prefix",
                name
            );
        }
    }

    #[test]
    fn counters_end_with_total() {
        for name in [
            FILTER_EVENTS_TOTAL,
            FILTER_ERRORS_TOTAL,
            CHAIN_EVALUATIONS_TOTAL,
            CHAIN_SUPPRESSED_TOTAL,
            RATE_LIMIT_DROPPED_TOTAL,
        ] {
            assert!(name.ends_with("_total"), "{name}");
        }
    }

    #[test]
    fn describe_all_does_not_panic() {
        describe_all();
    }

    #[test]
    fn label_keys_are_lowercase() {
        for label in [LABEL_FILTER, LABEL_DECISION, LABEL_KIND] {
            assert_eq!(label.to_lowercase(), label);
        }
    }

    #[test]
    fn processing_duration_buckets_are_sorted() {
        let buckets = PROCESSING_DURATION_BUCKETS;
        for i in 1..buckets.len() {
            assert!(
                buckets[i] > buckets[i - 1],
                "Bucket values must be in ascending order"
            );
        }
    }
}
