//! 레이트 리미터 -- 전략별 허용 판정과 키 단위 버킷 관리
//!
//! 모든 전략은 `(버킷 상태, now)`에 대한 순수 함수입니다. 내부에서 시계를 읽지 않으므로
//! 호출자가 주입한 시각으로 결정적인 테스트가 가능합니다.
//!
//! # 전략
//! - [`RateLimitStrategy::TokenBucket`]: `limit / window` 속도로 연속 충전, 최대 `burst_size`
//! - [`RateLimitStrategy::FixedWindow`]: epoch 기준 정렬된 고정 윈도우 카운트.
//!   윈도우 경계에서 최대 `2 × limit`까지 허용될 수 있습니다.
//! - [`RateLimitStrategy::SlidingWindow`]: 최근 `window` 동안의 허용 시각을 링 버퍼로 보관
//! - [`RateLimitStrategy::LeakyBucket`]: 수위가 `limit / window` 속도로 빠지고,
//!   수위 + 1 이 용량 이하일 때 허용

mod keyed;

pub use keyed::{
    DEFAULT_CLEANUP_INTERVAL, DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_BUCKETS, KeyedRateLimiter,
};

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;

/// 레이트 리밋 전략
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitStrategy {
    /// 토큰 버킷 (기본값)
    #[default]
    TokenBucket,
    /// 고정 윈도우
    FixedWindow,
    /// 슬라이딩 윈도우 (타임스탬프 링 버퍼)
    SlidingWindow,
    /// 리키 버킷
    LeakyBucket,
}

impl RateLimitStrategy {
    /// 문자열에서 전략을 파싱합니다 (대소문자, `-`/`_` 무시).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-' && *c != ' ')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "tokenbucket" | "token" => Some(Self::TokenBucket),
            "fixedwindow" | "fixed" => Some(Self::FixedWindow),
            "slidingwindow" | "sliding" => Some(Self::SlidingWindow),
            "leakybucket" | "leaky" => Some(Self::LeakyBucket),
            _ => None,
        }
    }

    /// 스네이크 케이스 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TokenBucket => "token_bucket",
            Self::FixedWindow => "fixed_window",
            Self::SlidingWindow => "sliding_window",
            Self::LeakyBucket => "leaky_bucket",
        }
    }
}

impl fmt::Display for RateLimitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 레이트 리밋 파라미터
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RateLimitConfig {
    /// 전략
    pub strategy: RateLimitStrategy,
    /// 윈도우당 허용 이벤트 수
    pub limit: u64,
    /// 윈도우 길이
    pub window: Duration,
    /// 버스트 용량 (토큰 버킷 최대 토큰, 리키 버킷 용량)
    pub burst_size: u64,
}

impl RateLimitConfig {
    /// `burst_size = limit`인 설정을 만듭니다.
    pub fn new(strategy: RateLimitStrategy, limit: u64, window: Duration) -> Self {
        Self {
            strategy,
            limit,
            window,
            burst_size: limit,
        }
    }

    /// 버스트 용량을 지정합니다.
    pub fn with_burst_size(mut self, burst_size: u64) -> Self {
        self.burst_size = burst_size;
        self
    }

    /// 초당 충전/배출 속도
    fn rate_per_sec(&self) -> f64 {
        let secs = self.window.as_secs_f64();
        if secs <= 0.0 {
            f64::INFINITY
        } else {
            self.limit as f64 / secs
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(RateLimitStrategy::TokenBucket, 100, Duration::from_secs(60))
    }
}

/// 키 하나에 대한 레이트 리밋 상태
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitBucket {
    /// 윈도우당 허용 수
    pub tokens_per_window: u64,
    /// 버스트 용량
    pub burst_size: u64,
    /// 윈도우 길이
    pub window: Duration,
    /// 남은 토큰 (`0 ..= burst_size`)
    pub available_tokens: f64,
    /// 현재 윈도우에서 허용된 수 (고정/슬라이딩 윈도우)
    pub window_count: u64,
    /// 현재 고정 윈도우 시작 시각
    pub window_start: SystemTime,
    /// 마지막 충전/배출 계산 시각
    pub last_refill: SystemTime,
    /// 마지막 이벤트 시각
    pub last_event: SystemTime,
    /// 이 버킷이 본 이벤트 수
    pub total_count: u64,
    /// 거부된 이벤트 수
    pub suppressed_count: u64,
    /// 리키 버킷 수위
    #[serde(skip)]
    level: f64,
    /// 슬라이딩 윈도우에서 허용된 시각들 (오래된 순)
    #[serde(skip)]
    recent: VecDeque<SystemTime>,
}

impl RateLimitBucket {
    /// 가득 찬 버킷을 생성합니다.
    pub fn new(config: &RateLimitConfig, now: SystemTime) -> Self {
        Self {
            tokens_per_window: config.limit,
            burst_size: config.burst_size,
            window: config.window,
            available_tokens: config.burst_size as f64,
            window_count: 0,
            window_start: align_to_window(now, config.window),
            last_refill: now,
            last_event: now,
            total_count: 0,
            suppressed_count: 0,
            level: 0.0,
            recent: VecDeque::new(),
        }
    }

    /// `now` 기준으로 `idle_timeout` 이상 이벤트가 없었는지 확인합니다.
    pub fn is_idle(&self, now: SystemTime, idle_timeout: Duration) -> bool {
        elapsed(self.last_event, now) >= idle_timeout
    }
}

/// 전략에 따라 이벤트 한 건의 허용 여부를 판정하고 버킷 상태를 갱신합니다.
///
/// 허용되면 `true`를 반환하며 용량 한 단위를 소비합니다.
pub fn acquire(strategy: RateLimitStrategy, bucket: &mut RateLimitBucket, now: SystemTime) -> bool {
    let config = RateLimitConfig {
        strategy,
        limit: bucket.tokens_per_window,
        window: bucket.window,
        burst_size: bucket.burst_size,
    };

    let allowed = match strategy {
        RateLimitStrategy::TokenBucket => token_bucket(&config, bucket, now),
        RateLimitStrategy::FixedWindow => fixed_window(&config, bucket, now),
        RateLimitStrategy::SlidingWindow => sliding_window(&config, bucket, now),
        RateLimitStrategy::LeakyBucket => leaky_bucket(&config, bucket, now),
    };

    bucket.total_count += 1;
    if now > bucket.last_event {
        bucket.last_event = now;
    }
    if !allowed {
        bucket.suppressed_count += 1;
    }
    bucket.available_tokens = bucket.available_tokens.clamp(0.0, bucket.burst_size as f64);
    allowed
}

fn token_bucket(config: &RateLimitConfig, bucket: &mut RateLimitBucket, now: SystemTime) -> bool {
    let capacity = config.burst_size as f64;
    let since = elapsed(bucket.last_refill, now);
    if !since.is_zero() {
        let refill = since.as_secs_f64() * config.rate_per_sec();
        bucket.available_tokens = (bucket.available_tokens + refill).min(capacity);
        bucket.last_refill = now;
    }
    if bucket.available_tokens >= 1.0 {
        bucket.available_tokens -= 1.0;
        true
    } else {
        false
    }
}

fn fixed_window(config: &RateLimitConfig, bucket: &mut RateLimitBucket, now: SystemTime) -> bool {
    let start = align_to_window(now, config.window);
    if start != bucket.window_start {
        bucket.window_start = start;
        bucket.window_count = 0;
    }
    let allowed = bucket.window_count < config.limit;
    if allowed {
        bucket.window_count += 1;
    }
    bucket.available_tokens = remaining(config, bucket.window_count);
    allowed
}

fn sliding_window(config: &RateLimitConfig, bucket: &mut RateLimitBucket, now: SystemTime) -> bool {
    while let Some(oldest) = bucket.recent.front() {
        if elapsed(*oldest, now) >= config.window {
            bucket.recent.pop_front();
        } else {
            break;
        }
    }
    let allowed = (bucket.recent.len() as u64) < config.limit;
    if allowed {
        bucket.recent.push_back(now);
    }
    bucket.window_count = bucket.recent.len() as u64;
    bucket.available_tokens = remaining(config, bucket.window_count);
    allowed
}

fn leaky_bucket(config: &RateLimitConfig, bucket: &mut RateLimitBucket, now: SystemTime) -> bool {
    let capacity = config.burst_size as f64;
    let since = elapsed(bucket.last_refill, now);
    if !since.is_zero() {
        let leaked = since.as_secs_f64() * config.rate_per_sec();
        bucket.level = (bucket.level - leaked).max(0.0);
        bucket.last_refill = now;
    }
    let allowed = bucket.level + 1.0 <= capacity;
    if allowed {
        bucket.level += 1.0;
    }
    bucket.available_tokens = capacity - bucket.level;
    allowed
}

fn remaining(config: &RateLimitConfig, used: u64) -> f64 {
    config.limit.saturating_sub(used).min(config.burst_size) as f64
}

/// 시계가 뒤로 가면 경과 시간을 0으로 취급합니다.
fn elapsed(from: SystemTime, to: SystemTime) -> Duration {
    to.duration_since(from).unwrap_or(Duration::ZERO)
}

fn align_to_window(now: SystemTime, window: Duration) -> SystemTime {
    let window_nanos = window.as_nanos();
    if window_nanos == 0 {
        return now;
    }
    let since_epoch = now.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO).as_nanos();
    let aligned = since_epoch - since_epoch % window_nanos;
    UNIX_EPOCH + Duration::from_nanos(u64::try_from(aligned).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn at(secs: f64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_700_000_040) + Duration::from_secs_f64(secs)
    }

    fn bucket(strategy: RateLimitStrategy, limit: u64, window_secs: u64) -> RateLimitBucket {
        let config = RateLimitConfig::new(strategy, limit, Duration::from_secs(window_secs));
        RateLimitBucket::new(&config, at(0.0))
    }

    #[test]
    fn token_bucket_exact_limit_and_refill() {
        let mut b = bucket(RateLimitStrategy::TokenBucket, 3, 60);
        for _ in 0..3 {
            assert!(acquire(RateLimitStrategy::TokenBucket, &mut b, at(0.0)));
        }
        assert!(!acquire(RateLimitStrategy::TokenBucket, &mut b, at(0.0)));
        assert!(acquire(RateLimitStrategy::TokenBucket, &mut b, at(60.0)));
        assert_eq!(b.total_count, 5);
        assert_eq!(b.suppressed_count, 1);
    }

    #[test]
    fn token_bucket_refills_continuously() {
        let mut b = bucket(RateLimitStrategy::TokenBucket, 60, 60);
        for _ in 0..60 {
            assert!(acquire(RateLimitStrategy::TokenBucket, &mut b, at(0.0)));
        }
        assert!(!acquire(RateLimitStrategy::TokenBucket, &mut b, at(0.5)));
        // 1초에 토큰 1개
        assert!(acquire(RateLimitStrategy::TokenBucket, &mut b, at(1.0)));
        assert!(!acquire(RateLimitStrategy::TokenBucket, &mut b, at(1.0)));
    }

    #[test]
    fn token_bucket_never_exceeds_burst() {
        let config = RateLimitConfig::new(RateLimitStrategy::TokenBucket, 10, Duration::from_secs(1))
            .with_burst_size(5);
        let mut b = RateLimitBucket::new(&config, at(0.0));
        // 오랜 유휴 후에도 burst_size까지만
        assert!(acquire(RateLimitStrategy::TokenBucket, &mut b, at(1_000.0)));
        assert!(b.available_tokens <= 4.0 + f64::EPSILON);
    }

    #[test]
    fn fixed_window_resets_on_epoch_boundary() {
        let mut b = bucket(RateLimitStrategy::FixedWindow, 2, 60);
        // at(0) = epoch 정렬된 윈도우 시작
        assert!(acquire(RateLimitStrategy::FixedWindow, &mut b, at(0.0)));
        assert!(acquire(RateLimitStrategy::FixedWindow, &mut b, at(10.0)));
        assert!(!acquire(RateLimitStrategy::FixedWindow, &mut b, at(59.0)));
        assert!(acquire(RateLimitStrategy::FixedWindow, &mut b, at(60.0)));
    }

    #[test]
    fn fixed_window_allows_double_burst_at_edge() {
        let mut b = bucket(RateLimitStrategy::FixedWindow, 2, 60);
        assert!(acquire(RateLimitStrategy::FixedWindow, &mut b, at(59.0)));
        assert!(acquire(RateLimitStrategy::FixedWindow, &mut b, at(59.5)));
        assert!(acquire(RateLimitStrategy::FixedWindow, &mut b, at(60.0)));
        assert!(acquire(RateLimitStrategy::FixedWindow, &mut b, at(60.5)));
        assert!(!acquire(RateLimitStrategy::FixedWindow, &mut b, at(61.0)));
    }

    #[test]
    fn sliding_window_blocks_edge_burst() {
        let mut b = bucket(RateLimitStrategy::SlidingWindow, 2, 60);
        assert!(acquire(RateLimitStrategy::SlidingWindow, &mut b, at(59.0)));
        assert!(acquire(RateLimitStrategy::SlidingWindow, &mut b, at(59.5)));
        assert!(!acquire(RateLimitStrategy::SlidingWindow, &mut b, at(60.0)));
        assert!(!acquire(RateLimitStrategy::SlidingWindow, &mut b, at(118.9)));
        // 첫 허용(59.0)이 윈도우 밖으로 나감
        assert!(acquire(RateLimitStrategy::SlidingWindow, &mut b, at(119.0)));
        assert_eq!(b.window_count, 2);
    }

    #[test]
    fn leaky_bucket_drains_at_constant_rate() {
        let mut b = bucket(RateLimitStrategy::LeakyBucket, 2, 2);
        assert!(acquire(RateLimitStrategy::LeakyBucket, &mut b, at(0.0)));
        assert!(acquire(RateLimitStrategy::LeakyBucket, &mut b, at(0.0)));
        assert!(!acquire(RateLimitStrategy::LeakyBucket, &mut b, at(0.0)));
        // 초당 1 배출
        assert!(acquire(RateLimitStrategy::LeakyBucket, &mut b, at(1.0)));
        assert!(!acquire(RateLimitStrategy::LeakyBucket, &mut b, at(1.0)));
    }

    #[test]
    fn zero_limit_denies_everything() {
        for strategy in [
            RateLimitStrategy::TokenBucket,
            RateLimitStrategy::FixedWindow,
            RateLimitStrategy::SlidingWindow,
            RateLimitStrategy::LeakyBucket,
        ] {
            let mut b = bucket(strategy, 0, 60);
            assert!(!acquire(strategy, &mut b, at(0.0)), "{strategy}");
            assert!(!acquire(strategy, &mut b, at(600.0)), "{strategy}");
        }
    }

    #[test]
    fn clock_going_backwards_does_not_refill() {
        let mut b = bucket(RateLimitStrategy::TokenBucket, 1, 60);
        assert!(acquire(RateLimitStrategy::TokenBucket, &mut b, at(30.0)));
        assert!(!acquire(RateLimitStrategy::TokenBucket, &mut b, at(0.0)));
    }

    #[test]
    fn strategy_parses_loosely() {
        assert_eq!(
            RateLimitStrategy::from_str_loose("Token-Bucket"),
            Some(RateLimitStrategy::TokenBucket)
        );
        assert_eq!(
            RateLimitStrategy::from_str_loose("sliding_window"),
            Some(RateLimitStrategy::SlidingWindow)
        );
        assert_eq!(RateLimitStrategy::from_str_loose("random"), None);
    }

    proptest! {
        #[test]
        fn token_bucket_tokens_stay_bounded(
            limit in 1u64..50,
            burst in 1u64..50,
            window_ms in 1u64..10_000,
            steps in proptest::collection::vec(0u64..5_000, 1..200),
        ) {
            let config = RateLimitConfig::new(
                RateLimitStrategy::TokenBucket,
                limit,
                Duration::from_millis(window_ms),
            )
            .with_burst_size(burst);
            let mut now = at(0.0);
            let mut b = RateLimitBucket::new(&config, now);
            for step in steps {
                now += Duration::from_millis(step);
                acquire(RateLimitStrategy::TokenBucket, &mut b, now);
                prop_assert!(b.available_tokens >= 0.0);
                prop_assert!(b.available_tokens <= burst as f64);
            }
        }

        #[test]
        fn sliding_window_never_exceeds_limit(
            limit in 1u64..20,
            steps in proptest::collection::vec(0u64..2_000, 1..200),
        ) {
            let config = RateLimitConfig::new(
                RateLimitStrategy::SlidingWindow,
                limit,
                Duration::from_secs(1),
            );
            let mut now = at(0.0);
            let mut b = RateLimitBucket::new(&config, now);
            for step in steps {
                now += Duration::from_millis(step);
                acquire(RateLimitStrategy::SlidingWindow, &mut b, now);
                prop_assert!(b.window_count <= limit);
            }
        }
    }
}
