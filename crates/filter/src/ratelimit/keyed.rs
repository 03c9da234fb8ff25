//! 키 단위 레이트 리미터 -- 소스 키별 버킷을 지연 생성하고 주기적으로 정리
//!
//! 버킷 맵 전체를 하나의 `Mutex`로 보호합니다. 정리(sweep)는 별도 타이머 없이
//! `try_acquire` 호출 중 `cleanup_interval`이 지났을 때 수행되며 O(버킷 수)입니다.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

use super::{RateLimitBucket, RateLimitConfig, acquire};

/// 기본 유휴 버킷 만료 시간 (10분)
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(600);
/// 기본 정리 주기 (60초)
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);
/// 기본 최대 버킷 수
pub const DEFAULT_MAX_BUCKETS: usize = 10_000;

#[derive(Debug, Default)]
struct BucketMap {
    buckets: HashMap<String, RateLimitBucket>,
    last_sweep: Option<SystemTime>,
}

/// 키 단위 레이트 리미터
#[derive(Debug)]
pub struct KeyedRateLimiter {
    config: RateLimitConfig,
    idle_timeout: Duration,
    cleanup_interval: Duration,
    max_buckets: usize,
    state: Mutex<BucketMap>,
}

impl KeyedRateLimiter {
    /// 기본 정리 정책으로 리미터를 생성합니다.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            max_buckets: DEFAULT_MAX_BUCKETS,
            state: Mutex::new(BucketMap::default()),
        }
    }

    /// 유휴 버킷 만료 시간을 지정합니다.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// 정리 주기를 지정합니다.
    pub fn with_cleanup_interval(mut self, cleanup_interval: Duration) -> Self {
        self.cleanup_interval = cleanup_interval;
        self
    }

    /// 최대 버킷 수를 지정합니다.
    pub fn with_max_buckets(mut self, max_buckets: usize) -> Self {
        self.max_buckets = max_buckets.max(1);
        self
    }

    /// 리밋 파라미터
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// `key`에 대해 이벤트 한 건의 허용 여부를 판정합니다.
    pub fn try_acquire(&self, key: &str, now: SystemTime) -> bool {
        let mut state = self.lock();

        let last_sweep = state.last_sweep;
        match last_sweep {
            None => state.last_sweep = Some(now),
            Some(last)
                if now.duration_since(last).unwrap_or(Duration::ZERO) >= self.cleanup_interval =>
            {
                self.sweep_locked(&mut state, now);
            }
            Some(_) => {}
        }

        if !state.buckets.contains_key(key) && state.buckets.len() >= self.max_buckets {
            self.sweep_locked(&mut state, now);
            if state.buckets.len() >= self.max_buckets {
                // 가장 오래 쓰이지 않은 버킷을 내보냄
                let oldest = state
                    .buckets
                    .iter()
                    .min_by_key(|(_, b)| b.last_event)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    warn!(
                        evicted = %oldest,
                        max_buckets = self.max_buckets,
                        "rate limit bucket cap reached, evicting least recently used"
                    );
                    state.buckets.remove(&oldest);
                }
            }
        }

        let bucket = state
            .buckets
            .entry(key.to_owned())
            .or_insert_with(|| RateLimitBucket::new(&self.config, now));
        acquire(self.config.strategy, bucket, now)
    }

    /// 유휴 버킷을 즉시 정리하고 제거한 수를 반환합니다.
    pub fn sweep(&self, now: SystemTime) -> usize {
        let mut state = self.lock();
        self.sweep_locked(&mut state, now)
    }

    /// 현재 버킷 수
    pub fn bucket_count(&self) -> usize {
        self.lock().buckets.len()
    }

    /// 버킷 상태 복사본
    pub fn bucket(&self, key: &str) -> Option<RateLimitBucket> {
        self.lock().buckets.get(key).cloned()
    }

    /// (전체 이벤트 수, 거부 수) 합계
    pub fn totals(&self) -> (u64, u64) {
        self.lock()
            .buckets
            .values()
            .fold((0, 0), |(total, suppressed), b| {
                (total + b.total_count, suppressed + b.suppressed_count)
            })
    }

    /// 모든 버킷을 제거합니다.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.buckets.clear();
        state.last_sweep = None;
    }

    fn sweep_locked(&self, state: &mut BucketMap, now: SystemTime) -> usize {
        let before = state.buckets.len();
        let idle_timeout = self.idle_timeout;
        state.buckets.retain(|_, b| !b.is_idle(now, idle_timeout));
        state.last_sweep = Some(now);
        let evicted = before - state.buckets.len();
        if evicted > 0 {
            debug!(evicted, remaining = state.buckets.len(), "swept idle rate limit buckets");
        }
        evicted
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BucketMap> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::RateLimitStrategy;
    use std::time::UNIX_EPOCH;

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_700_000_040 + secs)
    }

    fn limiter(limit: u64) -> KeyedRateLimiter {
        KeyedRateLimiter::new(RateLimitConfig::new(
            RateLimitStrategy::TokenBucket,
            limit,
            Duration::from_secs(60),
        ))
    }

    #[test]
    fn keys_have_independent_buckets() {
        let l = limiter(1);
        assert!(l.try_acquire("App.A", at(0)));
        assert!(!l.try_acquire("App.A", at(0)));
        assert!(l.try_acquire("App.B", at(0)));
        assert_eq!(l.bucket_count(), 2);
        assert_eq!(l.totals(), (3, 1));
    }

    #[test]
    fn idle_buckets_are_swept_on_access() {
        let l = limiter(5)
            .with_idle_timeout(Duration::from_secs(600))
            .with_cleanup_interval(Duration::from_secs(60));
        l.try_acquire("old", at(0));
        l.try_acquire("fresh", at(590));
        assert_eq!(l.bucket_count(), 2);

        // 정리 주기 경과 + "old"만 유휴 시간 초과
        l.try_acquire("fresh", at(660));
        assert_eq!(l.bucket_count(), 1);
        assert!(l.bucket("old").is_none());
        assert!(l.bucket("fresh").is_some());
    }

    #[test]
    fn explicit_sweep_returns_evicted_count() {
        let l = limiter(5).with_idle_timeout(Duration::from_secs(10));
        l.try_acquire("a", at(0));
        l.try_acquire("b", at(0));
        assert_eq!(l.sweep(at(5)), 0);
        assert_eq!(l.sweep(at(10)), 2);
        assert_eq!(l.bucket_count(), 0);
    }

    #[test]
    fn bucket_cap_evicts_least_recently_used() {
        let l = limiter(5).with_max_buckets(2);
        l.try_acquire("a", at(0));
        l.try_acquire("b", at(1));
        l.try_acquire("c", at(2));
        assert_eq!(l.bucket_count(), 2);
        assert!(l.bucket("a").is_none());
        assert!(l.bucket("c").is_some());
    }

    #[test]
    fn reset_clears_buckets() {
        let l = limiter(1);
        l.try_acquire("a", at(0));
        assert!(!l.try_acquire("a", at(0)));
        l.reset();
        assert_eq!(l.bucket_count(), 0);
        assert!(l.try_acquire("a", at(0)));
    }

    #[test]
    fn concurrent_acquire_never_over_admits() {
        let l = std::sync::Arc::new(limiter(50));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let l = std::sync::Arc::clone(&l);
                std::thread::spawn(move || (0..20).filter(|_| l.try_acquire("shared", at(0))).count())
            })
            .collect();
        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 50);
    }
}
