//! 시간 소스 — 주입 가능한 시계
//!
//! 레이트 리미터와 시간대 필터는 현재 시각을 직접 읽지 않고 [`Clock`]을 통해
//! 조회합니다. 테스트에서는 [`ManualClock`]으로 시간을 임의로 진행시킬 수 있습니다.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// 현재 시각 제공자
pub trait Clock: Send + Sync {
    /// 현재 시각
    fn now(&self) -> SystemTime;
}

/// 시스템 시계
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// 수동으로 진행시키는 시계 (테스트, 재현 가능한 실행용)
///
/// 내부적으로 UNIX epoch 기준 나노초를 원자적으로 보관합니다.
#[derive(Debug)]
pub struct ManualClock {
    nanos: AtomicU64,
}

impl ManualClock {
    /// 주어진 시각에서 시작하는 시계를 생성합니다.
    pub fn new(start: SystemTime) -> Self {
        Self {
            nanos: AtomicU64::new(to_nanos(start)),
        }
    }

    /// epoch 기준 초에서 시작하는 시계를 생성합니다.
    pub fn from_epoch_secs(secs: u64) -> Self {
        Self::new(UNIX_EPOCH + Duration::from_secs(secs))
    }

    /// 시간을 진행시킵니다.
    pub fn advance(&self, by: Duration) {
        let delta = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        self.nanos.fetch_add(delta, Ordering::SeqCst);
    }

    /// 시각을 지정합니다.
    pub fn set(&self, to: SystemTime) {
        self.nanos.store(to_nanos(to), Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(UNIX_EPOCH)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

fn to_nanos(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::from_epoch_secs(1_000);
        clock.advance(Duration::from_secs(60));
        assert_eq!(
            clock.now().duration_since(UNIX_EPOCH).unwrap(),
            Duration::from_secs(1_060)
        );
    }

    #[test]
    fn manual_clock_set_overrides() {
        let clock = ManualClock::default();
        clock.set(UNIX_EPOCH + Duration::from_secs(5));
        assert_eq!(clock.now(), UNIX_EPOCH + Duration::from_secs(5));
    }

    #[test]
    fn system_clock_is_after_epoch() {
        assert!(SystemClock.now() > UNIX_EPOCH);
    }
}
