//! 샘플링 필터 -- 확률적으로 일부 이벤트만 통과
//!
//! # 전략
//! - `uniform`: `rand() < rate`
//! - `systematic`: `seen % round(1 / rate) == 0`
//! - `level_weighted`: 레벨별 가중치를 곱한 비율로 uniform 샘플링
//! - `adaptive`: 관측 통과율이 목표보다 낮으면 실효 비율을 5% 올리고, 높으면 5% 내림
//!
//! # 설정 키
//! - `strategy`, `rate` (0.0 ..= 1.0, 범위 밖은 잘라내고 경고)
//! - `seed`: 지정하면 결정적인 난수열을 사용
//! - `level_weights`: `"레벨=가중치"` 목록, 기본 가중치를 덮어씁니다.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, RwLock};

use ironsieve_core::event::Event;
use ironsieve_core::settings::{ConfigValue, Settings};
use ironsieve_core::types::Severity;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{
    Filter, FilterBase, FilterContext, FilterKind, FilterResult, SettingsReader, ValidationResult,
    read_lock, write_lock,
};
use crate::error::FilterError;

/// 적응형 샘플링의 한 번 조정 폭
const ADAPTIVE_STEP: f64 = 0.05;

/// 샘플링 전략
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SamplingStrategy {
    /// 균등 확률
    #[default]
    Uniform,
    /// N번째마다 통과
    Systematic,
    /// 레벨 가중치 적용
    LevelWeighted,
    /// 관측 비율에 따라 조정
    Adaptive,
}

impl SamplingStrategy {
    /// 문자열에서 전략을 파싱합니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "uniform" | "random" => Some(Self::Uniform),
            "systematic" => Some(Self::Systematic),
            "levelweighted" | "weighted" => Some(Self::LevelWeighted),
            "adaptive" => Some(Self::Adaptive),
            _ => None,
        }
    }

    /// 스네이크 케이스 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uniform => "uniform",
            Self::Systematic => "systematic",
            Self::LevelWeighted => "level_weighted",
            Self::Adaptive => "adaptive",
        }
    }
}

/// 기본 레벨 가중치
fn default_weight(level: Severity) -> f64 {
    match level {
        Severity::Trace => 0.1,
        Severity::Debug => 0.3,
        Severity::Info => 0.6,
        Severity::Warning => 0.8,
        Severity::Error | Severity::Critical => 1.0,
    }
}

#[derive(Debug, Clone)]
struct SamplingConfig {
    strategy: SamplingStrategy,
    rate: f64,
    seed: Option<u64>,
    weights: BTreeMap<Severity, f64>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            strategy: SamplingStrategy::Uniform,
            rate: 1.0,
            seed: None,
            weights: BTreeMap::new(),
        }
    }
}

impl SamplingConfig {
    fn parse(settings: &Settings) -> (Self, ValidationResult) {
        let mut r = SettingsReader::new(settings);
        let strategy = r.enum_value(
            "strategy",
            "uniform|systematic|level_weighted|adaptive",
            SamplingStrategy::Uniform,
            SamplingStrategy::from_str_loose,
        );

        let raw_rate = r.float("rate", 1.0);
        let rate = if raw_rate.is_nan() {
            r.error("rate must be a number");
            1.0
        } else if !(0.0..=1.0).contains(&raw_rate) {
            let clamped = raw_rate.clamp(0.0, 1.0);
            r.warn(format!("rate {raw_rate} clamped to {clamped}"));
            clamped
        } else {
            raw_rate
        };

        let seed = settings.contains("seed").then(|| r.non_negative("seed", 0));

        let mut weights = BTreeMap::new();
        for entry in r.list("level_weights") {
            let parsed = entry.split_once('=').and_then(|(level, weight)| {
                Some((
                    Severity::from_str_loose(level)?,
                    weight.trim().parse::<f64>().ok()?,
                ))
            });
            match parsed {
                Some((_, w)) if !w.is_finite() || w < 0.0 => {
                    r.error(format!("level_weights: weight must be non-negative, got '{entry}'"));
                }
                Some((level, w)) => {
                    weights.insert(level, w);
                }
                None => r.error(format!("level_weights: expected 'level=weight', got '{entry}'")),
            }
        }
        if !weights.is_empty() && strategy != SamplingStrategy::LevelWeighted {
            r.warn("level_weights only apply to the level_weighted strategy");
        }

        (
            Self {
                strategy,
                rate,
                seed,
                weights,
            },
            r.finish(),
        )
    }

    fn weight(&self, level: Severity) -> f64 {
        self.weights
            .get(&level)
            .copied()
            .unwrap_or_else(|| default_weight(level))
    }
}

#[derive(Debug)]
struct SamplerState {
    rng: StdRng,
    seen: u64,
    passed: u64,
    effective_rate: f64,
}

impl SamplerState {
    fn new(config: &SamplingConfig) -> Self {
        Self {
            rng: match config.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            },
            seen: 0,
            passed: 0,
            effective_rate: config.rate,
        }
    }
}

/// 샘플링 필터
#[derive(Debug)]
pub struct SamplingFilter {
    base: FilterBase,
    config: RwLock<SamplingConfig>,
    state: Mutex<SamplerState>,
}

impl SamplingFilter {
    /// 모든 이벤트를 통과시키는 (rate = 1.0) 필터를 생성합니다.
    pub fn new(name: impl Into<String>) -> Self {
        let config = SamplingConfig::default();
        Self {
            base: FilterBase::new(name, FilterKind::Sampling.default_priority()),
            state: Mutex::new(SamplerState::new(&config)),
            config: RwLock::new(config),
        }
    }

    /// 설정으로 필터를 생성합니다.
    pub fn from_settings(name: impl Into<String>, settings: &Settings) -> Result<Self, FilterError> {
        let filter = Self::new(name);
        filter.configure_strict(settings)?;
        Ok(filter)
    }

    /// 현재 샘플링 비율 (적응형이면 실효 비율)
    pub fn effective_rate(&self) -> f64 {
        self.lock_state().effective_rate
    }

    fn lock_state(&self) -> MutexGuard<'_, SamplerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Filter for SamplingFilter {
    fn base(&self) -> &FilterBase {
        &self.base
    }

    fn kind(&self) -> FilterKind {
        FilterKind::Sampling
    }

    fn evaluate(&self, event: &Event, _ctx: &FilterContext) -> Result<FilterResult, FilterError> {
        let config = read_lock(&self.config);
        let mut state = self.lock_state();
        let seen = state.seen;
        state.seen += 1;

        let (pass, rate) = match config.strategy {
            SamplingStrategy::Uniform => (state.rng.r#gen::<f64>() < config.rate, config.rate),
            SamplingStrategy::Systematic => {
                let pass = if config.rate <= 0.0 {
                    false
                } else {
                    let every = (1.0 / config.rate).round().max(1.0) as u64;
                    seen % every == 0
                };
                (pass, config.rate)
            }
            SamplingStrategy::LevelWeighted => {
                let rate = (config.rate * config.weight(event.severity())).clamp(0.0, 1.0);
                (state.rng.r#gen::<f64>() < rate, rate)
            }
            SamplingStrategy::Adaptive => {
                let rate = state.effective_rate;
                let pass = state.rng.r#gen::<f64>() < rate;
                let observed = (state.passed + u64::from(pass)) as f64 / state.seen as f64;
                let next = if observed < config.rate {
                    (rate * (1.0 + ADAPTIVE_STEP)).max(ADAPTIVE_STEP * config.rate)
                } else if observed > config.rate {
                    rate * (1.0 - ADAPTIVE_STEP)
                } else {
                    rate
                };
                state.effective_rate = next.clamp(0.0, 1.0);
                (pass, rate)
            }
        };

        if pass {
            state.passed += 1;
            Ok(FilterResult::allow(format!("sampled in at rate {rate:.3}")))
        } else {
            Ok(FilterResult::suppress(format!("sampled out at rate {rate:.3}")))
        }
    }

    fn validate(&self, settings: &Settings) -> ValidationResult {
        SamplingConfig::parse(settings).1
    }

    fn apply(&self, settings: &Settings) -> Result<(), FilterError> {
        let (config, _) = SamplingConfig::parse(settings);
        let mut current = write_lock(&self.config);
        *self.lock_state() = SamplerState::new(&config);
        *current = config;
        Ok(())
    }

    fn reset_state(&self) {
        let config = read_lock(&self.config);
        *self.lock_state() = SamplerState::new(&config);
    }

    fn details(&self) -> BTreeMap<String, ConfigValue> {
        let config = read_lock(&self.config);
        let state = self.lock_state();
        BTreeMap::from([
            ("strategy".to_owned(), ConfigValue::from(config.strategy.as_str())),
            ("rate".to_owned(), ConfigValue::from(config.rate)),
            ("effective_rate".to_owned(), ConfigValue::from(state.effective_rate)),
            ("seen".to_owned(), ConfigValue::from(state.seen)),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterDecision;
    use crate::filter::test_support::log;

    const N: usize = 100_000;

    fn pass_rate(filter: &SamplingFilter, level: Severity) -> f64 {
        let event = log(level, "App", "m");
        let ctx = FilterContext::default();
        let passed = (0..N)
            .filter(|_| filter.process(&event, &ctx).decision == FilterDecision::Allow)
            .count();
        passed as f64 / N as f64
    }

    fn sampler(strategy: &str, rate: f64) -> SamplingFilter {
        SamplingFilter::from_settings(
            "s",
            &Settings::new()
                .with("strategy", strategy)
                .with("rate", rate)
                .with("seed", 42_i64),
        )
        .unwrap()
    }

    #[test]
    fn uniform_converges_within_two_percent() {
        for rate in [0.1, 0.5, 0.9] {
            let observed = pass_rate(&sampler("uniform", rate), Severity::Info);
            assert!((observed - rate).abs() <= 0.02, "rate {rate}: observed {observed}");
        }
    }

    #[test]
    fn systematic_is_exact() {
        let observed = pass_rate(&sampler("systematic", 0.25), Severity::Info);
        assert!((observed - 0.25).abs() < 1e-9);
    }

    #[test]
    fn level_weighted_scales_rate() {
        let filter = SamplingFilter::from_settings(
            "s",
            &Settings::new()
                .with("strategy", "LevelWeighted")
                .with("rate", 1.0)
                .with("seed", 7_i64)
                .with("level_weights", vec!["critical=1.0", "debug=0.3"]),
        )
        .unwrap();
        assert!((pass_rate(&filter, Severity::Debug) - 0.3).abs() <= 0.02);
        assert_eq!(pass_rate(&filter, Severity::Critical), 1.0);
    }

    #[test]
    fn adaptive_converges_to_target() {
        let observed = pass_rate(&sampler("adaptive", 0.2), Severity::Info);
        assert!((observed - 0.2).abs() <= 0.02, "observed {observed}");
    }

    #[test]
    fn out_of_range_rate_is_clamped_with_warning() {
        let filter = SamplingFilter::new("s");
        let result = filter.configure(&Settings::new().with("rate", 1.5)).unwrap();
        assert!(result.is_valid);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(filter.effective_rate(), 1.0);
    }

    #[test]
    fn same_seed_same_sequence() {
        let a = sampler("uniform", 0.5);
        let b = sampler("uniform", 0.5);
        let event = log(Severity::Info, "App", "m");
        let ctx = FilterContext::default();
        for _ in 0..100 {
            assert_eq!(a.process(&event, &ctx).decision, b.process(&event, &ctx).decision);
        }
    }

    #[test]
    fn reset_replays_seeded_sequence() {
        let filter = sampler("uniform", 0.5);
        let event = log(Severity::Info, "App", "m");
        let ctx = FilterContext::default();
        let first: Vec<_> = (0..50).map(|_| filter.process(&event, &ctx).decision).collect();
        filter.reset();
        let second: Vec<_> = (0..50).map(|_| filter.process(&event, &ctx).decision).collect();
        assert_eq!(first, second);
    }
}
