#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`filter`]: `Filter` 트레이트와 내장 필터 (레벨, 소스, 내용, 상관, 시간대, 샘플링, 레이트 리밋, 복합, 태그)
//! - [`chain`]: 우선순위 순 평가, 단락, fail-open 처리를 담당하는 필터 체인
//! - [`ratelimit`]: 토큰 버킷 / 고정 윈도우 / 슬라이딩 윈도우 레이트 리미터
//! - [`pattern`]: 리터럴, 와일드카드, 정규식, 계층 패턴 매처 (정규식 캐시)
//! - [`stats`]: 필터별 원자적 통계 집계
//! - [`factory`]: 필터 정의로 필터를 생성하는 팩토리
//! - [`loader`]: YAML 필터 정의 로더
//! - [`config`]: 체인 런타임 옵션 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! ironsieve.toml / filters/*.yml
//!        |
//!   FilterFactory --> FilterChain --(priority order)--> Filter::process --> ChainOutcome
//!                          |                                  |
//!                   recent window                    FilterStatistics, metrics
//! ```

pub mod chain;
pub mod config;
pub mod error;
pub mod factory;
pub mod filter;
pub mod loader;
pub mod pattern;
pub mod ratelimit;
pub mod stats;

// --- 주요 타입 re-export ---

// 체인
pub use chain::{ChainDiagnostics, ChainOutcome, ChainState, FilterChain, FilterTrace};

// 설정
pub use config::ChainOptions;

// 에러
pub use error::FilterError;

// 필터
pub use filter::{
    Filter, FilterBase, FilterContext, FilterDecision, FilterDiagnostics, FilterKind,
    FilterResult, ValidationResult,
};
pub use filter::{
    BlockFilter, CompositeFilter, ContentFilter, CorrelationFilter, LevelFilter,
    LogicalOperator, PassThroughFilter, RateLimitFilter, SamplingFilter, SourceFilter, TagFilter,
    TimeRangeFilter,
};

// 생성/로딩
pub use factory::FilterFactory;
pub use loader::FilterLoader;

// 레이트 리미터
pub use ratelimit::{KeyedRateLimiter, RateLimitConfig, RateLimitStrategy};

// 패턴 매칭
pub use pattern::{MatchMode, PatternMatcher};

// 통계
pub use stats::{FilterStatistics, StatisticsSnapshot};
