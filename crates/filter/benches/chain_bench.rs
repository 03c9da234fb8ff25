//! 필터 체인 벤치마크
//!
//! 체인 평가, 패턴 매칭, 키별 레이트 리미터 처리량을 측정합니다.

use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use ironsieve_core::config::FilterSpec;
use ironsieve_core::event::Event;
use ironsieve_core::types::{LogEntry, Severity};
use ironsieve_filter::{
    ChainOptions, FilterChain, FilterFactory, KeyedRateLimiter, MatchMode, PatternMatcher,
    RateLimitConfig, RateLimitStrategy,
};

fn create_event(i: usize) -> Event {
    LogEntry::new(Severity::Warning, "http", format!("request {i} password=secret{i}"))
        .with_source_context(format!("App.Services.Worker{}", i % 16))
        .with_correlation_id(format!("req-{}", i % 64))
        .into()
}

fn typical_chain() -> FilterChain {
    let chain = FilterChain::new(&ChainOptions::default());
    let specs = [
        FilterSpec::new("min-level", "level").with_setting("min_level", "info"),
        FilterSpec::new("noisy", "source")
            .with_setting("mode", "blacklist")
            .with_setting("patterns", vec!["Vendor.*", "App.Health*"]),
        FilterSpec::new("redact", "content")
            .with_setting("mode", "redact")
            .with_setting("match_mode", "regex")
            .with_setting("patterns", vec!["password=\\S+"]),
        FilterSpec::new("limit", "rate_limit")
            .with_setting("limit", 1_000_000_i64)
            .with_setting("window_secs", 60_i64),
    ];
    if let Err(e) = FilterFactory::new().populate(&chain, &specs) {
        panic!("bench chain should build: {e}");
    }
    chain
}

fn bench_chain_evaluate(c: &mut Criterion) {
    let chain = typical_chain();
    let events: Vec<Event> = (0..256).map(create_event).collect();

    let mut group = c.benchmark_group("chain_evaluate");
    group.throughput(Throughput::Elements(events.len() as u64));
    group.bench_function("typical_four_filters", |b| {
        b.iter(|| {
            for event in &events {
                black_box(chain.evaluate(event, "bench"));
            }
        })
    });
    group.finish();
}

fn bench_chain_parallel(c: &mut Criterion) {
    let chain = Arc::new(typical_chain());
    let events: Arc<Vec<Event>> = Arc::new((0..256).map(create_event).collect());

    let mut group = c.benchmark_group("chain_parallel");
    for threads in [2_usize, 4] {
        group.throughput(Throughput::Elements((events.len() * threads) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            b.iter(|| {
                std::thread::scope(|s| {
                    for _ in 0..threads {
                        s.spawn(|| {
                            for event in events.iter() {
                                black_box(chain.should_process(event, "bench"));
                            }
                        });
                    }
                });
            })
        });
    }
    group.finish();
}

fn bench_pattern_matching(c: &mut Criterion) {
    let matcher = PatternMatcher::new();
    let mut group = c.benchmark_group("pattern_matching");
    for (mode, pattern) in [
        (MatchMode::Literal, "App.Services.Worker7"),
        (MatchMode::Wildcard, "App.*.Worker?"),
        (MatchMode::Regex, r"^App\.Services\.Worker\d+$"),
        (MatchMode::Hierarchical, "App.Services"),
    ] {
        group.bench_function(mode.to_string(), |b| {
            b.iter(|| black_box(matcher.matches("App.Services.Worker7", pattern, false, mode)))
        });
    }
    group.finish();
}

fn bench_rate_limiter(c: &mut Criterion) {
    let mut group = c.benchmark_group("rate_limiter");
    for strategy in [
        RateLimitStrategy::TokenBucket,
        RateLimitStrategy::FixedWindow,
        RateLimitStrategy::SlidingWindow,
        RateLimitStrategy::LeakyBucket,
    ] {
        let config = RateLimitConfig::new(strategy, 1_000, Duration::from_secs(1));
        let limiter = KeyedRateLimiter::new(config);
        let keys: Vec<String> = (0..64).map(|i| format!("App.Source{i}")).collect();
        let mut tick = 0_u64;
        group.bench_function(strategy.as_str(), |b| {
            b.iter(|| {
                tick += 1;
                let now = UNIX_EPOCH + Duration::from_millis(1_700_000_000_000 + tick);
                let key = &keys[(tick % 64) as usize];
                black_box(limiter.try_acquire(key, now))
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_chain_evaluate,
    bench_chain_parallel,
    bench_pattern_matching,
    bench_rate_limiter
);
criterion_main!(benches);
