//! 이벤트 모델 벤치마크
//!
//! Event 생성, 접근자, 메시지 교체, JSON 역직렬화 성능을 측정합니다.

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use ironsieve_core::event::Event;
use ironsieve_core::settings::{ConfigValue, Settings};
use ironsieve_core::types::{Alert, LogEntry, Severity};

fn create_log_entry() -> LogEntry {
    LogEntry::new(Severity::Info, "http", "GET /api/v1/users HTTP/1.1 200 OK")
        .with_source_context("App.Web.Users")
        .with_correlation_id("550e8400-e29b-41d4-a716-446655440000")
        .with_property("user_id", "u-1024")
        .with_property("duration_ms", "125")
}

fn create_alert() -> Alert {
    Alert::new(Severity::Error, "App.Billing.Gateway", "payment provider timeout")
        .with_tag("payments")
        .with_context("session_id", "s-77")
}

fn bench_event_creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_creation");
    group.throughput(Throughput::Elements(1));

    group.bench_function("log_entry", |b| {
        b.iter(|| black_box(Event::from(create_log_entry())))
    });
    group.bench_function("alert", |b| b.iter(|| black_box(Event::from(create_alert()))));

    group.finish();
}

fn bench_event_access(c: &mut Criterion) {
    let event = Event::from(create_log_entry());

    let mut group = c.benchmark_group("event_access");
    group.bench_function("accessors", |b| {
        b.iter(|| {
            black_box(event.severity());
            black_box(event.source());
            black_box(event.tag());
            black_box(event.property("user_id"));
        })
    });
    group.bench_function("with_message", |b| {
        b.iter(|| black_box(event.with_message("[redacted]")))
    });
    group.finish();
}

fn bench_event_deserialize(c: &mut Criterion) {
    let line = r#"{"type":"log","level":"warning","channel":"db","message":"slow query","source_context":"App.Db","timestamp":"2024-03-01T12:30:00Z","properties":{"user_id":"u-1"}}"#;

    let mut group = c.benchmark_group("event_deserialize");
    group.throughput(Throughput::Bytes(line.len() as u64));
    group.bench_function("json_line", |b| {
        b.iter(|| black_box(serde_json::from_str::<Event>(black_box(line)).unwrap()))
    });
    group.finish();
}

fn bench_settings_coercion(c: &mut Criterion) {
    let settings = Settings::new()
        .with("limit", "100")
        .with("rate", ConfigValue::Int(1))
        .with("patterns", "App.*, Core.*, Vendor.*");

    c.bench_function("settings_coercion", |b| {
        b.iter(|| {
            black_box(settings.int("limit").unwrap());
            black_box(settings.float("rate").unwrap());
            black_box(settings.string_list("patterns").unwrap());
        })
    });
}

criterion_group!(
    benches,
    bench_event_creation,
    bench_event_access,
    bench_event_deserialize,
    bench_settings_coercion
);
criterion_main!(benches);
