//! ironsieve.toml 통합 설정 테스트
//!
//! - ironsieve.toml.example 파싱 테스트
//! - 부분 설정 (일부 섹션만) 로딩 테스트
//! - 환경변수 우선순위 테스트
//! - 빈 파일 / 잘못된 형식 에러 테스트

use ironsieve_core::config::IronsieveConfig;
use ironsieve_core::error::{ConfigError, IronsieveError};

const EXAMPLE: &str = include_str!("../../../ironsieve.toml.example");

// =============================================================================
// ironsieve.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_successfully() {
    let config = IronsieveConfig::parse(EXAMPLE).expect("example config should parse");

    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.general.log_format, "pretty");
}

#[test]
fn example_config_passes_validation() {
    let config = IronsieveConfig::parse(EXAMPLE).expect("should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_matches_code_defaults_for_chain() {
    let config = IronsieveConfig::parse(EXAMPLE).expect("should parse");
    let defaults = IronsieveConfig::default();

    assert_eq!(config.chain.enabled, defaults.chain.enabled);
    assert_eq!(config.chain.recent_window, defaults.chain.recent_window);
    assert_eq!(config.chain.filter_dir, defaults.chain.filter_dir);
    assert_eq!(
        config.chain.continue_on_error,
        defaults.chain.continue_on_error
    );
}

#[test]
fn example_config_declares_filters_in_priority_order() {
    let config = IronsieveConfig::parse(EXAMPLE).expect("should parse");
    let names: Vec<&str> = config.filters.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["min-level", "noisy-sources", "redact-secrets", "per-source-limit"]
    );

    let priorities: Vec<i32> = config.filters.iter().filter_map(|f| f.priority).collect();
    let mut sorted = priorities.clone();
    sorted.sort_unstable();
    assert_eq!(priorities, sorted);
}

#[test]
fn example_config_filter_settings_are_typed() {
    let config = IronsieveConfig::parse(EXAMPLE).expect("should parse");

    let redact = &config.filters[2];
    assert_eq!(redact.kind, "content");
    assert_eq!(
        redact.settings.string_list("patterns").unwrap(),
        Some(vec!["password=\\S+".to_owned(), "token=\\S+".to_owned()])
    );

    let limit = &config.filters[3];
    assert_eq!(limit.settings.int("limit").unwrap(), Some(100));
    assert_eq!(
        limit.settings.duration_secs("window_secs").unwrap(),
        Some(std::time::Duration::from_secs(60))
    );
}

// =============================================================================
// 부분 설정 테스트
// =============================================================================

#[test]
fn partial_config_general_only() {
    let config = IronsieveConfig::parse(
        r#"
[general]
log_level = "debug"
"#,
    )
    .expect("should parse");

    assert_eq!(config.general.log_level, "debug");
    // 나머지는 기본값
    assert_eq!(config.general.log_format, "pretty");
    assert!(config.chain.enabled);
    assert!(config.filters.is_empty());
}

#[test]
fn partial_config_chain_only() {
    let config = IronsieveConfig::parse(
        r#"
[chain]
enabled = false
filter_dir = "/etc/ironsieve/filters"
"#,
    )
    .expect("should parse");

    assert!(!config.chain.enabled);
    assert_eq!(config.chain.filter_dir, "/etc/ironsieve/filters");
    assert_eq!(config.chain.recent_window, 32);
}

#[test]
fn partial_config_filters_only() {
    let config = IronsieveConfig::parse(
        r#"
[[filters]]
name = "drop-all"
kind = "block"
"#,
    )
    .expect("should parse");

    assert_eq!(config.filters.len(), 1);
    assert!(config.filters[0].enabled);
    assert!(config.filters[0].settings.is_empty());
}

// =============================================================================
// 환경변수 오버라이드 테스트
// =============================================================================

#[test]
#[serial_test::serial]
fn env_override_takes_precedence_over_toml() {
    let mut config = IronsieveConfig::parse(
        r#"
[general]
log_level = "warn"
"#,
    )
    .expect("should parse");

    // SAFETY: serial_test로 직렬 실행되므로 다른 스레드가 환경변수를 동시에 읽지 않음
    unsafe { std::env::set_var("IRONSIEVE_GENERAL_LOG_LEVEL", "debug") };
    config.apply_env_overrides();
    unsafe { std::env::remove_var("IRONSIEVE_GENERAL_LOG_LEVEL") };

    assert_eq!(config.general.log_level, "debug");
}

#[test]
#[serial_test::serial]
fn env_override_bool_field() {
    let mut config = IronsieveConfig::default();

    // SAFETY: serial_test로 직렬 실행
    unsafe { std::env::set_var("IRONSIEVE_CHAIN_ENABLED", "false") };
    config.apply_env_overrides();
    unsafe { std::env::remove_var("IRONSIEVE_CHAIN_ENABLED") };

    assert!(!config.chain.enabled);
}

#[test]
#[serial_test::serial]
fn env_override_numeric_field() {
    let mut config = IronsieveConfig::default();

    // SAFETY: serial_test로 직렬 실행
    unsafe { std::env::set_var("IRONSIEVE_CHAIN_RECENT_WINDOW", "64") };
    config.apply_env_overrides();
    unsafe { std::env::remove_var("IRONSIEVE_CHAIN_RECENT_WINDOW") };

    assert_eq!(config.chain.recent_window, 64);
}

#[test]
#[serial_test::serial]
fn env_override_invalid_value_is_ignored() {
    let mut config = IronsieveConfig::default();

    // SAFETY: serial_test로 직렬 실행
    unsafe { std::env::set_var("IRONSIEVE_CHAIN_CONTINUE_ON_ERROR", "sometimes") };
    config.apply_env_overrides();
    unsafe { std::env::remove_var("IRONSIEVE_CHAIN_CONTINUE_ON_ERROR") };

    assert!(config.chain.continue_on_error);
}

#[test]
#[serial_test::serial]
fn env_override_missing_var_keeps_toml_value() {
    let mut config = IronsieveConfig::parse(
        r#"
[chain]
filter_dir = "/opt/filters"
"#,
    )
    .expect("should parse");

    // SAFETY: serial_test로 직렬 실행
    unsafe { std::env::remove_var("IRONSIEVE_CHAIN_FILTER_DIR") };
    config.apply_env_overrides();

    assert_eq!(config.chain.filter_dir, "/opt/filters");
}

// =============================================================================
// 에러 케이스
// =============================================================================

#[test]
fn empty_string_parses_with_defaults() {
    let config = IronsieveConfig::parse("").expect("empty should parse");
    assert_eq!(config.general.log_level, "info");
}

#[test]
fn comments_only_parses_with_defaults() {
    let config = IronsieveConfig::parse("# nothing here\n# still nothing\n")
        .expect("comments should parse");
    assert!(config.filters.is_empty());
}

#[test]
fn malformed_toml_returns_parse_error() {
    let err = IronsieveConfig::parse("[chain\nenabled = true").unwrap_err();
    assert!(matches!(
        err,
        IronsieveError::Config(ConfigError::ParseFailed { .. })
    ));
}

#[test]
fn wrong_type_for_numeric_field() {
    let err = IronsieveConfig::parse(
        r#"
[chain]
recent_window = "many"
"#,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        IronsieveError::Config(ConfigError::ParseFailed { .. })
    ));
}

#[test]
fn filter_without_kind_is_rejected() {
    let err = IronsieveConfig::parse(
        r#"
[[filters]]
name = "incomplete"
"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("kind"));
}

#[test]
fn unknown_section_is_ignored() {
    let config = IronsieveConfig::parse(
        r#"
[future_section]
value = 1
"#,
    )
    .expect("unknown sections should be ignored");
    assert!(config.chain.enabled);
}

// =============================================================================
// 파일 로딩
// =============================================================================

#[tokio::test]
async fn from_file_nonexistent_returns_file_not_found() {
    let err = IronsieveConfig::from_file("/nonexistent/ironsieve.toml")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        IronsieveError::Config(ConfigError::FileNotFound { .. })
    ));
}

#[tokio::test]
#[serial_test::serial]
async fn load_example_config_from_disk() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../ironsieve.toml.example");
    let config = IronsieveConfig::load(path).await.expect("should load");
    assert_eq!(config.filters.len(), 4);
}

#[test]
fn serialize_and_reparse_roundtrip() {
    let original = IronsieveConfig::parse(EXAMPLE).expect("should parse");
    let serialized = toml::to_string_pretty(&original).expect("should serialize");
    let reparsed = IronsieveConfig::parse(&serialized).expect("should reparse");

    assert_eq!(reparsed.filters, original.filters);
    assert_eq!(reparsed.chain.recent_window, original.chain.recent_window);
}
