//! 설정 관리 — ironsieve.toml 파싱 및 런타임 설정
//!
//! [`IronsieveConfig`]는 로깅, 필터 체인, 필터 정의를 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`IRONSIEVE_CHAIN_ENABLED=false` 형식)
//! 3. 설정 파일 (`ironsieve.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), ironsieve_core::error::IronsieveError> {
//! use ironsieve_core::config::IronsieveConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = IronsieveConfig::load("ironsieve.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = IronsieveConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, IronsieveError};
use crate::settings::{ConfigValue, Settings};

/// 최근 이벤트 윈도우 상한
pub const MAX_RECENT_WINDOW: usize = 10_000;

/// Ironsieve 통합 설정
///
/// `ironsieve.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IronsieveConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 필터 체인 설정
    #[serde(default)]
    pub chain: ChainConfig,
    /// 필터 정의 (`[[filters]]`)
    #[serde(default)]
    pub filters: Vec<FilterSpec>,
}

impl IronsieveConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, IronsieveError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, IronsieveError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                IronsieveError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                IronsieveError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, IronsieveError> {
        toml::from_str(toml_str).map_err(|e| {
            IronsieveError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `IRONSIEVE_{SECTION}_{FIELD}`
    /// 예: `IRONSIEVE_CHAIN_RECENT_WINDOW=64`
    ///
    /// 필터 정의(`[[filters]]`)는 환경변수로 덮어쓰지 않습니다.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "IRONSIEVE_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "IRONSIEVE_GENERAL_LOG_FORMAT");

        // Chain
        override_bool(&mut self.chain.enabled, "IRONSIEVE_CHAIN_ENABLED");
        override_usize(
            &mut self.chain.recent_window,
            "IRONSIEVE_CHAIN_RECENT_WINDOW",
        );
        override_string(&mut self.chain.filter_dir, "IRONSIEVE_CHAIN_FILTER_DIR");
        override_bool(
            &mut self.chain.continue_on_error,
            "IRONSIEVE_CHAIN_CONTINUE_ON_ERROR",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), IronsieveError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if self.chain.recent_window > MAX_RECENT_WINDOW {
            return Err(ConfigError::InvalidValue {
                field: "chain.recent_window".to_owned(),
                reason: format!("must be at most {MAX_RECENT_WINDOW}"),
            }
            .into());
        }

        // 필터 이름은 체인 안에서 유일해야 함
        let mut seen = HashSet::new();
        for (index, spec) in self.filters.iter().enumerate() {
            spec.validate_shape(&format!("filters[{index}]"))?;
            if !seen.insert(spec.name.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: format!("filters[{index}].name"),
                    reason: format!("duplicate filter name '{}'", spec.name),
                }
                .into());
            }
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 필터 체인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// 체인 전체 활성화 여부 (비활성 시 모든 이벤트 허용)
    pub enabled: bool,
    /// `FilterContext`에 실어 보낼 최근 이벤트 수
    pub recent_window: usize,
    /// YAML 필터 정의 디렉토리 (빈 문자열이면 사용 안 함)
    pub filter_dir: String,
    /// 필터 에러 후에도 다음 필터를 계속 평가할지 여부
    pub continue_on_error: bool,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            recent_window: 32,
            filter_dir: String::new(),
            continue_on_error: true,
        }
    }
}

/// 필터 정의 한 건
///
/// TOML의 `[[filters]]` 항목과 YAML 필터 정의 파일이 같은 형태를 사용합니다.
/// 합성 필터(`kind = "composite"`)는 `children`에 하위 필터 정의를 담습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// 필터 이름 (체인 안에서 유일)
    pub name: String,
    /// 필터 종류 (level, source, content, ...)
    pub kind: String,
    /// 우선순위 (낮을수록 먼저 실행). 생략 시 필터 종류별 기본값
    #[serde(default)]
    pub priority: Option<i32>,
    /// 활성화 여부
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 필터별 설정
    #[serde(default)]
    pub settings: Settings,
    /// 하위 필터 (합성 필터 전용)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FilterSpec>,
}

impl FilterSpec {
    /// 새 필터 정의를 생성합니다.
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            priority: None,
            enabled: true,
            settings: Settings::new(),
            children: Vec::new(),
        }
    }

    /// 우선순위를 지정합니다.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// 설정 값을 추가합니다.
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.settings.insert(key, value);
        self
    }

    /// 하위 필터를 추가합니다.
    pub fn with_child(mut self, child: FilterSpec) -> Self {
        self.children.push(child);
        self
    }

    /// 비활성 상태로 지정합니다.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// 이름/종류 같은 구조적 조건을 검증합니다. 설정 값 자체는 필터가 검증합니다.
    pub fn validate_shape(&self, field: &str) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: format!("{field}.name"),
                reason: "filter name must not be empty".to_owned(),
            });
        }
        if self.kind.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: format!("{field}.kind"),
                reason: "filter kind must not be empty".to_owned(),
            });
        }
        for (index, child) in self.children.iter().enumerate() {
            child.validate_shape(&format!("{field}.children[{index}]"))?;
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}
