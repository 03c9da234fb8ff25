//! 필터 체인 설정
//!
//! [`ChainOptions`]는 core의 [`ChainConfig`](ironsieve_core::config::ChainConfig)를
//! 기반으로 체인 런타임 옵션을 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use ironsieve_core::config::IronsieveConfig;
//! use ironsieve_filter::config::ChainOptions;
//!
//! let core_config = IronsieveConfig::default();
//! let options = ChainOptions::from_core(&core_config.chain);
//! ```

use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use crate::error::FilterError;

pub use ironsieve_core::config::MAX_RECENT_WINDOW;

/// 필터 체인 런타임 옵션
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainOptions {
    /// 체인 활성화 여부 (비활성 시 모든 이벤트 허용)
    pub enabled: bool,
    /// `FilterContext::recent_events`로 전달할 최근 이벤트 수 (0이면 보관 안 함)
    pub recent_window: usize,
    /// 필터가 실패(fail-open)한 뒤에도 다음 필터를 평가할지 여부
    pub continue_on_error: bool,
    /// YAML 필터 정의 디렉토리 (빈 문자열이면 사용 안 함)
    pub filter_dir: String,
}

impl Default for ChainOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            recent_window: 32,
            continue_on_error: true,
            filter_dir: String::new(),
        }
    }
}

impl ChainOptions {
    /// core의 `ChainConfig`에서 옵션을 생성합니다.
    pub fn from_core(core: &ironsieve_core::config::ChainConfig) -> Self {
        Self {
            enabled: core.enabled,
            recent_window: core.recent_window,
            continue_on_error: core.continue_on_error,
            filter_dir: core.filter_dir.clone(),
        }
    }

    /// 최근 이벤트 윈도우 크기를 지정합니다.
    pub fn with_recent_window(mut self, recent_window: usize) -> Self {
        self.recent_window = recent_window;
        self
    }

    /// 실패 후 계속 평가 여부를 지정합니다.
    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    /// 옵션 값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), FilterError> {
        if self.recent_window > MAX_RECENT_WINDOW {
            return Err(FilterError::Config {
                filter: "chain".to_owned(),
                field: "recent_window".to_owned(),
                reason: format!("must be 0-{MAX_RECENT_WINDOW}"),
            });
        }

        if !self.filter_dir.is_empty()
            && Path::new(&self.filter_dir)
                .components()
                .any(|c| c == Component::ParentDir)
        {
            return Err(FilterError::Config {
                filter: "chain".to_owned(),
                field: "filter_dir".to_owned(),
                reason: format!(
                    "filter dir '{}' contains path traversal pattern '..'",
                    self.filter_dir
                ),
            });
        }

        Ok(())
    }
}
