//! 필터 엔진 에러 타입
//!
//! [`FilterError`]는 필터 설정, 평가, 체인 관리, 정의 파일 로딩 과정의
//! 에러를 표현합니다.
//! `From<FilterError> for IronsieveError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.
//!
//! 평가 에러는 체인 경계에서 fail-open(허용)으로 변환되므로
//! 호출자에게 전파되지 않습니다.

use ironsieve_core::error::{IronsieveError, SettingError};

/// 필터 엔진 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    /// 유효하지 않은 필터 설정
    #[error("invalid config for filter '{filter}' field '{field}': {reason}")]
    Config {
        /// 필터 이름
        filter: String,
        /// 설정 키
        field: String,
        /// 실패 사유
        reason: String,
    },

    /// 필터 평가 중 에러
    #[error("filter '{filter}' evaluation failed: {reason}")]
    Evaluation {
        /// 필터 이름
        filter: String,
        /// 실패 사유
        reason: String,
    },

    /// 이미 같은 이름의 필터가 등록됨
    #[error("filter '{name}' is already registered")]
    DuplicateFilter {
        /// 중복된 이름
        name: String,
    },

    /// 필터를 찾을 수 없음
    #[error("filter '{name}' not found")]
    NotFound {
        /// 찾은 이름
        name: String,
    },

    /// 폐기된 체인에 대한 호출
    #[error("filter chain has been disposed")]
    Disposed,

    /// 정규식 컴파일 실패
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    /// 필터 정의 파일 로딩 실패
    #[error("filter load error: {path}: {reason}")]
    Load {
        /// 파일 경로
        path: String,
        /// 실패 사유
        reason: String,
    },
}

impl FilterError {
    /// 설정 값 에러를 필터 설정 에러로 변환합니다.
    pub fn from_setting(filter: &str, err: SettingError) -> Self {
        let field = match &err {
            SettingError::Missing { key }
            | SettingError::TypeMismatch { key, .. }
            | SettingError::OutOfRange { key, .. } => key.clone(),
        };
        Self::Config {
            filter: filter.to_owned(),
            field,
            reason: err.to_string(),
        }
    }
}

impl From<FilterError> for IronsieveError {
    fn from(err: FilterError) -> Self {
        IronsieveError::Filter(err.to_string())
    }
}
