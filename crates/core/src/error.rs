//! 에러 타입 — 도메인별 에러 정의

/// Ironsieve 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum IronsieveError {
    /// 설정 파일 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 필터 설정 값 에러
    #[error("setting error: {0}")]
    Setting(#[from] SettingError),

    /// 필터/체인 처리 에러
    #[error("filter error: {0}")]
    Filter(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 파일 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 필터 설정 값 조회/변환 에러
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SettingError {
    /// 필수 키 누락
    #[error("missing setting '{key}'")]
    Missing { key: String },

    /// 타입 변환 불가
    #[error("setting '{key}' expected {expected}, got {actual}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        actual: String,
    },

    /// 허용 범위 밖의 값
    #[error("setting '{key}' out of range: {reason}")]
    OutOfRange { key: String, reason: String },
}
