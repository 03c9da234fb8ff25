//! 이벤트 — 필터 체인의 입력 단위
//!
//! [`Event`]는 알림([`Alert`])과 로그([`LogEntry`])를 하나로 묶는 합 타입입니다.
//! 필터는 두 변형을 동일한 접근자(심각도, 소스, 메시지, 태그, 상관 ID, 속성)로
//! 다루며, 메시지를 바꿔야 하는 경우 [`Event::with_message`]로 새 이벤트를 만듭니다.

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::types::{Alert, LogEntry, Severity};

/// 알림 이벤트 타입
pub const EVENT_TYPE_ALERT: &str = "alert";
/// 로그 이벤트 타입
pub const EVENT_TYPE_LOG: &str = "log";

/// 필터 대상 이벤트
///
/// JSON 표현은 `type` 필드로 변형을 구분합니다:
///
/// ```json
/// {"type":"alert","severity":"error","source":"App.Db","message":"timeout"}
/// {"type":"log","level":"debug","channel":"http","message":"GET /"}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Event {
    /// 알림
    Alert(Alert),
    /// 로그
    Log(LogEntry),
}

impl Event {
    /// 이벤트 ID
    pub fn id(&self) -> &str {
        match self {
            Self::Alert(a) => &a.id,
            Self::Log(l) => &l.id,
        }
    }

    /// 이벤트 타입 문자열 (`"alert"` 또는 `"log"`)
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Alert(_) => EVENT_TYPE_ALERT,
            Self::Log(_) => EVENT_TYPE_LOG,
        }
    }

    /// 심각도 (로그는 레벨)
    pub fn severity(&self) -> Severity {
        match self {
            Self::Alert(a) => a.severity,
            Self::Log(l) => l.level,
        }
    }

    /// 소스 (로그는 source_context)
    pub fn source(&self) -> &str {
        match self {
            Self::Alert(a) => &a.source,
            Self::Log(l) => &l.source_context,
        }
    }

    /// 메시지 본문
    pub fn message(&self) -> &str {
        match self {
            Self::Alert(a) => &a.message,
            Self::Log(l) => &l.message,
        }
    }

    /// 분류 태그 (로그는 채널)
    pub fn tag(&self) -> &str {
        match self {
            Self::Alert(a) => &a.tag,
            Self::Log(l) => &l.channel,
        }
    }

    /// 상관 ID
    pub fn correlation_id(&self) -> &str {
        match self {
            Self::Alert(a) => &a.correlation_id,
            Self::Log(l) => &l.correlation_id,
        }
    }

    /// 발생 시각
    pub fn timestamp(&self) -> SystemTime {
        match self {
            Self::Alert(a) => a.timestamp,
            Self::Log(l) => l.timestamp,
        }
    }

    /// 구조화 속성 조회 (알림은 context, 로그는 properties)
    pub fn property(&self, key: &str) -> Option<&str> {
        match self {
            Self::Alert(a) => a.context.get(key).map(String::as_str),
            Self::Log(l) => l.properties.get(key).map(String::as_str),
        }
    }

    /// 메시지만 교체한 새 이벤트를 반환합니다. 원본은 변경되지 않습니다.
    pub fn with_message(&self, message: impl Into<String>) -> Self {
        match self {
            Self::Alert(a) => Self::Alert(Alert {
                message: message.into(),
                ..a.clone()
            }),
            Self::Log(l) => Self::Log(LogEntry {
                message: message.into(),
                ..l.clone()
            }),
        }
    }
}

impl From<Alert> for Event {
    fn from(alert: Alert) -> Self {
        Self::Alert(alert)
    }
}

impl From<LogEntry> for Event {
    fn from(entry: LogEntry) -> Self {
        Self::Log(entry)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alert(a) => write!(f, "alert {a}"),
            Self::Log(l) => write!(f, "log {l}"),
        }
    }
}
