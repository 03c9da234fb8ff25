//! 도메인 타입 — 필터 엔진이 다루는 알림/로그 레코드
//!
//! [`Alert`]와 [`LogEntry`]는 필터 체인에 유입되는 두 가지 이벤트 원형입니다.
//! 두 타입 모두 생성 후에는 변경하지 않으며, 필터가 내용을 바꿔야 할 때는
//! 새 값을 만들어 반환합니다.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// 심각도 레벨
///
/// 알림의 심각도와 로그 레벨을 같은 축으로 표현합니다.
/// `Ord` 구현으로 비교가 가능합니다
/// (`Trace < Debug < Info < Warning < Error < Critical`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// 추적용 상세 로그
    Trace,
    /// 디버그
    Debug,
    /// 정보성 이벤트
    #[default]
    Info,
    /// 경고
    Warning,
    /// 오류
    Error,
    /// 치명적 — 즉시 대응 필요
    Critical,
}

impl Severity {
    /// 모든 심각도를 오름차순으로 나열합니다.
    pub const ALL: [Severity; 6] = [
        Self::Trace,
        Self::Debug,
        Self::Info,
        Self::Warning,
        Self::Error,
        Self::Critical,
    ];

    /// 문자열에서 심각도를 파싱합니다.
    ///
    /// 대소문자를 구분하지 않습니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" | "verbose" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" | "information" | "informational" => Some(Self::Info),
            "warning" | "warn" => Some(Self::Warning),
            "error" | "err" => Some(Self::Error),
            "critical" | "crit" | "fatal" => Some(Self::Critical),
            _ => None,
        }
    }

    /// 소문자 이름을 반환합니다 (메트릭 레이블, 직렬화에 사용).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trace => write!(f, "Trace"),
            Self::Debug => write!(f, "Debug"),
            Self::Info => write!(f, "Info"),
            Self::Warning => write!(f, "Warning"),
            Self::Error => write!(f, "Error"),
            Self::Critical => write!(f, "Critical"),
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_loose(s).ok_or_else(|| format!("unknown severity '{s}'"))
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_str_loose(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown severity '{raw}'")))
    }
}

/// 알림
///
/// 경보 서브시스템에서 발생한 알림 한 건을 나타냅니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// 알림 ID
    #[serde(default = "new_id")]
    pub id: String,
    /// 심각도
    pub severity: Severity,
    /// 발생 소스 (점으로 구분된 네임스페이스, 예: `App.Services.Billing`)
    #[serde(default)]
    pub source: String,
    /// 알림 메시지
    pub message: String,
    /// 분류 태그
    #[serde(default)]
    pub tag: String,
    /// 발생 시각
    #[serde(with = "rfc3339", default = "SystemTime::now")]
    pub timestamp: SystemTime,
    /// 상관 ID
    #[serde(default)]
    pub correlation_id: String,
    /// 구조화된 부가 정보
    #[serde(default)]
    pub context: BTreeMap<String, String>,
}

impl Alert {
    /// 새 알림을 생성합니다. ID와 타임스탬프는 자동으로 채워집니다.
    pub fn new(severity: Severity, source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            severity,
            source: source.into(),
            message: message.into(),
            tag: String::new(),
            timestamp: SystemTime::now(),
            correlation_id: String::new(),
            context: BTreeMap::new(),
        }
    }

    /// 태그를 지정합니다.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// 상관 ID를 지정합니다.
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    /// 부가 정보를 추가합니다.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// 타임스탬프를 지정합니다.
    pub fn with_timestamp(mut self, timestamp: SystemTime) -> Self {
        self.timestamp = timestamp;
        self
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.source, self.message)
    }
}

/// 로그 엔트리
///
/// 로깅 서브시스템의 로그 레코드 한 건을 나타냅니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// 로그 ID
    #[serde(default = "new_id")]
    pub id: String,
    /// 로그 레벨
    pub level: Severity,
    /// 로그 채널
    #[serde(default)]
    pub channel: String,
    /// 로그 메시지
    pub message: String,
    /// 로그를 남긴 소스 (클래스/모듈 경로)
    #[serde(default)]
    pub source_context: String,
    /// 상관 ID
    #[serde(default)]
    pub correlation_id: String,
    /// 기록 시각
    #[serde(with = "rfc3339", default = "SystemTime::now")]
    pub timestamp: SystemTime,
    /// 예외 정보 (있을 경우)
    #[serde(default)]
    pub exception: Option<String>,
    /// 구조화 속성
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl LogEntry {
    /// 새 로그 엔트리를 생성합니다.
    pub fn new(level: Severity, channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            level,
            channel: channel.into(),
            message: message.into(),
            source_context: String::new(),
            correlation_id: String::new(),
            timestamp: SystemTime::now(),
            exception: None,
            properties: BTreeMap::new(),
        }
    }

    /// 소스 컨텍스트를 지정합니다.
    pub fn with_source_context(mut self, source_context: impl Into<String>) -> Self {
        self.source_context = source_context.into();
        self
    }

    /// 상관 ID를 지정합니다.
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    /// 구조화 속성을 추가합니다.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// 예외 정보를 지정합니다.
    pub fn with_exception(mut self, exception: impl Into<String>) -> Self {
        self.exception = Some(exception.into());
        self
    }

    /// 타임스탬프를 지정합니다.
    pub fn with_timestamp(mut self, timestamp: SystemTime) -> Self {
        self.timestamp = timestamp;
        self
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {}: {}",
            self.level, self.channel, self.source_context, self.message,
        )
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// `SystemTime` <-> RFC 3339 문자열 변환
///
/// JSON 입력에서 사람이 읽을 수 있는 타임스탬프를 받기 위해 사용합니다.
pub mod rfc3339 {
    use std::time::SystemTime;

    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    /// RFC 3339 문자열로 직렬화합니다.
    pub fn serialize<S: Serializer>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
        let dt: DateTime<Utc> = (*time).into();
        serializer.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    /// RFC 3339 문자열에서 역직렬화합니다.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SystemTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| SystemTime::from(dt.with_timezone(&Utc)))
            .map_err(|e| serde::de::Error::custom(format!("invalid timestamp '{raw}': {e}")))
    }
}
