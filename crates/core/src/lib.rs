#![doc = include_str!("../README.md")]

pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod publish;
pub mod settings;
pub mod types;

// --- 주요 타입 re-export ---
// 각 모듈의 핵심 타입을 크레이트 루트에서 바로 사용할 수 있도록 합니다.

// 에러
pub use error::{ConfigError, IronsieveError, SettingError};

// 설정
pub use config::{ChainConfig, FilterSpec, GeneralConfig, IronsieveConfig};
pub use settings::{ConfigValue, Settings};

// 이벤트
pub use event::Event;

// 시간/알림 경계
pub use clock::{Clock, ManualClock, SystemClock};
pub use publish::{MessagePublisher, Notification, NullPublisher, RecordingPublisher, TracingPublisher};

// 도메인 타입
pub use types::{Alert, LogEntry, Severity};
