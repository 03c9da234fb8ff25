//! 알림 발행 경계 — 체인 상태 변화를 외부에 통지
//!
//! 필터 체인은 구성 변경, 통계 초기화 등을 [`Notification`]으로 만들어
//! 주입된 [`MessagePublisher`]에 넘깁니다. 발행은 fire-and-forget이며
//! 응답을 기다리지 않습니다.

use std::sync::Mutex;

use serde::Serialize;
use tracing::info;

/// 체인/필터 상태 변화 알림
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// 필터 추가됨
    FilterAdded { filter: String },
    /// 필터 제거됨
    FilterRemoved { filter: String },
    /// 필터 설정 변경 적용됨
    ConfigurationChanged { filter: String },
    /// 필터 설정 변경 거부됨 (이전 설정 유지)
    ConfigurationRejected { filter: String, errors: Vec<String> },
    /// 통계 초기화 (`filter`가 없으면 체인 전체)
    StatisticsReset { filter: Option<String> },
    /// 체인 폐기됨
    ChainDisposed,
}

impl Notification {
    /// 알림 이름
    pub fn name(&self) -> &'static str {
        match self {
            Self::FilterAdded { .. } => "filter_added",
            Self::FilterRemoved { .. } => "filter_removed",
            Self::ConfigurationChanged { .. } => "configuration_changed",
            Self::ConfigurationRejected { .. } => "configuration_rejected",
            Self::StatisticsReset { .. } => "statistics_reset",
            Self::ChainDisposed => "chain_disposed",
        }
    }
}

/// 알림 발행자
pub trait MessagePublisher: Send + Sync {
    /// 알림을 발행합니다. 실패는 호출자에게 전파되지 않습니다.
    fn publish(&self, notification: Notification);
}

/// 아무것도 하지 않는 발행자
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPublisher;

impl MessagePublisher for NullPublisher {
    fn publish(&self, _notification: Notification) {}
}

/// tracing 이벤트로 알림을 남기는 발행자
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPublisher;

impl MessagePublisher for TracingPublisher {
    fn publish(&self, notification: Notification) {
        info!(notification = notification.name(), detail = ?notification, "chain notification");
    }
}

/// 발행된 알림을 메모리에 기록하는 발행자 (테스트용)
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    recorded: Mutex<Vec<Notification>>,
}

impl RecordingPublisher {
    /// 빈 기록기를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 지금까지 기록된 알림
    pub fn notifications(&self) -> Vec<Notification> {
        self.recorded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// 이름이 일치하는 알림 수
    pub fn count_of(&self, name: &str) -> usize {
        self.recorded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|n| n.name() == name)
            .count()
    }

    /// 기록을 비웁니다.
    pub fn clear(&self) {
        self.recorded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

impl MessagePublisher for RecordingPublisher {
    fn publish(&self, notification: Notification) {
        self.recorded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(notification);
    }
}
