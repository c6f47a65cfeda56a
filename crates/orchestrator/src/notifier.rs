use account_escrow_types::NotificationEvent;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Outbound user notifications. Callers treat delivery as fire-and-forget.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send(
        &self,
        user_id: &str,
        event: NotificationEvent,
        payload: serde_json::Value,
    ) -> Result<(), NotificationError>;
}

/// Writes each notification to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifier;

#[async_trait]
impl NotificationGateway for LoggingNotifier {
    async fn send(
        &self,
        user_id: &str,
        event: NotificationEvent,
        payload: serde_json::Value,
    ) -> Result<(), NotificationError> {
        info!(user_id = %user_id, event = %event, payload = %payload, "Notification");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentNotification {
    pub user_id: String,
    pub event: NotificationEvent,
    pub payload: serde_json::Value,
}

/// Keeps every notification; can be switched into failing mode
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentNotification>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self, event: NotificationEvent) -> usize {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|n| n.event == event)
            .count()
    }

    pub fn recipients(&self, event: NotificationEvent) -> Vec<String> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|n| n.event == event)
            .map(|n| n.user_id.clone())
            .collect()
    }
}

#[async_trait]
impl NotificationGateway for RecordingNotifier {
    async fn send(
        &self,
        user_id: &str,
        event: NotificationEvent,
        payload: serde_json::Value,
    ) -> Result<(), NotificationError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotificationError::Delivery(format!(
                "gateway rejected {event} for {user_id}"
            )));
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SentNotification {
                user_id: user_id.to_string(),
                event,
                payload,
            });
        Ok(())
    }
}
