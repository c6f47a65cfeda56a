use serde::{Deserialize, Serialize};

/// Events pushed to buyer and seller during a safe transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEvent {
    TransferCreated,
    SuspiciousActivity,
    TransferCompleted,
    TransferFailed,
    DisputeOpened,
    DisputeResolved,
}

impl NotificationEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationEvent::TransferCreated => "transfer_created",
            NotificationEvent::SuspiciousActivity => "suspicious_activity",
            NotificationEvent::TransferCompleted => "transfer_completed",
            NotificationEvent::TransferFailed => "transfer_failed",
            NotificationEvent::DisputeOpened => "dispute_opened",
            NotificationEvent::DisputeResolved => "dispute_resolved",
        }
    }
}

impl std::fmt::Display for NotificationEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
