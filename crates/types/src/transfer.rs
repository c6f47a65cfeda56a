use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Safe transfer lifecycle.
///
/// `Pending -> Active -> {Completed | Failed | Disputed}`, and
/// `Disputed -> {Completed | Failed}`. Nothing re-enters `Pending` or `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Pending,
    Active,
    Completed,
    Failed,
    Disputed,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Active => "active",
            TransferStatus::Completed => "completed",
            TransferStatus::Failed => "failed",
            TransferStatus::Disputed => "disputed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStatus::Completed | TransferStatus::Failed)
    }

    /// Whether the state machine has an edge from `self` to `next`
    pub fn can_transition_to(&self, next: TransferStatus) -> bool {
        use TransferStatus::*;
        matches!(
            (self, next),
            (Pending, Active)
                | (Pending, Failed)
                | (Active, Completed)
                | (Active, Failed)
                | (Active, Disputed)
                | (Disputed, Completed)
                | (Disputed, Failed)
        )
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransferStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransferStatus::Pending),
            "active" => Ok(TransferStatus::Active),
            "completed" => Ok(TransferStatus::Completed),
            "failed" => Ok(TransferStatus::Failed),
            "disputed" => Ok(TransferStatus::Disputed),
            other => Err(format!("unknown transfer status: {other}")),
        }
    }
}

/// How the credentials were released to the buyer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseMethod {
    /// Clean monitoring window or deadline reached
    Automatic,
    /// Admin completed the transfer early
    Manual,
    /// Released as the outcome of a dispute
    Disputed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspiciousActivity {
    pub detected: bool,
    pub count: u32,
    pub last_detected: Option<DateTime<Utc>>,
    pub details: Vec<String>,
}

impl SuspiciousActivity {
    pub fn record(&mut self, at: DateTime<Utc>, description: String) {
        self.detected = true;
        self.count += 1;
        self.last_detected = Some(at);
        self.details.push(description);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsRef {
    pub encrypted_record_id: String,
    pub released_at: Option<DateTime<Utc>>,
    pub release_method: Option<ReleaseMethod>,
}

impl CredentialsRef {
    pub fn new(encrypted_record_id: impl Into<String>) -> Self {
        Self {
            encrypted_record_id: encrypted_record_id.into(),
            released_at: None,
            release_method: None,
        }
    }

    /// Stamp the release. Returns `false` if it had already been released.
    pub fn release(&mut self, at: DateTime<Utc>, method: ReleaseMethod) -> bool {
        if self.released_at.is_some() {
            return false;
        }
        self.released_at = Some(at);
        self.release_method = Some(method);
        true
    }
}

/// Monitored escrow window for one sold account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeTransfer {
    pub id: String,
    pub account_id: String,
    pub buyer_id: String,
    pub seller_id: String,
    pub transaction_id: String,
    pub status: TransferStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_hours: u32,
    pub monitoring_interval_minutes: u32,
    pub last_check_time: Option<DateTime<Utc>>,
    pub next_check_time: Option<DateTime<Utc>>,
    pub checks_performed: u64,
    pub suspicious_activity: SuspiciousActivity,
    pub credentials_ref: CredentialsRef,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SafeTransfer {
    pub fn is_participant(&self, user_id: &str) -> bool {
        self.buyer_id == user_id || self.seller_id == user_id
    }

    pub fn monitoring_interval(&self) -> Duration {
        Duration::minutes(i64::from(self.monitoring_interval_minutes))
    }

    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        now - self.start_time
    }

    pub fn participants(&self) -> [&str; 2] {
        [self.buyer_id.as_str(), self.seller_id.as_str()]
    }
}

/// Data the caller supplies to open a safe transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransfer {
    pub account_id: String,
    pub buyer_id: String,
    pub seller_id: String,
    pub transaction_id: String,
    pub encrypted_record_id: String,
    pub duration_hours: Option<u32>,
}

/// Predicate for listing transfers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferFilter {
    /// Buyer or seller
    pub participant: Option<String>,
    pub status: Option<TransferStatus>,
}

impl TransferFilter {
    pub fn for_participant(user_id: impl Into<String>) -> Self {
        Self {
            participant: Some(user_id.into()),
            status: None,
        }
    }

    pub fn with_status(status: TransferStatus) -> Self {
        Self {
            participant: None,
            status: Some(status),
        }
    }

    pub fn status(mut self, status: Option<TransferStatus>) -> Self {
        self.status = status;
        self
    }

    pub fn matches(&self, transfer: &SafeTransfer) -> bool {
        self.participant
            .as_deref()
            .map_or(true, |user| transfer.is_participant(user))
            && self.status.map_or(true, |s| transfer.status == s)
    }
}

/// Admin aggregate over all transfers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferStatistics {
    pub total: u64,
    pub pending: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
    pub disputed: u64,
    pub with_suspicious_activity: u64,
}

impl TransferStatistics {
    pub fn from_transfers<'a>(transfers: impl IntoIterator<Item = &'a SafeTransfer>) -> Self {
        let mut stats = Self::default();
        for transfer in transfers {
            stats.total += 1;
            match transfer.status {
                TransferStatus::Pending => stats.pending += 1,
                TransferStatus::Active => stats.active += 1,
                TransferStatus::Completed => stats.completed += 1,
                TransferStatus::Failed => stats.failed += 1,
                TransferStatus::Disputed => stats.disputed += 1,
            }
            if transfer.suspicious_activity.detected {
                stats.with_suspicious_activity += 1;
            }
        }
        stats
    }
}
