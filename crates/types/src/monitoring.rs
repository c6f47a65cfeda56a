use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ═══════════════════════════════════════════════════════════════════════════
// CHECKS
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Success,
    Warning,
    Error,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Success => "success",
            CheckStatus::Warning => "warning",
            CheckStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Banned,
    Restricted,
    Unknown,
}

/// What the probe observed about the account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckDetails {
    pub account_accessible: bool,
    pub suspicious_activity: bool,
    pub seller_activity: bool,
    pub account_status: AccountStatus,
    pub notes: String,
}

impl CheckDetails {
    /// Healthy account, nothing to report
    pub fn clean() -> Self {
        Self {
            account_accessible: true,
            suspicious_activity: false,
            seller_activity: false,
            account_status: AccountStatus::Active,
            notes: "no anomalies".to_string(),
        }
    }

    /// Account shows signs of a reclaim attempt
    pub fn suspicious(notes: impl Into<String>) -> Self {
        Self {
            account_accessible: true,
            suspicious_activity: true,
            seller_activity: true,
            account_status: AccountStatus::Active,
            notes: notes.into(),
        }
    }

    /// One-line description stored in the transfer's suspicious activity log
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if self.seller_activity {
            parts.push("seller activity");
        }
        if !self.account_accessible {
            parts.push("account inaccessible");
        }
        match self.account_status {
            AccountStatus::Banned => parts.push("account banned"),
            AccountStatus::Restricted => parts.push("account restricted"),
            AccountStatus::Active | AccountStatus::Unknown => {}
        }
        if parts.is_empty() {
            self.notes.clone()
        } else {
            format!("{}: {}", parts.join(", "), self.notes)
        }
    }
}

/// Outcome of one monitoring probe call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeReport {
    pub status: CheckStatus,
    pub details: CheckDetails,
}

impl ProbeReport {
    pub fn clean() -> Self {
        Self {
            status: CheckStatus::Success,
            details: CheckDetails::clean(),
        }
    }

    pub fn suspicious(notes: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Warning,
            details: CheckDetails::suspicious(notes),
        }
    }
}

/// One probe result, append-only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferCheck {
    pub id: String,
    pub transfer_id: String,
    pub check_time: DateTime<Utc>,
    pub status: CheckStatus,
    pub details: CheckDetails,
}

// ═══════════════════════════════════════════════════════════════════════════
// ALERTS
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    SuspiciousActivity,
    AccountCompromised,
    SellerReclaim,
    SystemError,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::SuspiciousActivity => "suspicious_activity",
            AlertType::AccountCompromised => "account_compromised",
            AlertType::SellerReclaim => "seller_reclaim",
            AlertType::SystemError => "system_error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Low => "low",
            AlertSeverity::Medium => "medium",
            AlertSeverity::High => "high",
            AlertSeverity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferAlert {
    pub id: String,
    pub transfer_id: String,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
    pub details: BTreeMap<String, serde_json::Value>,
    pub acknowledged: bool,
    pub acknowledged_by: Option<String>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TransferAlert {
    /// Acknowledge once; later calls keep the first actor and timestamp
    pub fn acknowledge(&mut self, actor_id: &str, at: DateTime<Utc>) -> bool {
        if self.acknowledged {
            return false;
        }
        self.acknowledged = true;
        self.acknowledged_by = Some(actor_id.to_string());
        self.acknowledged_at = Some(at);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_type_serializes_snake_case() {
        let json = serde_json::to_string(&AlertType::SellerReclaim).unwrap();
        assert_eq!(json, "\"seller_reclaim\"");
        assert_eq!(AlertType::SystemError.as_str(), "system_error");
    }

    #[test]
    fn test_severity_ordering() {
        assert!(AlertSeverity::Critical > AlertSeverity::High);
        assert!(AlertSeverity::Medium > AlertSeverity::Low);
    }

    #[test]
    fn test_acknowledge_keeps_first_stamp() {
        let first = Utc::now();
        let mut alert = TransferAlert {
            id: "alert-1".to_string(),
            transfer_id: "t-1".to_string(),
            alert_type: AlertType::SuspiciousActivity,
            severity: AlertSeverity::High,
            message: "seller logged in".to_string(),
            details: BTreeMap::new(),
            acknowledged: false,
            acknowledged_by: None,
            acknowledged_at: None,
            created_at: first,
        };

        assert!(alert.acknowledge("buyer-1", first));
        assert!(!alert.acknowledge("seller-1", first + chrono::Duration::minutes(3)));
        assert_eq!(alert.acknowledged_by.as_deref(), Some("buyer-1"));
        assert_eq!(alert.acknowledged_at, Some(first));
    }

    #[test]
    fn test_describe_suspicious_details() {
        let details = CheckDetails::suspicious("password change attempt");
        assert_eq!(details.describe(), "seller activity: password change attempt");
        assert_eq!(CheckDetails::clean().describe(), "no anomalies");
    }
}
