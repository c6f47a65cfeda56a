use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Vault operation recorded against a credential record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Encrypt,
    Decrypt,
    Verify,
    Deactivate,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Encrypt => "encrypt",
            AuditAction::Decrypt => "decrypt",
            AuditAction::Verify => "verify",
            AuditAction::Deactivate => "deactivate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: String,
    pub record_id: String,
    pub action: AuditAction,
    pub actor_id: String,
    pub at: DateTime<Utc>,
    /// Outcome for `verify`; absent for the other actions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<bool>,
}
