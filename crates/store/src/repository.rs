use account_escrow_types::{
    AuditEntry, EncryptedCredentialRecord, SafeTransfer, TransferAlert, TransferCheck,
    TransferFilter,
};
use async_trait::async_trait;
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════
// ERROR TYPES
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("duplicate {entity} ID: {id}")]
    DuplicateId { entity: &'static str, id: String },

    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("connection error: {0}")]
    ConnectionError(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn duplicate(entity: &'static str, id: impl Into<String>) -> Self {
        StoreError::DuplicateId {
            entity,
            id: id.into(),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::SerializationError(e.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// REPOSITORY TRAIT
// ═══════════════════════════════════════════════════════════════════════════

/// Keyed storage for escrow state - implemented per backend.
///
/// `create_*` fails on an existing id, `update_*` fails on a missing one.
/// Checks and alerts are indexed by their owning transfer; listings come back
/// in creation order.
#[async_trait]
pub trait Repository: Send + Sync {
    // ── credential records ─────────────────────────────────────────────────

    async fn create_credential_record(
        &self,
        record: &EncryptedCredentialRecord,
    ) -> Result<(), StoreError>;

    async fn update_credential_record(
        &self,
        record: &EncryptedCredentialRecord,
    ) -> Result<(), StoreError>;

    async fn get_credential_record(
        &self,
        id: &str,
    ) -> Result<Option<EncryptedCredentialRecord>, StoreError>;

    /// Most recently created record for a listing, active or not
    async fn latest_credential_for_listing(
        &self,
        listing_id: &str,
    ) -> Result<Option<EncryptedCredentialRecord>, StoreError>;

    async fn append_audit(&self, entry: &AuditEntry) -> Result<(), StoreError>;

    async fn list_audit(&self, record_id: &str) -> Result<Vec<AuditEntry>, StoreError>;

    // ── transfers ──────────────────────────────────────────────────────────

    async fn create_transfer(&self, transfer: &SafeTransfer) -> Result<(), StoreError>;

    async fn update_transfer(&self, transfer: &SafeTransfer) -> Result<(), StoreError>;

    async fn get_transfer(&self, id: &str) -> Result<Option<SafeTransfer>, StoreError>;

    async fn list_transfers(&self, filter: &TransferFilter)
        -> Result<Vec<SafeTransfer>, StoreError>;

    // ── checks ─────────────────────────────────────────────────────────────

    async fn append_check(&self, check: &TransferCheck) -> Result<(), StoreError>;

    async fn list_checks(&self, transfer_id: &str) -> Result<Vec<TransferCheck>, StoreError>;

    // ── alerts ─────────────────────────────────────────────────────────────

    async fn create_alert(&self, alert: &TransferAlert) -> Result<(), StoreError>;

    async fn update_alert(&self, alert: &TransferAlert) -> Result<(), StoreError>;

    async fn get_alert(
        &self,
        transfer_id: &str,
        alert_id: &str,
    ) -> Result<Option<TransferAlert>, StoreError>;

    async fn list_alerts(&self, transfer_id: &str) -> Result<Vec<TransferAlert>, StoreError>;
}
