use account_escrow_types::{
    AuditEntry, EncryptedCredentialRecord, SafeTransfer, TransferAlert, TransferCheck,
    TransferFilter,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::repository::{Repository, StoreError};

// ═══════════════════════════════════════════════════════════════════════════
// IN-MEMORY REPOSITORY (tests and single-process deployments)
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct Tables {
    credentials: HashMap<String, EncryptedCredentialRecord>,
    audit: HashMap<String, Vec<AuditEntry>>,
    transfers: HashMap<String, SafeTransfer>,
    checks: HashMap<String, Vec<TransferCheck>>,
    alerts: HashMap<String, TransferAlert>,
    /// transfer id -> alert ids in creation order
    alerts_by_transfer: HashMap<String, Vec<String>>,
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryRepository {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored transfers (for testing)
    pub async fn transfer_count(&self) -> usize {
        self.tables.read().await.transfers.len()
    }

    /// Clear all data (for testing)
    pub async fn clear(&self) {
        *self.tables.write().await = Tables::default();
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn create_credential_record(
        &self,
        record: &EncryptedCredentialRecord,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.credentials.contains_key(&record.id) {
            return Err(StoreError::duplicate("credential record", &record.id));
        }
        tables.credentials.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn update_credential_record(
        &self,
        record: &EncryptedCredentialRecord,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .credentials
            .get_mut(&record.id)
            .ok_or_else(|| StoreError::not_found("credential record", &record.id))?;
        *slot = record.clone();
        Ok(())
    }

    async fn get_credential_record(
        &self,
        id: &str,
    ) -> Result<Option<EncryptedCredentialRecord>, StoreError> {
        Ok(self.tables.read().await.credentials.get(id).cloned())
    }

    async fn latest_credential_for_listing(
        &self,
        listing_id: &str,
    ) -> Result<Option<EncryptedCredentialRecord>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .credentials
            .values()
            .filter(|r| r.listing_id == listing_id)
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn append_audit(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        self.tables
            .write()
            .await
            .audit
            .entry(entry.record_id.clone())
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    async fn list_audit(&self, record_id: &str) -> Result<Vec<AuditEntry>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .audit
            .get(record_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_transfer(&self, transfer: &SafeTransfer) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.transfers.contains_key(&transfer.id) {
            return Err(StoreError::duplicate("transfer", &transfer.id));
        }
        tables.transfers.insert(transfer.id.clone(), transfer.clone());
        Ok(())
    }

    async fn update_transfer(&self, transfer: &SafeTransfer) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .transfers
            .get_mut(&transfer.id)
            .ok_or_else(|| StoreError::not_found("transfer", &transfer.id))?;
        *slot = transfer.clone();
        Ok(())
    }

    async fn get_transfer(&self, id: &str) -> Result<Option<SafeTransfer>, StoreError> {
        Ok(self.tables.read().await.transfers.get(id).cloned())
    }

    async fn list_transfers(
        &self,
        filter: &TransferFilter,
    ) -> Result<Vec<SafeTransfer>, StoreError> {
        let tables = self.tables.read().await;
        let mut results: Vec<_> = tables
            .transfers
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();

        results.sort_by_key(|t| t.created_at);
        Ok(results)
    }

    async fn append_check(&self, check: &TransferCheck) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.transfers.contains_key(&check.transfer_id) {
            return Err(StoreError::not_found("transfer", &check.transfer_id));
        }
        tables
            .checks
            .entry(check.transfer_id.clone())
            .or_default()
            .push(check.clone());
        Ok(())
    }

    async fn list_checks(&self, transfer_id: &str) -> Result<Vec<TransferCheck>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .checks
            .get(transfer_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_alert(&self, alert: &TransferAlert) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.transfers.contains_key(&alert.transfer_id) {
            return Err(StoreError::not_found("transfer", &alert.transfer_id));
        }
        if tables.alerts.contains_key(&alert.id) {
            return Err(StoreError::duplicate("alert", &alert.id));
        }
        tables.alerts.insert(alert.id.clone(), alert.clone());
        tables
            .alerts_by_transfer
            .entry(alert.transfer_id.clone())
            .or_default()
            .push(alert.id.clone());
        Ok(())
    }

    async fn update_alert(&self, alert: &TransferAlert) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .alerts
            .get_mut(&alert.id)
            .ok_or_else(|| StoreError::not_found("alert", &alert.id))?;
        *slot = alert.clone();
        Ok(())
    }

    async fn get_alert(
        &self,
        transfer_id: &str,
        alert_id: &str,
    ) -> Result<Option<TransferAlert>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .alerts
            .get(alert_id)
            .filter(|a| a.transfer_id == transfer_id)
            .cloned())
    }

    async fn list_alerts(&self, transfer_id: &str) -> Result<Vec<TransferAlert>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .alerts_by_transfer
            .get(transfer_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| tables.alerts.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════
