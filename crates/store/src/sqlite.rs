use account_escrow_types::{
    AuditEntry, EncryptedCredentialRecord, SafeTransfer, TransferAlert, TransferCheck,
    TransferFilter,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;

use crate::repository::{Repository, StoreError};

// ═══════════════════════════════════════════════════════════════════════════
// SQLITE REPOSITORY
// ═══════════════════════════════════════════════════════════════════════════

/// Durable adapter. Each entity is stored as a JSON document next to the
/// columns it is looked up by.
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Open (or create) a database file
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(db_path.as_ref())
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;

        let repo = Self { pool };
        repo.run_migrations().await?;

        Ok(repo)
    }

    /// Create an in-memory SQLite database (for testing)
    pub async fn in_memory() -> Result<Self, StoreError> {
        // a second connection would see a different empty database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;

        let repo = Self { pool };
        repo.run_migrations().await?;

        Ok(repo)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        let migrations = [
            include_str!("../migrations/001_create_credentials.sql"),
            include_str!("../migrations/002_create_transfers.sql"),
        ];

        for migration in migrations {
            for statement in migration.split(';').map(str::trim).filter(|s| !s.is_empty()) {
                sqlx::query(statement)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| StoreError::DatabaseError(e.to_string()))?;
            }
        }

        tracing::debug!("sqlite migrations applied");
        Ok(())
    }

    async fn fetch_one_body<T: DeserializeOwned>(
        &self,
        sql: &str,
        binds: &[&str],
    ) -> Result<Option<T>, StoreError> {
        let mut query = sqlx::query(sql);
        for bind in binds {
            query = query.bind(*bind);
        }
        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::DatabaseError(e.to_string()))?;

        row.map(|r| decode_body(&r)).transpose()
    }

    async fn fetch_all_bodies<T: DeserializeOwned>(
        &self,
        sql: &str,
        binds: &[&str],
    ) -> Result<Vec<T>, StoreError> {
        let mut query = sqlx::query(sql);
        for bind in binds {
            query = query.bind(*bind);
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::DatabaseError(e.to_string()))?;

        rows.iter().map(decode_body).collect()
    }
}

fn encode_body<T: Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(StoreError::from)
}

fn decode_body<T: DeserializeOwned>(row: &sqlx::sqlite::SqliteRow) -> Result<T, StoreError> {
    let body: String = row.get("body");
    serde_json::from_str(&body).map_err(StoreError::from)
}

fn map_insert_error(e: sqlx::Error, entity: &'static str, id: &str) -> StoreError {
    match e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            StoreError::duplicate(entity, id)
        }
        other => StoreError::DatabaseError(other.to_string()),
    }
}

fn expect_updated(
    result: sqlx::sqlite::SqliteQueryResult,
    entity: &'static str,
    id: &str,
) -> Result<(), StoreError> {
    if result.rows_affected() == 0 {
        return Err(StoreError::not_found(entity, id));
    }
    Ok(())
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn create_credential_record(
        &self,
        record: &EncryptedCredentialRecord,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO credential_records (id, listing_id, seller_id, created_at, body)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.listing_id)
        .bind(&record.seller_id)
        .bind(record.created_at.timestamp_millis())
        .bind(encode_body(record)?)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, "credential record", &record.id))?;

        Ok(())
    }

    async fn update_credential_record(
        &self,
        record: &EncryptedCredentialRecord,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE credential_records SET body = ? WHERE id = ?")
            .bind(encode_body(record)?)
            .bind(&record.id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::DatabaseError(e.to_string()))?;

        expect_updated(result, "credential record", &record.id)
    }

    async fn get_credential_record(
        &self,
        id: &str,
    ) -> Result<Option<EncryptedCredentialRecord>, StoreError> {
        self.fetch_one_body("SELECT body FROM credential_records WHERE id = ?", &[id])
            .await
    }

    async fn latest_credential_for_listing(
        &self,
        listing_id: &str,
    ) -> Result<Option<EncryptedCredentialRecord>, StoreError> {
        self.fetch_one_body(
            r#"
            SELECT body FROM credential_records
            WHERE listing_id = ?
            ORDER BY created_at DESC, rowid DESC
            LIMIT 1
            "#,
            &[listing_id],
        )
        .await
    }

    async fn append_audit(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO credential_audit (id, record_id, at, body) VALUES (?, ?, ?, ?)")
            .bind(&entry.id)
            .bind(&entry.record_id)
            .bind(entry.at.timestamp_millis())
            .bind(encode_body(entry)?)
            .execute(&self.pool)
            .await
            .map_err(|e| map_insert_error(e, "audit entry", &entry.id))?;

        Ok(())
    }

    async fn list_audit(&self, record_id: &str) -> Result<Vec<AuditEntry>, StoreError> {
        self.fetch_all_bodies(
            "SELECT body FROM credential_audit WHERE record_id = ? ORDER BY at, rowid",
            &[record_id],
        )
        .await
    }

    async fn create_transfer(&self, transfer: &SafeTransfer) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO safe_transfers (id, buyer_id, seller_id, status, created_at, body)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&transfer.id)
        .bind(&transfer.buyer_id)
        .bind(&transfer.seller_id)
        .bind(transfer.status.as_str())
        .bind(transfer.created_at.timestamp_millis())
        .bind(encode_body(transfer)?)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, "transfer", &transfer.id))?;

        Ok(())
    }

    async fn update_transfer(&self, transfer: &SafeTransfer) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE safe_transfers SET status = ?, body = ? WHERE id = ?")
            .bind(transfer.status.as_str())
            .bind(encode_body(transfer)?)
            .bind(&transfer.id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::DatabaseError(e.to_string()))?;

        expect_updated(result, "transfer", &transfer.id)
    }

    async fn get_transfer(&self, id: &str) -> Result<Option<SafeTransfer>, StoreError> {
        self.fetch_one_body("SELECT body FROM safe_transfers WHERE id = ?", &[id])
            .await
    }

    async fn list_transfers(
        &self,
        filter: &TransferFilter,
    ) -> Result<Vec<SafeTransfer>, StoreError> {
        let mut sql = String::from("SELECT body FROM safe_transfers WHERE 1 = 1");
        let mut binds: Vec<&str> = Vec::new();

        if let Some(user) = filter.participant.as_deref() {
            sql.push_str(" AND (buyer_id = ? OR seller_id = ?)");
            binds.push(user);
            binds.push(user);
        }
        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            binds.push(status.as_str());
        }
        sql.push_str(" ORDER BY created_at, rowid");

        self.fetch_all_bodies(&sql, &binds).await
    }

    async fn append_check(&self, check: &TransferCheck) -> Result<(), StoreError> {
        if self.get_transfer(&check.transfer_id).await?.is_none() {
            return Err(StoreError::not_found("transfer", &check.transfer_id));
        }

        sqlx::query(
            "INSERT INTO transfer_checks (id, transfer_id, check_time, body) VALUES (?, ?, ?, ?)",
        )
        .bind(&check.id)
        .bind(&check.transfer_id)
        .bind(check.check_time.timestamp_millis())
        .bind(encode_body(check)?)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, "check", &check.id))?;

        Ok(())
    }

    async fn list_checks(&self, transfer_id: &str) -> Result<Vec<TransferCheck>, StoreError> {
        self.fetch_all_bodies(
            "SELECT body FROM transfer_checks WHERE transfer_id = ? ORDER BY check_time, rowid",
            &[transfer_id],
        )
        .await
    }

    async fn create_alert(&self, alert: &TransferAlert) -> Result<(), StoreError> {
        if self.get_transfer(&alert.transfer_id).await?.is_none() {
            return Err(StoreError::not_found("transfer", &alert.transfer_id));
        }

        sqlx::query(
            "INSERT INTO transfer_alerts (id, transfer_id, created_at, body) VALUES (?, ?, ?, ?)",
        )
        .bind(&alert.id)
        .bind(&alert.transfer_id)
        .bind(alert.created_at.timestamp_millis())
        .bind(encode_body(alert)?)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, "alert", &alert.id))?;

        Ok(())
    }

    async fn update_alert(&self, alert: &TransferAlert) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE transfer_alerts SET body = ? WHERE id = ?")
            .bind(encode_body(alert)?)
            .bind(&alert.id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::DatabaseError(e.to_string()))?;

        expect_updated(result, "alert", &alert.id)
    }

    async fn get_alert(
        &self,
        transfer_id: &str,
        alert_id: &str,
    ) -> Result<Option<TransferAlert>, StoreError> {
        self.fetch_one_body(
            "SELECT body FROM transfer_alerts WHERE id = ? AND transfer_id = ?",
            &[alert_id, transfer_id],
        )
        .await
    }

    async fn list_alerts(&self, transfer_id: &str) -> Result<Vec<TransferAlert>, StoreError> {
        self.fetch_all_bodies(
            "SELECT body FROM transfer_alerts WHERE transfer_id = ? ORDER BY created_at, rowid",
            &[transfer_id],
        )
        .await
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::tests::{alert, audit, check, credential_record, transfer};
    use account_escrow_types::{AuditAction, TransferStatus};
    use chrono::Utc;

    #[tokio::test]
    async fn test_credential_round_trip() {
        let repo = SqliteRepository::in_memory().await.unwrap();
        let mut record = credential_record("cred-1", "listing-1", 0);

        repo.create_credential_record(&record).await.unwrap();
        let dup = repo.create_credential_record(&record).await;
        assert!(matches!(dup, Err(StoreError::DuplicateId { .. })));

        record.record_access(Utc::now());
        repo.update_credential_record(&record).await.unwrap();

        let loaded = repo.get_credential_record("cred-1").await.unwrap().unwrap();
        assert_eq!(loaded.access_count, 1);
        assert_eq!(loaded, record);
    }

    #[tokio::test]
    async fn test_latest_credential_for_listing() {
        let repo = SqliteRepository::in_memory().await.unwrap();
        repo.create_credential_record(&credential_record("cred-1", "listing-1", 0))
            .await
            .unwrap();
        repo.create_credential_record(&credential_record("cred-2", "listing-1", 7))
            .await
            .unwrap();

        let latest = repo
            .latest_credential_for_listing("listing-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, "cred-2");
    }

    #[tokio::test]
    async fn test_transfer_filtering() {
        let repo = SqliteRepository::in_memory().await.unwrap();
        repo.create_transfer(&transfer("t-1", "buyer-1", TransferStatus::Active, 0))
            .await
            .unwrap();
        repo.create_transfer(&transfer("t-2", "buyer-2", TransferStatus::Active, 1))
            .await
            .unwrap();

        let mut done = transfer("t-1", "buyer-1", TransferStatus::Completed, 0);
        done.checks_performed = 4;
        repo.update_transfer(&done).await.unwrap();

        let active = repo
            .list_transfers(&TransferFilter::with_status(TransferStatus::Active))
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "t-2");

        let buyer1 = repo
            .list_transfers(&TransferFilter::for_participant("buyer-1"))
            .await
            .unwrap();
        assert_eq!(buyer1.len(), 1);
        assert_eq!(buyer1[0].checks_performed, 4);

        let missing = repo
            .update_transfer(&transfer("t-404", "buyer-1", TransferStatus::Active, 0))
            .await;
        assert!(matches!(missing, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_checks_and_alerts() {
        let repo = SqliteRepository::in_memory().await.unwrap();
        repo.create_transfer(&transfer("t-1", "buyer-1", TransferStatus::Active, 0))
            .await
            .unwrap();

        repo.append_check(&check("c-1", "t-1", 0)).await.unwrap();
        repo.append_check(&check("c-2", "t-1", 30)).await.unwrap();
        assert_eq!(repo.list_checks("t-1").await.unwrap().len(), 2);

        repo.create_alert(&alert("a-1", "t-1", 0)).await.unwrap();
        assert!(repo.get_alert("t-1", "a-1").await.unwrap().is_some());
        assert!(repo.get_alert("t-2", "a-1").await.unwrap().is_none());

        let orphan = repo.create_alert(&alert("a-2", "t-404", 1)).await;
        assert!(matches!(orphan, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_file_backed_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("escrow.db");

        {
            let repo = SqliteRepository::new(&path).await.unwrap();
            repo.create_transfer(&transfer("t-1", "buyer-1", TransferStatus::Active, 0))
                .await
                .unwrap();
            repo.append_audit(&audit("e-1", "cred-1", AuditAction::Encrypt))
                .await
                .unwrap();
        }

        let reopened = SqliteRepository::new(&path).await.unwrap();
        assert!(reopened.get_transfer("t-1").await.unwrap().is_some());
        assert_eq!(reopened.list_audit("cred-1").await.unwrap().len(), 1);
    }
}
