use account_escrow_store::{KeyedLocks, Repository};
use account_escrow_types::{
    AuditAction, AuditEntry, CipherPayload, CredentialCandidate, Credentials,
    EncryptedCredentialRecord, SubmissionReceipt,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::crypto::{credential_hash, generate_access_token, CredentialCipher, KdfParams};
use crate::error::{Result, VaultError};

/// Actor recorded for operations the platform performs on its own behalf
pub const SYSTEM_ACTOR: &str = "system";

/// Vault construction parameters
#[derive(Clone)]
pub struct VaultConfig {
    pub master_secret: String,
    pub kdf: KdfParams,
}

impl std::fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultConfig")
            .field("master_secret", &"<redacted>")
            .field("kdf", &self.kdf)
            .finish()
    }
}

/// Access-controlled store of seller credentials.
///
/// Record-level operations address a record by id; the listing-level ones
/// (`submit_credentials`, `retrieve_credentials`, ...) resolve the most
/// recent record of a listing first. Authorization of the actor is the
/// caller's job; the vault only refuses inactive records.
pub struct CredentialVault<R: Repository + ?Sized> {
    cipher: CredentialCipher,
    repo: Arc<R>,
    locks: KeyedLocks,
}

impl<R: Repository + ?Sized> CredentialVault<R> {
    pub fn new(repo: Arc<R>, config: &VaultConfig) -> Result<Self> {
        let cipher = CredentialCipher::new(&config.master_secret, config.kdf)?;
        Ok(Self::with_cipher(repo, cipher))
    }

    pub fn with_cipher(repo: Arc<R>, cipher: CredentialCipher) -> Self {
        Self {
            cipher,
            repo,
            locks: KeyedLocks::new(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // PRIMITIVES
    // ═══════════════════════════════════════════════════════════════════════

    pub fn encrypt(&self, credentials: &Credentials) -> Result<CipherPayload> {
        self.cipher.encrypt(credentials)
    }

    pub fn decrypt(&self, record: &EncryptedCredentialRecord) -> Result<Credentials> {
        self.cipher.decrypt(&record.cipher)
    }

    pub fn hash(&self, credentials: &Credentials) -> String {
        credential_hash(credentials)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // RECORD OPERATIONS
    // ═══════════════════════════════════════════════════════════════════════

    /// Encrypt, hash and persist a new active record
    pub async fn create_secure_storage(
        &self,
        credentials: &Credentials,
        listing_id: &str,
        seller_id: &str,
    ) -> Result<EncryptedCredentialRecord> {
        let cipher = self.encrypt(credentials)?;
        let now = Utc::now();

        let record = EncryptedCredentialRecord {
            id: format!("cred-{}", uuid::Uuid::new_v4()),
            listing_id: listing_id.to_string(),
            seller_id: seller_id.to_string(),
            cipher,
            integrity_hash: self.hash(credentials),
            access_token: generate_access_token(),
            created_at: now,
            last_accessed_at: None,
            access_count: 0,
            active: true,
            deactivated_at: None,
            deactivated_by: None,
        };

        self.repo.create_credential_record(&record).await?;
        self.audit(&record.id, AuditAction::Encrypt, seller_id, None)
            .await?;

        info!(
            record_id = %record.id,
            listing_id = %listing_id,
            seller_id = %seller_id,
            "Credentials sealed"
        );

        Ok(record)
    }

    /// Decrypt an active record for `actor_id` and count the access
    pub async fn retrieve_record_credentials(
        &self,
        record_id: &str,
        actor_id: &str,
    ) -> Result<Credentials> {
        let _guard = self.locks.lock(record_id).await;

        let mut record = self.load(record_id).await?;
        if !record.active {
            warn!(
                record_id = %record_id,
                actor_id = %actor_id,
                "Refused retrieval of inactive credentials"
            );
            return Err(VaultError::InactiveRecord(record_id.to_string()));
        }

        let credentials = self.decrypt(&record).map_err(|e| {
            error!(record_id = %record_id, error = %e, "Stored credentials failed to decrypt");
            e
        })?;

        record.record_access(Utc::now());
        self.repo.update_credential_record(&record).await?;
        self.audit(record_id, AuditAction::Decrypt, actor_id, None)
            .await?;

        info!(
            record_id = %record_id,
            actor_id = %actor_id,
            access_count = record.access_count,
            "Credentials retrieved"
        );

        Ok(credentials)
    }

    /// Compare the fields present in `candidate` against the stored record.
    ///
    /// Leaves `access_count` untouched: verification never reveals the
    /// plaintext, so it is audited but not counted as an access.
    pub async fn verify_record_credentials(
        &self,
        record_id: &str,
        candidate: &CredentialCandidate,
    ) -> Result<bool> {
        let record = self.load(record_id).await?;
        if !record.active {
            return Err(VaultError::InactiveRecord(record_id.to_string()));
        }

        let matches = candidate.matches(&self.decrypt(&record)?);
        self.audit(record_id, AuditAction::Verify, SYSTEM_ACTOR, Some(matches))
            .await?;

        debug!(record_id = %record_id, matches, "Credentials verified");
        Ok(matches)
    }

    /// Deactivate a record. Repeating the call is a no-op: the first
    /// `deactivated_at`/`deactivated_by` stay and no audit entry is added.
    pub async fn deactivate_record(
        &self,
        record_id: &str,
        actor_id: &str,
    ) -> Result<EncryptedCredentialRecord> {
        let _guard = self.locks.lock(record_id).await;

        let mut record = self.load(record_id).await?;
        if !record.deactivate(actor_id, Utc::now()) {
            debug!(record_id = %record_id, "Credentials already inactive");
            return Ok(record);
        }

        self.repo.update_credential_record(&record).await?;
        self.audit(record_id, AuditAction::Deactivate, actor_id, None)
            .await?;

        info!(record_id = %record_id, actor_id = %actor_id, "Credentials deactivated");
        Ok(record)
    }

    pub async fn get_record(&self, record_id: &str) -> Result<EncryptedCredentialRecord> {
        self.load(record_id).await
    }

    pub async fn audit_trail(&self, record_id: &str) -> Result<Vec<AuditEntry>> {
        Ok(self.repo.list_audit(record_id).await?)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // LISTING SURFACE
    // ═══════════════════════════════════════════════════════════════════════

    /// Seal credentials for a listing. A previous active record for the same
    /// listing is deactivated on the seller's behalf first.
    ///
    /// Submissions for one listing are serialized, so at most one of its
    /// records is active at any time.
    pub async fn submit_credentials(
        &self,
        listing_id: &str,
        seller_id: &str,
        credentials: &Credentials,
    ) -> Result<SubmissionReceipt> {
        // record ids are uuids, so the prefix keeps the two key spaces apart
        let _guard = self.locks.lock(&format!("listing:{listing_id}")).await;

        if let Some(previous) = self.repo.latest_credential_for_listing(listing_id).await? {
            if previous.active {
                self.deactivate_record(&previous.id, seller_id).await?;
            }
        }

        let record = self
            .create_secure_storage(credentials, listing_id, seller_id)
            .await?;

        Ok(SubmissionReceipt {
            record_id: record.id,
            access_token: record.access_token,
            submitted_at: record.created_at,
        })
    }

    pub async fn retrieve_credentials(
        &self,
        listing_id: &str,
        actor_id: &str,
    ) -> Result<Credentials> {
        let record = self.load_for_listing(listing_id).await?;
        self.retrieve_record_credentials(&record.id, actor_id).await
    }

    pub async fn test_credentials(
        &self,
        listing_id: &str,
        candidate: &CredentialCandidate,
    ) -> Result<bool> {
        let record = self.load_for_listing(listing_id).await?;
        self.verify_record_credentials(&record.id, candidate).await
    }

    pub async fn deactivate_credentials(
        &self,
        listing_id: &str,
        actor_id: &str,
    ) -> Result<EncryptedCredentialRecord> {
        let record = self.load_for_listing(listing_id).await?;
        self.deactivate_record(&record.id, actor_id).await
    }

    // ═══════════════════════════════════════════════════════════════════════
    // HELPERS
    // ═══════════════════════════════════════════════════════════════════════

    async fn load(&self, record_id: &str) -> Result<EncryptedCredentialRecord> {
        self.repo
            .get_credential_record(record_id)
            .await?
            .ok_or_else(|| VaultError::NotFound(record_id.to_string()))
    }

    async fn load_for_listing(&self, listing_id: &str) -> Result<EncryptedCredentialRecord> {
        self.repo
            .latest_credential_for_listing(listing_id)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("listing {listing_id}")))
    }

    async fn audit(
        &self,
        record_id: &str,
        action: AuditAction,
        actor_id: &str,
        outcome: Option<bool>,
    ) -> Result<()> {
        let entry = AuditEntry {
            id: format!("audit-{}", uuid::Uuid::new_v4()),
            record_id: record_id.to_string(),
            action,
            actor_id: actor_id.to_string(),
            at: Utc::now(),
            outcome,
        };
        self.repo.append_audit(&entry).await?;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use account_escrow_store::InMemoryRepository;
    use account_escrow_types::LoginMethod;

    fn vault() -> (Arc<InMemoryRepository>, CredentialVault<InMemoryRepository>) {
        let repo = Arc::new(InMemoryRepository::new());
        let config = VaultConfig {
            master_secret: "unit-test-master-secret-0123456789".to_string(),
            kdf: KdfParams::low_cost(),
        };
        let vault = CredentialVault::new(repo.clone(), &config).unwrap();
        (repo, vault)
    }

    fn sample() -> Credentials {
        Credentials::new(LoginMethod::Facebook, "user@example.com", "secret123")
    }

    #[tokio::test]
    async fn test_create_secure_storage() {
        let (repo, vault) = vault();
        let record = vault
            .create_secure_storage(&sample(), "listing-1", "seller-1")
            .await
            .unwrap();

        assert!(record.active);
        assert_eq!(record.access_count, 0);
        assert_eq!(record.integrity_hash, credential_hash(&sample()));
        assert_eq!(record.access_token.len(), 64);
        assert!(!record.cipher.ciphertext.contains("secret123"));

        let stored = repo.get_credential_record(&record.id).await.unwrap();
        assert_eq!(stored, Some(record.clone()));

        let trail = vault.audit_trail(&record.id).await.unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].action, AuditAction::Encrypt);
        assert_eq!(trail[0].actor_id, "seller-1");
    }

    #[tokio::test]
    async fn test_retrieve_counts_access_and_audits() {
        let (_repo, vault) = vault();
        let record = vault
            .create_secure_storage(&sample(), "listing-1", "seller-1")
            .await
            .unwrap();

        let creds = vault
            .retrieve_record_credentials(&record.id, "buyer-1")
            .await
            .unwrap();
        assert_eq!(creds, sample());

        let updated = vault.get_record(&record.id).await.unwrap();
        assert_eq!(updated.access_count, 1);
        assert!(updated.last_accessed_at.is_some());

        let trail = vault.audit_trail(&record.id).await.unwrap();
        assert_eq!(trail[1].action, AuditAction::Decrypt);
        assert_eq!(trail[1].actor_id, "buyer-1");
    }

    #[tokio::test]
    async fn test_retrieve_inactive_record_fails() {
        let (_repo, vault) = vault();
        let record = vault
            .create_secure_storage(&sample(), "listing-1", "seller-1")
            .await
            .unwrap();
        vault.deactivate_record(&record.id, "admin-1").await.unwrap();

        let result = vault.retrieve_record_credentials(&record.id, "buyer-1").await;
        assert!(matches!(result, Err(VaultError::InactiveRecord(_))));
        assert_eq!(vault.get_record(&record.id).await.unwrap().access_count, 0);
    }

    #[tokio::test]
    async fn test_tampered_record_surfaces_decryption_error() {
        let (repo, vault) = vault();
        let mut record = vault
            .create_secure_storage(&sample(), "listing-1", "seller-1")
            .await
            .unwrap();

        let mut tag = hex::decode(&record.cipher.auth_tag).unwrap();
        tag[0] ^= 0x01;
        record.cipher.auth_tag = hex::encode(tag);
        repo.update_credential_record(&record).await.unwrap();

        let err = vault
            .retrieve_record_credentials(&record.id, "buyer-1")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::VaultErrorKind::Decryption);
        assert!(!err.to_string().contains("secret123"));
        assert_eq!(vault.get_record(&record.id).await.unwrap().access_count, 0);
    }

    #[tokio::test]
    async fn test_verify_does_not_count_access() {
        let (_repo, vault) = vault();
        let record = vault
            .create_secure_storage(&sample(), "listing-1", "seller-1")
            .await
            .unwrap();

        let good = CredentialCandidate {
            login_method: None,
            login_id: Some("user@example.com".to_string()),
            password: Some("secret123".to_string()),
        };
        let bad = CredentialCandidate {
            password: Some("wrong".to_string()),
            login_method: None,
            login_id: None,
        };

        assert!(vault.verify_record_credentials(&record.id, &good).await.unwrap());
        assert!(!vault.verify_record_credentials(&record.id, &bad).await.unwrap());

        let updated = vault.get_record(&record.id).await.unwrap();
        assert_eq!(updated.access_count, 0);

        let trail = vault.audit_trail(&record.id).await.unwrap();
        let verifies: Vec<_> = trail
            .iter()
            .filter(|e| e.action == AuditAction::Verify)
            .map(|e| e.outcome)
            .collect();
        assert_eq!(verifies, vec![Some(true), Some(false)]);
    }

    #[tokio::test]
    async fn test_deactivate_is_idempotent() {
        let (_repo, vault) = vault();
        let record = vault
            .create_secure_storage(&sample(), "listing-1", "seller-1")
            .await
            .unwrap();

        let first = vault.deactivate_record(&record.id, "admin-1").await.unwrap();
        let second = vault.deactivate_record(&record.id, "admin-2").await.unwrap();

        assert!(!first.active);
        assert_eq!(second.deactivated_at, first.deactivated_at);
        assert_eq!(second.deactivated_by.as_deref(), Some("admin-1"));

        let deactivations = vault
            .audit_trail(&record.id)
            .await
            .unwrap()
            .into_iter()
            .filter(|e| e.action == AuditAction::Deactivate)
            .count();
        assert_eq!(deactivations, 1);
    }

    #[tokio::test]
    async fn test_listing_surface() {
        let (_repo, vault) = vault();
        let receipt = vault
            .submit_credentials("listing-1", "seller-1", &sample())
            .await
            .unwrap();
        assert_eq!(receipt.access_token.len(), 64);

        let creds = vault
            .retrieve_credentials("listing-1", "buyer-1")
            .await
            .unwrap();
        assert_eq!(creds, sample());

        let candidate = CredentialCandidate {
            password: Some("secret123".to_string()),
            login_method: None,
            login_id: None,
        };
        assert!(vault.test_credentials("listing-1", &candidate).await.unwrap());

        vault
            .deactivate_credentials("listing-1", "seller-1")
            .await
            .unwrap();
        let result = vault.retrieve_credentials("listing-1", "buyer-1").await;
        assert!(matches!(result, Err(VaultError::InactiveRecord(_))));

        let missing = vault.retrieve_credentials("listing-404", "buyer-1").await;
        assert!(matches!(missing, Err(VaultError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_resubmission_deactivates_previous_record() {
        let (_repo, vault) = vault();
        let first = vault
            .submit_credentials("listing-1", "seller-1", &sample())
            .await
            .unwrap();

        let updated = Credentials::new(LoginMethod::Twitter, "@seller", "n3w-pass");
        let second = vault
            .submit_credentials("listing-1", "seller-1", &updated)
            .await
            .unwrap();

        let old = vault.get_record(&first.record_id).await.unwrap();
        assert!(!old.active);
        assert_eq!(old.deactivated_by.as_deref(), Some("seller-1"));

        assert_ne!(first.record_id, second.record_id);
        let creds = vault
            .retrieve_credentials("listing-1", "buyer-1")
            .await
            .unwrap();
        assert_eq!(creds, updated);
    }

    #[tokio::test]
    async fn test_concurrent_retrievals_count_every_access() {
        let (_repo, vault) = vault();
        let vault = Arc::new(vault);
        let record = vault
            .create_secure_storage(&sample(), "listing-1", "seller-1")
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let vault = vault.clone();
            let id = record.id.clone();
            handles.push(tokio::spawn(async move {
                vault
                    .retrieve_record_credentials(&id, &format!("buyer-{i}"))
                    .await
                    .map(|_| ())
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(vault.get_record(&record.id).await.unwrap().access_count, 16);
        assert!(vault.locks.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_submissions_leave_one_active_record() {
        let (_repo, vault) = vault();
        let vault = Arc::new(vault);
        let first = vault
            .submit_credentials("listing-1", "seller-1", &sample())
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let vault = vault.clone();
            handles.push(tokio::spawn(async move {
                let creds = Credentials::new(LoginMethod::Twitter, "@seller", format!("pass-{i}"));
                vault
                    .submit_credentials("listing-1", "seller-1", &creds)
                    .await
                    .map(|receipt| receipt.record_id)
            }));
        }
        let mut record_ids = Vec::new();
        for handle in handles {
            record_ids.push(handle.await.unwrap().unwrap());
        }

        let mut active = Vec::new();
        for id in &record_ids {
            if vault.get_record(id).await.unwrap().active {
                active.push(id.clone());
            }
        }
        assert_eq!(active.len(), 1);

        assert!(!vault.get_record(&first.record_id).await.unwrap().active);
        assert!(vault.locks.is_empty());
    }
}
