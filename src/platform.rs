use account_escrow_config::{validate_config, AppConfig, StorageBackend};
use account_escrow_metrics::{ErrorContext, MetricsCollector, MetricsServer};
use account_escrow_orchestrator::{
    Clock, MonitoringProbe, NotificationGateway, OrchestratorConfig, Scheduler,
    TransferOrchestrator,
};
use account_escrow_store::{InMemoryRepository, Repository, SqliteRepository};
use account_escrow_types::{
    AuditEntry, CredentialCandidate, Credentials, EncryptedCredentialRecord, NewTransfer,
    SafeTransfer, SubmissionReceipt, TransferAlert, TransferCheck, TransferStatistics,
    TransferStatus,
};
use account_escrow_vault::{CredentialVault, KdfParams, VaultConfig, VaultError};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{PlatformError, Result};

/// Vault and orchestrator over one shared repository.
///
/// Actor ids are taken as already authenticated. Participant checks happen
/// in the orchestrator; admin-only operations are grouped at the bottom and
/// expect the caller to have checked the admin role.
pub struct EscrowPlatform {
    repo: Arc<dyn Repository>,
    vault: CredentialVault<dyn Repository>,
    orchestrator: Arc<TransferOrchestrator<dyn Repository>>,
    metrics: Arc<MetricsCollector>,
    config: AppConfig,
}

impl EscrowPlatform {
    pub fn builder(config: AppConfig) -> EscrowPlatformBuilder {
        EscrowPlatformBuilder::new(config)
    }

    pub fn vault(&self) -> &CredentialVault<dyn Repository> {
        &self.vault
    }

    pub fn orchestrator(&self) -> &Arc<TransferOrchestrator<dyn Repository>> {
        &self.orchestrator
    }

    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repo
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Re-arm monitoring for transfers left active by a previous process.
    pub async fn start(&self) -> Result<usize> {
        let resumed = self.orchestrator.resume_active().await?;
        if resumed > 0 {
            info!(resumed, "Resumed active transfers");
        }
        Ok(resumed)
    }

    /// Metrics endpoint for this platform, if enabled
    pub fn metrics_server(&self) -> Option<MetricsServer> {
        self.config.metrics.enabled.then(|| {
            MetricsServer::new(self.metrics.clone(), self.config.metrics.listen_addr.clone())
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // CREDENTIALS
    // ═══════════════════════════════════════════════════════════════════════

    pub async fn submit_credentials(
        &self,
        listing_id: &str,
        seller_id: &str,
        credentials: &Credentials,
    ) -> Result<SubmissionReceipt> {
        let result = self
            .vault
            .submit_credentials(listing_id, seller_id, credentials)
            .await;
        self.observe("encrypt", result)
    }

    pub async fn retrieve_credentials(
        &self,
        listing_id: &str,
        actor_id: &str,
    ) -> Result<Credentials> {
        let result = self.vault.retrieve_credentials(listing_id, actor_id).await;
        self.observe("decrypt", result)
    }

    pub async fn test_credentials(
        &self,
        listing_id: &str,
        candidate: &CredentialCandidate,
    ) -> Result<bool> {
        let result = self.vault.test_credentials(listing_id, candidate).await;
        self.observe("verify", result)
    }

    pub async fn deactivate_credentials(
        &self,
        listing_id: &str,
        actor_id: &str,
    ) -> Result<EncryptedCredentialRecord> {
        let result = self.vault.deactivate_credentials(listing_id, actor_id).await;
        self.observe("deactivate", result)
    }

    pub async fn credential_audit_trail(&self, record_id: &str) -> Result<Vec<AuditEntry>> {
        Ok(self.vault.audit_trail(record_id).await?)
    }

    /// Hand the sealed credentials of a released transfer to its buyer.
    pub async fn release_credentials_to_buyer(
        &self,
        transfer_id: &str,
        buyer_id: &str,
    ) -> Result<Credentials> {
        let transfer = self.orchestrator.get_transfer(transfer_id, buyer_id).await?;
        if transfer.buyer_id != buyer_id {
            warn!(
                transfer_id = %transfer_id,
                actor_id = %buyer_id,
                "Non-buyer asked for released credentials"
            );
            return Err(PlatformError::Unauthorized {
                actor_id: buyer_id.to_string(),
                transfer_id: transfer_id.to_string(),
            });
        }
        if transfer.status != TransferStatus::Completed
            || transfer.credentials_ref.released_at.is_none()
        {
            return Err(PlatformError::NotReleased {
                transfer_id: transfer_id.to_string(),
                status: transfer.status,
            });
        }

        let result = self
            .vault
            .retrieve_record_credentials(&transfer.credentials_ref.encrypted_record_id, buyer_id)
            .await
            .with_transfer_id(transfer_id);
        self.observe("decrypt", result)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // TRANSFERS
    // ═══════════════════════════════════════════════════════════════════════

    /// Open a safe transfer over an active credential record of the seller.
    pub async fn create_safe_transfer(&self, request: NewTransfer) -> Result<SafeTransfer> {
        let record = self.vault.get_record(&request.encrypted_record_id).await?;
        if !record.active {
            return Err(VaultError::InactiveRecord(record.id).into());
        }
        if record.seller_id != request.seller_id {
            return Err(PlatformError::SellerMismatch {
                record_id: record.id,
            });
        }

        Ok(self.orchestrator.create_transfer(request).await?)
    }

    pub async fn get_transfer(&self, transfer_id: &str, actor_id: &str) -> Result<SafeTransfer> {
        Ok(self.orchestrator.get_transfer(transfer_id, actor_id).await?)
    }

    pub async fn list_user_transfers(
        &self,
        user_id: &str,
        status: Option<TransferStatus>,
    ) -> Result<Vec<SafeTransfer>> {
        Ok(self
            .orchestrator
            .list_transfers_for_user(user_id, status)
            .await?)
    }

    pub async fn transfer_checks(
        &self,
        transfer_id: &str,
        actor_id: &str,
    ) -> Result<Vec<TransferCheck>> {
        Ok(self.orchestrator.list_checks(transfer_id, actor_id).await?)
    }

    pub async fn transfer_alerts(
        &self,
        transfer_id: &str,
        actor_id: &str,
    ) -> Result<Vec<TransferAlert>> {
        Ok(self.orchestrator.list_alerts(transfer_id, actor_id).await?)
    }

    pub async fn acknowledge_alert(
        &self,
        transfer_id: &str,
        alert_id: &str,
        actor_id: &str,
    ) -> Result<TransferAlert> {
        Ok(self
            .orchestrator
            .acknowledge_alert(transfer_id, alert_id, actor_id)
            .await?)
    }

    pub async fn open_dispute(
        &self,
        transfer_id: &str,
        actor_id: &str,
        reason: &str,
    ) -> Result<SafeTransfer> {
        Ok(self
            .orchestrator
            .open_dispute(transfer_id, actor_id, reason)
            .await?)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // ADMIN
    // ═══════════════════════════════════════════════════════════════════════

    pub async fn list_active_transfers(&self) -> Result<Vec<SafeTransfer>> {
        Ok(self.orchestrator.list_active().await?)
    }

    pub async fn statistics(&self) -> Result<TransferStatistics> {
        Ok(self.orchestrator.statistics().await?)
    }

    /// Admin only; the role is not checked here
    pub async fn complete_early(&self, transfer_id: &str, admin_id: &str) -> Result<SafeTransfer> {
        Ok(self.orchestrator.complete_early(transfer_id, admin_id).await?)
    }

    pub async fn fail_transfer(&self, transfer_id: &str, reason: &str) -> Result<SafeTransfer> {
        Ok(self.orchestrator.fail_transfer(transfer_id, reason).await?)
    }

    /// Admin only; the role is not checked here
    pub async fn resolve_dispute(
        &self,
        transfer_id: &str,
        admin_id: &str,
        release: bool,
    ) -> Result<SafeTransfer> {
        Ok(self
            .orchestrator
            .resolve_dispute(transfer_id, admin_id, release)
            .await?)
    }

    fn observe<T>(&self, action: &str, result: std::result::Result<T, VaultError>) -> Result<T> {
        self.metrics
            .record_credential_operation(action, result.is_ok());
        Ok(result?)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// BUILDER
// ═══════════════════════════════════════════════════════════════════════════

/// Assembles an [`EscrowPlatform`] from an [`AppConfig`].
///
/// The probe and notifier are required. Repository, scheduler and clock
/// default to what the config selects, a tokio scheduler and the system
/// clock.
pub struct EscrowPlatformBuilder {
    config: AppConfig,
    repo: Option<Arc<dyn Repository>>,
    probe: Option<Arc<dyn MonitoringProbe>>,
    notifier: Option<Arc<dyn NotificationGateway>>,
    scheduler: Option<Arc<dyn Scheduler>>,
    clock: Option<Arc<dyn Clock>>,
}

impl EscrowPlatformBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            repo: None,
            probe: None,
            notifier: None,
            scheduler: None,
            clock: None,
        }
    }

    /// Use this repository instead of the configured backend
    pub fn with_repository(mut self, repo: Arc<dyn Repository>) -> Self {
        self.repo = Some(repo);
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn MonitoringProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationGateway>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub async fn build(self) -> Result<EscrowPlatform> {
        validate_config(&self.config)?;

        let repo = match self.repo {
            Some(repo) => repo,
            None => open_repository(&self.config).await?,
        };

        let vault = CredentialVault::new(repo.clone(), &vault_config(&self.config))?;
        let metrics = Arc::new(MetricsCollector::new());

        let mut orchestrator = TransferOrchestrator::<dyn Repository>::builder()
            .with_repository(repo.clone())
            .with_metrics(metrics.clone())
            .with_config(orchestrator_config(&self.config));
        if let Some(probe) = self.probe {
            orchestrator = orchestrator.with_probe(probe);
        }
        if let Some(notifier) = self.notifier {
            orchestrator = orchestrator.with_notifier(notifier);
        }
        if let Some(scheduler) = self.scheduler {
            orchestrator = orchestrator.with_scheduler(scheduler);
        }
        if let Some(clock) = self.clock {
            orchestrator = orchestrator.with_clock(clock);
        }
        let orchestrator = orchestrator.build()?;

        info!(
            backend = ?self.config.storage.backend,
            duration_hours = self.config.transfer.default_duration_hours,
            interval_minutes = self.config.transfer.monitoring_interval_minutes,
            "Escrow platform ready"
        );

        Ok(EscrowPlatform {
            repo,
            vault,
            orchestrator,
            metrics,
            config: self.config,
        })
    }
}

async fn open_repository(config: &AppConfig) -> Result<Arc<dyn Repository>> {
    match config.storage.backend {
        StorageBackend::Memory => Ok(Arc::new(InMemoryRepository::new())),
        StorageBackend::Sqlite => {
            // validation guarantees the path is present for sqlite
            let path = config.storage.sqlite_path.as_deref().unwrap_or_default();
            Ok(Arc::new(SqliteRepository::new(path).await?))
        }
    }
}

fn vault_config(config: &AppConfig) -> VaultConfig {
    VaultConfig {
        master_secret: config.vault.master_secret.clone(),
        kdf: KdfParams {
            memory_kib: config.vault.kdf_memory_kib,
            iterations: config.vault.kdf_iterations,
            parallelism: config.vault.kdf_parallelism,
        },
    }
}

fn orchestrator_config(config: &AppConfig) -> OrchestratorConfig {
    let transfer = &config.transfer;
    OrchestratorConfig {
        default_duration_hours: transfer.default_duration_hours,
        min_duration_hours: transfer.min_duration_hours,
        max_duration_hours: transfer.max_duration_hours,
        monitoring_interval_minutes: transfer.monitoring_interval_minutes,
        early_release_after_hours: transfer.early_release_after_hours,
        probe_timeout_secs: transfer.probe_timeout_secs,
    }
}
