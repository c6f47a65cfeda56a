use account_escrow_metrics::{MetricsCollector, TransferSpan};
use account_escrow_store::{KeyedLocks, Repository};
use account_escrow_types::{
    AlertSeverity, AlertType, NewTransfer, NotificationEvent, ReleaseMethod, SafeTransfer,
    TransferAlert, TransferCheck, TransferFilter, TransferStatistics, TransferStatus,
    CredentialsRef, SuspiciousActivity, DEFAULT_DURATION_HOURS, EARLY_RELEASE_AFTER_HOURS,
    MAX_DURATION_HOURS, MIN_DURATION_HOURS, MONITORING_INTERVAL_MINUTES,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{BuilderError, OrchestratorError, Result};
use crate::notifier::NotificationGateway;
use crate::probe::{MonitoringProbe, ProbeError};
use crate::scheduler::{Job, Scheduler, TokioScheduler};

/// Orchestrator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Safe period when the caller does not choose one
    pub default_duration_hours: u32,

    /// Smallest accepted safe period
    pub min_duration_hours: u32,

    /// Largest accepted safe period
    pub max_duration_hours: u32,

    /// Minutes between monitoring probes
    pub monitoring_interval_minutes: u32,

    /// Clean transfers are released once this much time has passed
    pub early_release_after_hours: u32,

    /// Upper bound on a single probe call
    pub probe_timeout_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_duration_hours: DEFAULT_DURATION_HOURS,
            min_duration_hours: MIN_DURATION_HOURS,
            max_duration_hours: MAX_DURATION_HOURS,
            monitoring_interval_minutes: MONITORING_INTERVAL_MINUTES,
            early_release_after_hours: EARLY_RELEASE_AFTER_HOURS,
            probe_timeout_secs: 30,
        }
    }
}

impl OrchestratorConfig {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.min_duration_hours == 0 {
            return Err("min_duration_hours must be at least 1".to_string());
        }
        if !(self.min_duration_hours <= self.default_duration_hours
            && self.default_duration_hours <= self.max_duration_hours)
        {
            return Err(format!(
                "duration bounds must satisfy min <= default <= max, got {} <= {} <= {}",
                self.min_duration_hours, self.default_duration_hours, self.max_duration_hours
            ));
        }
        if self.monitoring_interval_minutes == 0 {
            return Err("monitoring_interval_minutes must be positive".to_string());
        }
        if self.probe_timeout_secs == 0 {
            return Err("probe_timeout_secs must be positive".to_string());
        }
        Ok(())
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.monitoring_interval_minutes) * 60)
    }
}

/// What a monitoring tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Transfer was no longer active; nothing recorded
    Skipped,
    /// A check was recorded
    Checked { suspicious: bool },
    /// The probe failed; a system alert was raised instead of a check
    ProbeFailed,
    /// The check passed and the transfer was released early
    Completed,
}

/// Notification queued while the transfer lock is held and sent after
struct Outgoing {
    user_id: String,
    event: NotificationEvent,
    payload: serde_json::Value,
}

type Outbox = Vec<Outgoing>;

fn notify_both(outbox: &mut Outbox, transfer: &SafeTransfer, event: NotificationEvent, payload: serde_json::Value) {
    for user_id in transfer.participants() {
        outbox.push(Outgoing {
            user_id: user_id.to_string(),
            event,
            payload: payload.clone(),
        });
    }
}

/// Safe-transfer state machine.
///
/// Owns every write to a transfer, its checks and its alerts. Writes to one
/// transfer are serialized through a per-id lock; the status guard inside
/// that lock is what makes racing completions safe.
pub struct TransferOrchestrator<R: Repository + ?Sized> {
    repo: Arc<R>,
    probe: Arc<dyn MonitoringProbe>,
    notifier: Arc<dyn NotificationGateway>,
    scheduler: Arc<dyn Scheduler>,
    clock: Arc<dyn Clock>,
    metrics: Arc<MetricsCollector>,
    locks: KeyedLocks,
    config: OrchestratorConfig,
    self_ref: Weak<Self>,
}

impl<R: Repository + ?Sized + 'static> TransferOrchestrator<R> {
    pub fn builder() -> TransferOrchestratorBuilder<R> {
        TransferOrchestratorBuilder::new()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repo
    }

    /// Transfer ids with a writer holding or waiting on their lock
    pub fn locked_transfers(&self) -> usize {
        self.locks.len()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // LIFECYCLE
    // ═══════════════════════════════════════════════════════════════════════════

    /// Open a safe transfer and start monitoring it.
    ///
    /// The transfer is stored as `pending`, then moved to `active` and its
    /// recurring probe and deadline are scheduled before this returns.
    pub async fn create_transfer(&self, request: NewTransfer) -> Result<SafeTransfer> {
        let duration_hours = request
            .duration_hours
            .unwrap_or(self.config.default_duration_hours);
        self.validate_request(&request, duration_hours)?;

        let now = self.clock.now();
        let interval = ChronoDuration::minutes(i64::from(self.config.monitoring_interval_minutes));
        let mut transfer = SafeTransfer {
            id: uuid::Uuid::new_v4().to_string(),
            account_id: request.account_id,
            buyer_id: request.buyer_id,
            seller_id: request.seller_id,
            transaction_id: request.transaction_id,
            status: TransferStatus::Pending,
            start_time: now,
            end_time: now + ChronoDuration::hours(i64::from(duration_hours)),
            duration_hours,
            monitoring_interval_minutes: self.config.monitoring_interval_minutes,
            last_check_time: None,
            next_check_time: Some(now + interval),
            checks_performed: 0,
            suspicious_activity: SuspiciousActivity::default(),
            credentials_ref: CredentialsRef::new(request.encrypted_record_id),
            created_at: now,
            updated_at: now,
        };

        let span = TransferSpan::new(transfer.id.clone(), "create_transfer");
        let mut outbox = Outbox::new();

        span.instrument(async {
            let _guard = self.locks.lock(&transfer.id).await;
            self.repo.create_transfer(&transfer).await?;
            self.metrics.record_transfer_created();

            self.transition(&mut transfer, TransferStatus::Active, "activate", now)?;
            self.repo.update_transfer(&transfer).await?;
            self.schedule_jobs(&transfer, now);

            info!(
                transfer_id = %transfer.id,
                account_id = %transfer.account_id,
                duration_hours,
                end_time = %transfer.end_time,
                "Safe transfer started"
            );

            notify_both(
                &mut outbox,
                &transfer,
                NotificationEvent::TransferCreated,
                json!({
                    "transferId": transfer.id,
                    "accountId": transfer.account_id,
                    "endTime": transfer.end_time,
                }),
            );
            Ok::<_, OrchestratorError>(())
        })
        .await?;

        self.dispatch(outbox).await;
        Ok(transfer)
    }

    /// One monitoring pass. A probe failure is recorded as a system alert and
    /// never stops monitoring.
    pub async fn monitoring_tick(&self, transfer_id: &str) -> Result<TickOutcome> {
        let span = TransferSpan::new(transfer_id, "monitoring_tick");
        let mut outbox = Outbox::new();

        let outcome = span
            .instrument(self.run_tick(transfer_id, &mut outbox))
            .await?;

        self.dispatch(outbox).await;
        Ok(outcome)
    }

    /// The status check runs unlocked against a snapshot so a slow service
    /// never blocks completion or disputes. The result is applied only if the
    /// transfer is still `active` once the lock is taken.
    async fn run_tick(&self, transfer_id: &str, outbox: &mut Outbox) -> Result<TickOutcome> {
        let snapshot = self.load(transfer_id).await?;
        if snapshot.status != TransferStatus::Active {
            debug!(transfer_id = %transfer_id, status = %snapshot.status, "Skipping tick on inactive transfer");
            return Ok(TickOutcome::Skipped);
        }

        let timeout = Duration::from_secs(self.config.probe_timeout_secs);
        let result = match tokio::time::timeout(timeout, self.probe.check(&snapshot)).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout),
        };

        let _guard = self.locks.lock(transfer_id).await;
        let mut transfer = self.load(transfer_id).await?;
        if transfer.status != TransferStatus::Active {
            debug!(transfer_id = %transfer_id, status = %transfer.status, "Transfer closed while monitoring check ran");
            return Ok(TickOutcome::Skipped);
        }

        let now = self.clock.now();
        let interval = transfer.monitoring_interval();

        let report = match result {
            Ok(report) => report,
            Err(e) => {
                warn!(transfer_id = %transfer_id, error = %e, "Monitoring probe failed");
                self.metrics.record_probe_failure();

                transfer.next_check_time = Some(now + interval);
                transfer.updated_at = now;
                self.repo.update_transfer(&transfer).await?;

                let mut details = BTreeMap::new();
                details.insert("error".to_string(), json!(e.to_string()));
                self.raise_alert(
                    &transfer,
                    AlertType::SystemError,
                    AlertSeverity::High,
                    format!("Monitoring check failed: {e}"),
                    details,
                    now,
                )
                .await?;
                return Ok(TickOutcome::ProbeFailed);
            }
        };

        let check = TransferCheck {
            id: uuid::Uuid::new_v4().to_string(),
            transfer_id: transfer.id.clone(),
            check_time: now,
            status: report.status,
            details: report.details.clone(),
        };
        self.repo.append_check(&check).await?;
        self.metrics.record_check(check.status);

        transfer.last_check_time = Some(now);
        transfer.checks_performed += 1;
        transfer.next_check_time = Some(now + interval);
        transfer.updated_at = now;

        let suspicious = report.details.suspicious_activity;
        if suspicious {
            let description = report.details.describe();
            transfer.suspicious_activity.record(now, description.clone());
            self.repo.update_transfer(&transfer).await?;

            warn!(
                transfer_id = %transfer.id,
                count = transfer.suspicious_activity.count,
                details = %description,
                "Suspicious activity detected"
            );

            let mut details = BTreeMap::new();
            details.insert("checkId".to_string(), json!(check.id));
            details.insert("description".to_string(), json!(description));
            details.insert("accountStatus".to_string(), json!(report.details.account_status));
            self.raise_alert(
                &transfer,
                AlertType::SuspiciousActivity,
                AlertSeverity::High,
                "Suspicious activity detected on the transferred account".to_string(),
                details,
                now,
            )
            .await?;

            notify_both(
                outbox,
                &transfer,
                NotificationEvent::SuspiciousActivity,
                json!({ "transferId": transfer.id, "details": description }),
            );
        } else {
            self.repo.update_transfer(&transfer).await?;
        }

        let early_window = ChronoDuration::hours(i64::from(self.config.early_release_after_hours));
        if !transfer.suspicious_activity.detected && transfer.elapsed(now) >= early_window {
            self.complete_locked(&mut transfer, ReleaseMethod::Automatic, None, now, outbox)
                .await?;
            return Ok(TickOutcome::Completed);
        }

        Ok(TickOutcome::Checked { suspicious })
    }

    /// Release the credentials and close the transfer. Requires `active`.
    pub async fn complete_transfer(
        &self,
        transfer_id: &str,
        method: ReleaseMethod,
    ) -> Result<SafeTransfer> {
        self.complete_as(transfer_id, method, None).await
    }

    async fn complete_as(
        &self,
        transfer_id: &str,
        method: ReleaseMethod,
        released_by: Option<&str>,
    ) -> Result<SafeTransfer> {
        let mut outbox = Outbox::new();
        let transfer = {
            let _guard = self.locks.lock(transfer_id).await;
            let mut transfer = self.load(transfer_id).await?;
            if transfer.status != TransferStatus::Active {
                return Err(self.invalid_state(&transfer, "complete"));
            }
            let now = self.clock.now();
            self.complete_locked(&mut transfer, method, released_by, now, &mut outbox)
                .await?;
            transfer
        };

        self.dispatch(outbox).await;
        Ok(transfer)
    }

    /// Deadline trigger. Returns `false` when the transfer already left
    /// `active`; losing that race is not an error.
    pub async fn complete_on_deadline(&self, transfer_id: &str) -> Result<bool> {
        let span = TransferSpan::new(transfer_id, "deadline");
        match span
            .instrument(self.complete_transfer(transfer_id, ReleaseMethod::Automatic))
            .await
        {
            Ok(_) => Ok(true),
            Err(OrchestratorError::InvalidState { status, .. }) => {
                debug!(transfer_id = %transfer_id, status = %status, "Deadline reached after transfer closed");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Admin release before the safe period ends.
    ///
    /// The orchestrator has no notion of roles: the caller must already have
    /// checked that `admin_id` is an administrator. The id is logged and sent
    /// to both participants as `releasedBy`.
    pub async fn complete_early(&self, transfer_id: &str, admin_id: &str) -> Result<SafeTransfer> {
        info!(transfer_id = %transfer_id, admin_id = %admin_id, "Early completion requested");
        self.complete_as(transfer_id, ReleaseMethod::Manual, Some(admin_id))
            .await
    }

    /// Abort the transfer from `pending` or `active`
    pub async fn fail_transfer(&self, transfer_id: &str, reason: &str) -> Result<SafeTransfer> {
        let mut outbox = Outbox::new();
        let transfer = {
            let _guard = self.locks.lock(transfer_id).await;
            let mut transfer = self.load(transfer_id).await?;
            if !matches!(
                transfer.status,
                TransferStatus::Pending | TransferStatus::Active
            ) {
                return Err(self.invalid_state(&transfer, "fail"));
            }

            let now = self.clock.now();
            self.transition(&mut transfer, TransferStatus::Failed, "fail", now)?;
            self.repo.update_transfer(&transfer).await?;
            self.scheduler.cancel(&transfer.id);

            let mut details = BTreeMap::new();
            details.insert("reason".to_string(), json!(reason));
            self.raise_alert(
                &transfer,
                AlertType::AccountCompromised,
                AlertSeverity::Critical,
                reason.to_string(),
                details,
                now,
            )
            .await?;

            error!(transfer_id = %transfer.id, reason = %reason, "Safe transfer failed");

            notify_both(
                &mut outbox,
                &transfer,
                NotificationEvent::TransferFailed,
                json!({ "transferId": transfer.id, "reason": reason }),
            );
            transfer
        };

        self.dispatch(outbox).await;
        Ok(transfer)
    }

    /// A participant contests an active transfer; monitoring stops until an
    /// admin resolves it.
    pub async fn open_dispute(
        &self,
        transfer_id: &str,
        actor_id: &str,
        reason: &str,
    ) -> Result<SafeTransfer> {
        let mut outbox = Outbox::new();
        let transfer = {
            let _guard = self.locks.lock(transfer_id).await;
            let mut transfer = self.load(transfer_id).await?;
            self.authorize(&transfer, actor_id)?;
            if transfer.status != TransferStatus::Active {
                return Err(self.invalid_state(&transfer, "dispute"));
            }

            let now = self.clock.now();
            self.transition(&mut transfer, TransferStatus::Disputed, "dispute", now)?;
            self.repo.update_transfer(&transfer).await?;
            self.scheduler.cancel(&transfer.id);

            // a buyer dispute means the seller may be taking the account back
            let (alert_type, severity) = if actor_id == transfer.buyer_id {
                (AlertType::SellerReclaim, AlertSeverity::Critical)
            } else {
                (AlertType::SuspiciousActivity, AlertSeverity::High)
            };
            let mut details = BTreeMap::new();
            details.insert("openedBy".to_string(), json!(actor_id));
            self.raise_alert(&transfer, alert_type, severity, reason.to_string(), details, now)
                .await?;

            warn!(transfer_id = %transfer.id, opened_by = %actor_id, "Dispute opened");

            notify_both(
                &mut outbox,
                &transfer,
                NotificationEvent::DisputeOpened,
                json!({ "transferId": transfer.id, "openedBy": actor_id, "reason": reason }),
            );
            transfer
        };

        self.dispatch(outbox).await;
        Ok(transfer)
    }

    /// Admin decision on a dispute: release to the buyer or fail the transfer.
    ///
    /// As with [`Self::complete_early`], the admin role is checked by the
    /// caller; `admin_id` is logged and sent as `resolvedBy`.
    pub async fn resolve_dispute(
        &self,
        transfer_id: &str,
        admin_id: &str,
        release: bool,
    ) -> Result<SafeTransfer> {
        let mut outbox = Outbox::new();
        let transfer = {
            let _guard = self.locks.lock(transfer_id).await;
            let mut transfer = self.load(transfer_id).await?;
            if transfer.status != TransferStatus::Disputed {
                return Err(self.invalid_state(&transfer, "resolve dispute on"));
            }

            let now = self.clock.now();
            if release {
                self.transition(&mut transfer, TransferStatus::Completed, "resolve", now)?;
                transfer
                    .credentials_ref
                    .release(now, ReleaseMethod::Disputed);
            } else {
                self.transition(&mut transfer, TransferStatus::Failed, "resolve", now)?;
            }
            self.repo.update_transfer(&transfer).await?;

            info!(
                transfer_id = %transfer.id,
                admin_id = %admin_id,
                released = release,
                "Dispute resolved"
            );

            notify_both(
                &mut outbox,
                &transfer,
                NotificationEvent::DisputeResolved,
                json!({ "transferId": transfer.id, "released": release, "resolvedBy": admin_id }),
            );
            transfer
        };

        self.dispatch(outbox).await;
        Ok(transfer)
    }

    /// Mark an alert as seen. Repeating the call keeps the first acknowledgement.
    pub async fn acknowledge_alert(
        &self,
        transfer_id: &str,
        alert_id: &str,
        actor_id: &str,
    ) -> Result<TransferAlert> {
        let _guard = self.locks.lock(transfer_id).await;
        let transfer = self.load(transfer_id).await?;
        let mut alert = self
            .repo
            .get_alert(transfer_id, alert_id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound {
                entity: "alert",
                id: alert_id.to_string(),
            })?;
        self.authorize(&transfer, actor_id)?;

        if alert.acknowledge(actor_id, self.clock.now()) {
            self.repo.update_alert(&alert).await?;
            info!(transfer_id = %transfer_id, alert_id = %alert_id, actor_id = %actor_id, "Alert acknowledged");
        }
        Ok(alert)
    }

    /// Re-arm monitoring for every active transfer after a restart.
    ///
    /// Transfers whose deadline already passed are completed on the spot.
    pub async fn resume_active(&self) -> Result<usize> {
        let active = self
            .repo
            .list_transfers(&TransferFilter::with_status(TransferStatus::Active))
            .await?;
        self.metrics.set_active_transfers(active.len() as i64);

        let mut resumed = 0;
        for transfer in active {
            let now = self.clock.now();
            if now >= transfer.end_time {
                self.complete_on_deadline(&transfer.id).await?;
                continue;
            }
            if self.scheduler.scheduled(&transfer.id) == 0 {
                self.schedule_jobs(&transfer, now);
                resumed += 1;
            }
        }

        info!(resumed, "Resumed monitoring");
        Ok(resumed)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Transfer as seen by one of its participants
    pub async fn get_transfer(&self, transfer_id: &str, actor_id: &str) -> Result<SafeTransfer> {
        let transfer = self.load(transfer_id).await?;
        self.authorize(&transfer, actor_id)?;
        Ok(transfer)
    }

    /// Admin read without the participant filter
    pub async fn find_transfer(&self, transfer_id: &str) -> Result<Option<SafeTransfer>> {
        Ok(self.repo.get_transfer(transfer_id).await?)
    }

    pub async fn list_transfers_for_user(
        &self,
        user_id: &str,
        status: Option<TransferStatus>,
    ) -> Result<Vec<SafeTransfer>> {
        let filter = TransferFilter::for_participant(user_id).status(status);
        Ok(self.repo.list_transfers(&filter).await?)
    }

    pub async fn list_checks(&self, transfer_id: &str, actor_id: &str) -> Result<Vec<TransferCheck>> {
        self.get_transfer(transfer_id, actor_id).await?;
        Ok(self.repo.list_checks(transfer_id).await?)
    }

    pub async fn list_alerts(&self, transfer_id: &str, actor_id: &str) -> Result<Vec<TransferAlert>> {
        self.get_transfer(transfer_id, actor_id).await?;
        Ok(self.repo.list_alerts(transfer_id).await?)
    }

    /// Admin: every transfer still being monitored
    pub async fn list_active(&self) -> Result<Vec<SafeTransfer>> {
        Ok(self
            .repo
            .list_transfers(&TransferFilter::with_status(TransferStatus::Active))
            .await?)
    }

    /// Admin: counts by status
    pub async fn statistics(&self) -> Result<TransferStatistics> {
        let all = self.repo.list_transfers(&TransferFilter::default()).await?;
        Ok(TransferStatistics::from_transfers(&all))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INTERNALS
    // ═══════════════════════════════════════════════════════════════════════════

    fn validate_request(&self, request: &NewTransfer, duration_hours: u32) -> Result<()> {
        let (min, max) = (
            self.config.min_duration_hours,
            self.config.max_duration_hours,
        );
        if !(min..=max).contains(&duration_hours) {
            return Err(OrchestratorError::Validation(format!(
                "duration_hours must be between {min} and {max}, got {duration_hours}"
            )));
        }

        let required = [
            ("account_id", &request.account_id),
            ("buyer_id", &request.buyer_id),
            ("seller_id", &request.seller_id),
            ("transaction_id", &request.transaction_id),
            ("encrypted_record_id", &request.encrypted_record_id),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(OrchestratorError::Validation(format!("{field} is required")));
            }
        }
        if request.buyer_id == request.seller_id {
            return Err(OrchestratorError::Validation(
                "buyer and seller must be different users".to_string(),
            ));
        }
        Ok(())
    }

    async fn load(&self, transfer_id: &str) -> Result<SafeTransfer> {
        self.repo
            .get_transfer(transfer_id)
            .await?
            .ok_or_else(|| OrchestratorError::transfer_not_found(transfer_id))
    }

    fn authorize(&self, transfer: &SafeTransfer, actor_id: &str) -> Result<()> {
        if transfer.is_participant(actor_id) {
            Ok(())
        } else {
            Err(OrchestratorError::Unauthorized {
                actor_id: actor_id.to_string(),
                transfer_id: transfer.id.clone(),
            })
        }
    }

    fn invalid_state(&self, transfer: &SafeTransfer, operation: &'static str) -> OrchestratorError {
        OrchestratorError::InvalidState {
            id: transfer.id.clone(),
            status: transfer.status,
            operation,
        }
    }

    fn transition(
        &self,
        transfer: &mut SafeTransfer,
        next: TransferStatus,
        operation: &'static str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if !transfer.status.can_transition_to(next) {
            return Err(self.invalid_state(transfer, operation));
        }
        let from = transfer.status;
        transfer.status = next;
        transfer.updated_at = now;
        self.metrics.record_transfer_status(from, next);
        Ok(())
    }

    /// Caller holds the transfer lock and has checked the status
    async fn complete_locked(
        &self,
        transfer: &mut SafeTransfer,
        method: ReleaseMethod,
        released_by: Option<&str>,
        now: DateTime<Utc>,
        outbox: &mut Outbox,
    ) -> Result<()> {
        self.transition(transfer, TransferStatus::Completed, "complete", now)?;
        transfer.credentials_ref.release(now, method);
        self.repo.update_transfer(transfer).await?;
        self.scheduler.cancel(&transfer.id);

        if let Ok(elapsed) = transfer.elapsed(now).to_std() {
            self.metrics.record_safe_period(elapsed);
        }

        info!(
            transfer_id = %transfer.id,
            release_method = ?method,
            checks = transfer.checks_performed,
            "Safe transfer completed"
        );

        notify_both(
            outbox,
            transfer,
            NotificationEvent::TransferCompleted,
            json!({
                "transferId": transfer.id,
                "releasedAt": transfer.credentials_ref.released_at,
                "releaseMethod": method,
                "releasedBy": released_by,
            }),
        );
        Ok(())
    }

    async fn raise_alert(
        &self,
        transfer: &SafeTransfer,
        alert_type: AlertType,
        severity: AlertSeverity,
        message: String,
        details: BTreeMap<String, serde_json::Value>,
        now: DateTime<Utc>,
    ) -> Result<TransferAlert> {
        let alert = TransferAlert {
            id: uuid::Uuid::new_v4().to_string(),
            transfer_id: transfer.id.clone(),
            alert_type,
            severity,
            message,
            details,
            acknowledged: false,
            acknowledged_by: None,
            acknowledged_at: None,
            created_at: now,
        };
        self.repo.create_alert(&alert).await?;
        self.metrics.record_alert(alert_type, severity);

        warn!(
            transfer_id = %transfer.id,
            alert_id = %alert.id,
            alert_type = alert_type.as_str(),
            severity = severity.as_str(),
            "Alert raised"
        );
        Ok(alert)
    }

    /// Send queued notifications; failures are logged and dropped
    async fn dispatch(&self, outbox: Outbox) {
        for note in outbox {
            if let Err(e) = self
                .notifier
                .send(&note.user_id, note.event, note.payload)
                .await
            {
                self.metrics.record_notification_failure();
                warn!(user_id = %note.user_id, event = %note.event, error = %e, "Notification failed");
            }
        }
    }

    fn schedule_jobs(&self, transfer: &SafeTransfer, now: DateTime<Utc>) {
        let until_deadline = (transfer.end_time - now).to_std().unwrap_or(Duration::ZERO);

        self.scheduler.schedule_recurring(
            &transfer.id,
            self.config.interval(),
            self.job(&transfer.id, JobKind::Tick),
        );
        self.scheduler.schedule_once(
            &transfer.id,
            until_deadline,
            self.job(&transfer.id, JobKind::Deadline),
        );
    }

    fn job(&self, transfer_id: &str, kind: JobKind) -> Job {
        let orchestrator = self.self_ref.clone();
        let transfer_id = transfer_id.to_string();
        Arc::new(move || {
            let orchestrator = orchestrator.clone();
            let transfer_id = transfer_id.clone();
            async move {
                let Some(orchestrator) = orchestrator.upgrade() else {
                    return;
                };
                let result = match kind {
                    JobKind::Tick => orchestrator.monitoring_tick(&transfer_id).await.map(|_| ()),
                    JobKind::Deadline => orchestrator
                        .complete_on_deadline(&transfer_id)
                        .await
                        .map(|_| ()),
                };
                if let Err(e) = result {
                    error!(transfer_id = %transfer_id, job = ?kind, error = %e, "Scheduled job failed");
                }
            }
            .boxed()
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum JobKind {
    Tick,
    Deadline,
}

// ═══════════════════════════════════════════════════════════════════════════
// BUILDER
// ═══════════════════════════════════════════════════════════════════════════

/// Builder for [`TransferOrchestrator`]
pub struct TransferOrchestratorBuilder<R: Repository + ?Sized> {
    repo: Option<Arc<R>>,
    probe: Option<Arc<dyn MonitoringProbe>>,
    notifier: Option<Arc<dyn NotificationGateway>>,
    scheduler: Option<Arc<dyn Scheduler>>,
    clock: Option<Arc<dyn Clock>>,
    metrics: Option<Arc<MetricsCollector>>,
    config: OrchestratorConfig,
}

impl<R: Repository + ?Sized + 'static> TransferOrchestratorBuilder<R> {
    pub fn new() -> Self {
        Self {
            repo: None,
            probe: None,
            notifier: None,
            scheduler: None,
            clock: None,
            metrics: None,
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_repository(mut self, repo: Arc<R>) -> Self {
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

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Repository, probe and notifier are required; the rest default to the
    /// tokio scheduler, the system clock and a fresh metrics collector.
    pub fn build(self) -> std::result::Result<Arc<TransferOrchestrator<R>>, BuilderError> {
        let repo = self.repo.ok_or_else(|| BuilderError::MissingField {
            field: "repository".to_string(),
        })?;
        let probe = self.probe.ok_or_else(|| BuilderError::MissingField {
            field: "probe".to_string(),
        })?;
        let notifier = self.notifier.ok_or_else(|| BuilderError::MissingField {
            field: "notifier".to_string(),
        })?;
        self.config.validate().map_err(BuilderError::InvalidConfig)?;

        let scheduler = self
            .scheduler
            .unwrap_or_else(|| Arc::new(TokioScheduler::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let metrics = self
            .metrics
            .unwrap_or_else(|| Arc::new(MetricsCollector::new()));
        let config = self.config;

        Ok(Arc::new_cyclic(|self_ref| TransferOrchestrator {
            repo,
            probe,
            notifier,
            scheduler,
            clock,
            metrics,
            locks: KeyedLocks::new(),
            config,
            self_ref: self_ref.clone(),
        }))
    }
}

impl<R: Repository + ?Sized + 'static> Default for TransferOrchestratorBuilder<R> {
    fn default() -> Self {
        Self::new()
    }
}
