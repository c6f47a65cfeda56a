use std::time::Duration;

use account_escrow_types::{AlertSeverity, AlertType, CheckStatus, TransferStatus};
use prometheus::{Encoder, Registry, TextEncoder};

use crate::metrics::*;

/// Metrics collector for the account escrow platform
pub struct MetricsCollector {
    #[allow(dead_code)]
    registry: Registry,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Self {
        let registry = Registry::new();
        Self { registry }
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Registry) -> Self {
        Self { registry }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // TRANSFER METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Record a transfer entering monitoring
    pub fn record_transfer_created(&self) {
        TRANSFERS_CREATED.inc();
        ACTIVE_TRANSFERS.inc();
    }

    /// Record a status change; leaving `active` for good drops the gauge
    pub fn record_transfer_status(&self, from: TransferStatus, to: TransferStatus) {
        TRANSFER_STATUS_COUNT.with_label_values(&[to.as_str()]).inc();

        let was_open = !from.is_terminal();
        if was_open && to.is_terminal() {
            ACTIVE_TRANSFERS.dec();
        }
    }

    /// Record how long the safe period actually ran
    pub fn record_safe_period(&self, elapsed: Duration) {
        SAFE_PERIOD_HOURS.observe(elapsed.as_secs_f64() / 3600.0);
    }

    /// Reset the active gauge after reloading state
    pub fn set_active_transfers(&self, count: i64) {
        ACTIVE_TRANSFERS.set(count);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // MONITORING METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn record_check(&self, status: CheckStatus) {
        CHECKS_PERFORMED.with_label_values(&[status.as_str()]).inc();
    }

    pub fn record_probe_failure(&self) {
        PROBE_FAILURES.inc();
    }

    pub fn record_alert(&self, alert_type: AlertType, severity: AlertSeverity) {
        ALERTS_RAISED
            .with_label_values(&[alert_type.as_str(), severity.as_str()])
            .inc();
    }

    pub fn record_notification_failure(&self) {
        NOTIFICATION_FAILURES.inc();
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // VAULT METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Record a vault operation, e.g. `("decrypt", true)`
    pub fn record_credential_operation(&self, action: &str, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        CREDENTIAL_OPERATIONS
            .with_label_values(&[action, outcome])
            .inc();
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // EXPORT
    // ═══════════════════════════════════════════════════════════════════════════

    /// Export metrics in Prometheus text format
    pub fn export_metrics(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = prometheus::gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| MetricsError::EncodingError(e.to_string()))?;

        String::from_utf8(buffer).map_err(|e| MetricsError::EncodingError(e.to_string()))
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Metrics error types
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("encoding error: {0}")]
    EncodingError(String),
    #[error("registry error: {0}")]
    RegistryError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collector_creation() {
        let collector = MetricsCollector::new();
        assert!(collector.export_metrics().is_ok());
    }

    #[test]
    fn test_record_transfer_metrics() {
        let collector = MetricsCollector::new();

        collector.record_transfer_created();
        collector.record_transfer_status(TransferStatus::Active, TransferStatus::Completed);
        collector.record_safe_period(Duration::from_secs(24 * 3600));

        let metrics = collector.export_metrics().unwrap();
        assert!(metrics.contains("account_escrow_transfers_created_total"));
        assert!(metrics.contains("account_escrow_transfer_status_total"));
        assert!(metrics.contains("account_escrow_safe_period_hours"));
        assert!(metrics.contains("completed"));
    }

    #[test]
    fn test_record_monitoring_metrics() {
        let collector = MetricsCollector::new();

        collector.record_check(CheckStatus::Warning);
        collector.record_probe_failure();
        collector.record_alert(AlertType::SuspiciousActivity, AlertSeverity::High);

        let metrics = collector.export_metrics().unwrap();
        assert!(metrics.contains("account_escrow_checks_total"));
        assert!(metrics.contains("account_escrow_probe_failures_total"));
        assert!(metrics.contains("suspicious_activity"));
    }

    #[test]
    fn test_record_vault_metrics() {
        let collector = MetricsCollector::new();

        collector.record_credential_operation("decrypt", true);
        collector.record_credential_operation("verify", false);

        let metrics = collector.export_metrics().unwrap();
        assert!(metrics.contains("account_escrow_credential_operations_total"));
        assert!(metrics.contains("failure"));
    }
}
