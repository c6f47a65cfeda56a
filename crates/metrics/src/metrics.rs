use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

lazy_static! {
    // ═══════════════════════════════════════════════════════════════════════════
    // TRANSFER METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Total number of safe transfers created
    pub static ref TRANSFERS_CREATED: IntCounter = register_int_counter!(
        "account_escrow_transfers_created_total",
        "Total number of safe transfers created"
    )
    .unwrap();

    /// Transfer status changes by target status
    pub static ref TRANSFER_STATUS_COUNT: IntCounterVec = register_int_counter_vec!(
        "account_escrow_transfer_status_total",
        "Total transfer status changes by status",
        &["status"]
    )
    .unwrap();

    /// Transfers currently inside their safe period
    pub static ref ACTIVE_TRANSFERS: IntGauge = register_int_gauge!(
        "account_escrow_transfers_active",
        "Current number of transfers in monitoring"
    )
    .unwrap();

    /// Time from start to release, in hours
    pub static ref SAFE_PERIOD_HOURS: Histogram = register_histogram!(
        "account_escrow_safe_period_hours",
        "Elapsed safe period at completion in hours",
        vec![1.0, 6.0, 12.0, 24.0, 36.0, 48.0, 72.0, 168.0]
    )
    .unwrap();

    // ═══════════════════════════════════════════════════════════════════════════
    // MONITORING METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Monitoring checks by outcome
    pub static ref CHECKS_PERFORMED: IntCounterVec = register_int_counter_vec!(
        "account_escrow_checks_total",
        "Total monitoring checks by status",
        &["status"]
    )
    .unwrap();

    /// Probe calls that failed or timed out
    pub static ref PROBE_FAILURES: IntCounter = register_int_counter!(
        "account_escrow_probe_failures_total",
        "Total monitoring probe failures"
    )
    .unwrap();

    /// Alerts raised by type and severity
    pub static ref ALERTS_RAISED: IntCounterVec = register_int_counter_vec!(
        "account_escrow_alerts_total",
        "Total alerts raised by type and severity",
        &["type", "severity"]
    )
    .unwrap();

    /// Notifications the gateway rejected
    pub static ref NOTIFICATION_FAILURES: IntCounter = register_int_counter!(
        "account_escrow_notification_failures_total",
        "Total notification delivery failures"
    )
    .unwrap();

    // ═══════════════════════════════════════════════════════════════════════════
    // VAULT METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Vault operations by action and outcome
    pub static ref CREDENTIAL_OPERATIONS: IntCounterVec = register_int_counter_vec!(
        "account_escrow_credential_operations_total",
        "Total credential vault operations",
        &["action", "outcome"]
    )
    .unwrap();
}
