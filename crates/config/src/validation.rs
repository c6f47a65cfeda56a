//! Configuration validation

use crate::{AppConfig, ConfigError, Result, StorageBackend};
use std::net::SocketAddr;

/// Shortest accepted vault master secret
pub const MIN_MASTER_SECRET_LEN: usize = 32;

/// Hard ceiling on any safe period (one week)
pub const MAX_SAFE_PERIOD_HOURS: u32 = 168;

/// Validation error details
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Every problem with `config`, in field order
pub fn collect_errors(config: &AppConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    // Vault
    if config.vault.master_secret.chars().count() < MIN_MASTER_SECRET_LEN {
        errors.push(ValidationError::new(
            "vault.master_secret",
            format!("must be at least {MIN_MASTER_SECRET_LEN} characters"),
        ));
    }
    if config.vault.kdf_memory_kib < 8 * config.vault.kdf_parallelism.max(1) {
        errors.push(ValidationError::new(
            "vault.kdf_memory_kib",
            "must be at least 8 KiB per lane",
        ));
    }
    if config.vault.kdf_iterations == 0 {
        errors.push(ValidationError::new(
            "vault.kdf_iterations",
            "must be greater than 0",
        ));
    }
    if config.vault.kdf_parallelism == 0 {
        errors.push(ValidationError::new(
            "vault.kdf_parallelism",
            "must be greater than 0",
        ));
    }

    // Transfer
    let t = &config.transfer;
    if t.min_duration_hours == 0 {
        errors.push(ValidationError::new(
            "transfer.min_duration_hours",
            "must be at least 1",
        ));
    }
    if t.max_duration_hours > MAX_SAFE_PERIOD_HOURS {
        errors.push(ValidationError::new(
            "transfer.max_duration_hours",
            format!("must be <= {MAX_SAFE_PERIOD_HOURS}"),
        ));
    }
    if t.min_duration_hours > t.max_duration_hours {
        errors.push(ValidationError::new(
            "transfer.min_duration_hours",
            "must not exceed max_duration_hours",
        ));
    }
    if !(t.min_duration_hours..=t.max_duration_hours).contains(&t.default_duration_hours) {
        errors.push(ValidationError::new(
            "transfer.default_duration_hours",
            format!(
                "must be between {} and {}",
                t.min_duration_hours, t.max_duration_hours
            ),
        ));
    }
    if t.monitoring_interval_minutes == 0 {
        errors.push(ValidationError::new(
            "transfer.monitoring_interval_minutes",
            "must be greater than 0",
        ));
    }
    if t.probe_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "transfer.probe_timeout_secs",
            "must be greater than 0",
        ));
    }

    // Storage
    if config.storage.backend == StorageBackend::Sqlite
        && config
            .storage
            .sqlite_path
            .as_deref()
            .map_or(true, |p| p.trim().is_empty())
    {
        errors.push(ValidationError::new(
            "storage.sqlite_path",
            "required when backend is sqlite",
        ));
    }

    // Logging
    if let Err(e) = validate_log_level(&config.logging.level) {
        errors.push(e);
    }

    // Metrics
    if config.metrics.enabled && config.metrics.listen_addr.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "metrics.listen_addr",
            format!("'{}' is not a socket address", config.metrics.listen_addr),
        ));
    }

    errors
}

/// Validate the entire application configuration
pub fn validate_config(config: &AppConfig) -> Result<()> {
    let errors = collect_errors(config);
    if errors.is_empty() {
        return Ok(());
    }

    let error_msg = errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    Err(ConfigError::ValidationError(error_msg))
}

/// Accepts a level (`info`) or a filter list (`info,account_escrow=debug`)
fn validate_log_level(level: &str) -> std::result::Result<(), ValidationError> {
    let valid = !level.trim().is_empty()
        && level.split(',').all(|directive| {
            let lvl = directive.rsplit('=').next().unwrap_or(directive);
            matches!(
                lvl.trim().to_lowercase().as_str(),
                "trace" | "debug" | "info" | "warn" | "error" | "off"
            )
        });

    if valid {
        Ok(())
    } else {
        Err(ValidationError::new(
            "logging.level",
            format!(
                "invalid log level '{level}', must be one of: trace, debug, info, warn, error"
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{StorageConfig, TransferConfig, VaultConfig};

    fn valid() -> AppConfig {
        AppConfig {
            vault: VaultConfig {
                master_secret: "0123456789abcdef0123456789abcdef".to_string(),
                ..VaultConfig::default()
            },
            ..AppConfig::default()
        }
    }

    fn fields(config: &AppConfig) -> Vec<String> {
        collect_errors(config).into_iter().map(|e| e.field).collect()
    }

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn test_short_master_secret() {
        let mut config = valid();
        config.vault.master_secret = "too-short".to_string();
        assert_eq!(fields(&config), vec!["vault.master_secret"]);
    }

    #[test]
    fn test_duration_ordering() {
        let mut config = valid();
        config.transfer = TransferConfig {
            default_duration_hours: 200,
            max_duration_hours: 300,
            ..TransferConfig::default()
        };
        let fields = fields(&config);
        assert!(fields.contains(&"transfer.max_duration_hours".to_string()));
        assert!(!fields.contains(&"transfer.default_duration_hours".to_string()));

        let mut config = valid();
        config.transfer.default_duration_hours = 0;
        config.transfer.min_duration_hours = 0;
        let fields = collect_errors(&config);
        assert!(fields.iter().any(|e| e.field == "transfer.min_duration_hours"));
    }

    #[test]
    fn test_zero_interval() {
        let mut config = valid();
        config.transfer.monitoring_interval_minutes = 0;
        assert_eq!(fields(&config), vec!["transfer.monitoring_interval_minutes"]);
    }

    #[test]
    fn test_sqlite_requires_path() {
        let mut config = valid();
        config.storage = StorageConfig {
            backend: StorageBackend::Sqlite,
            sqlite_path: None,
        };
        assert_eq!(fields(&config), vec!["storage.sqlite_path"]);

        config.storage.sqlite_path = Some("escrow.db".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_log_levels() {
        assert!(validate_log_level("info").is_ok());
        assert!(validate_log_level("WARN").is_ok());
        assert!(validate_log_level("info,account_escrow=debug").is_ok());
        assert!(validate_log_level("verbose").is_err());
        assert!(validate_log_level("").is_err());
    }

    #[test]
    fn test_metrics_addr_only_checked_when_enabled() {
        let mut config = valid();
        config.metrics.listen_addr = "nowhere".to_string();
        assert_eq!(fields(&config), vec!["metrics.listen_addr"]);

        config.metrics.enabled = false;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_all_errors_reported_together() {
        let mut config = AppConfig::default();
        config.transfer.monitoring_interval_minutes = 0;
        config.logging.level = "loud".to_string();

        match validate_config(&config) {
            Err(ConfigError::ValidationError(msg)) => {
                assert!(msg.contains("vault.master_secret"));
                assert!(msg.contains("transfer.monitoring_interval_minutes"));
                assert!(msg.contains("logging.level"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
