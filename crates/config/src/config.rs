//! Configuration structures for the account escrow platform

use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Credential vault keying
    #[serde(default)]
    pub vault: VaultConfig,

    /// Safe-transfer timing
    #[serde(default)]
    pub transfer: TransferConfig,

    /// Repository backend
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Vault master secret and Argon2id cost
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Secret the encryption key is derived from. Never logged.
    #[serde(default)]
    pub master_secret: String,

    #[serde(default = "default_kdf_memory_kib")]
    pub kdf_memory_kib: u32,

    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,

    #[serde(default = "default_kdf_parallelism")]
    pub kdf_parallelism: u32,
}

impl std::fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultConfig")
            .field("master_secret", &"<redacted>")
            .field("kdf_memory_kib", &self.kdf_memory_kib)
            .field("kdf_iterations", &self.kdf_iterations)
            .field("kdf_parallelism", &self.kdf_parallelism)
            .finish()
    }
}

/// Safe period bounds and monitoring cadence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferConfig {
    #[serde(default = "default_duration_hours")]
    pub default_duration_hours: u32,

    #[serde(default = "default_min_duration_hours")]
    pub min_duration_hours: u32,

    #[serde(default = "default_max_duration_hours")]
    pub max_duration_hours: u32,

    #[serde(default = "default_monitoring_interval_minutes")]
    pub monitoring_interval_minutes: u32,

    #[serde(default = "default_early_release_after_hours")]
    pub early_release_after_hours: u32,

    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

/// Storage backend types
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Database file, required for the sqlite backend
    #[serde(default)]
    pub sqlite_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `info,account_escrow=debug`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_metrics_listen_addr")]
    pub listen_addr: String,
}

// Default value functions
fn default_kdf_memory_kib() -> u32 {
    19_456
}

fn default_kdf_iterations() -> u32 {
    2
}

fn default_kdf_parallelism() -> u32 {
    1
}

fn default_duration_hours() -> u32 {
    48
}

fn default_min_duration_hours() -> u32 {
    1
}

fn default_max_duration_hours() -> u32 {
    168 // one week
}

fn default_monitoring_interval_minutes() -> u32 {
    30
}

fn default_early_release_after_hours() -> u32 {
    24
}

fn default_probe_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_metrics_listen_addr() -> String {
    "0.0.0.0:9090".to_string()
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            master_secret: String::new(),
            kdf_memory_kib: default_kdf_memory_kib(),
            kdf_iterations: default_kdf_iterations(),
            kdf_parallelism: default_kdf_parallelism(),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            default_duration_hours: default_duration_hours(),
            min_duration_hours: default_min_duration_hours(),
            max_duration_hours: default_max_duration_hours(),
            monitoring_interval_minutes: default_monitoring_interval_minutes(),
            early_release_after_hours: default_early_release_after_hours(),
            probe_timeout_secs: default_probe_timeout_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            listen_addr: default_metrics_listen_addr(),
        }
    }
}
