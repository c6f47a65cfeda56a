//! Integration tests for the config crate

use account_escrow_config::{
    collect_errors, validate_config, AppConfig, ConfigError, ConfigLoader, StorageBackend,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

fn shipped(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../config")
        .join(name)
}

#[test]
fn test_load_local_config() {
    let config = ConfigLoader::from_file(&shipped("local.toml")).expect("Failed to load local config");

    assert_eq!(config.storage.backend, StorageBackend::Memory);
    assert_eq!(config.transfer.default_duration_hours, 48);
    assert!(!config.logging.json);
    assert!(validate_config(&config).is_ok());
}

#[test]
fn test_production_config_needs_secret_from_env() {
    let config = ConfigLoader::from_file(&shipped("production.toml"))
        .expect("Failed to load production config");

    assert_eq!(config.storage.backend, StorageBackend::Sqlite);
    assert!(config.logging.json);

    let errors = collect_errors(&config);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, "vault.master_secret");
}

#[test]
fn test_file_with_env_override() {
    std::env::set_var(
        "ESCROW_IT_FILE_VAULT__MASTER_SECRET",
        "secret-from-the-environment-0123456789",
    );
    std::env::set_var("ESCROW_IT_FILE_TRANSFER__DEFAULT_DURATION_HOURS", "72");

    let config = ConfigLoader::from_file_with_env(&shipped("production.toml"), "ESCROW_IT_FILE")
        .unwrap();

    assert_eq!(
        config.vault.master_secret,
        "secret-from-the-environment-0123456789"
    );
    assert_eq!(config.transfer.default_duration_hours, 72);
    // untouched keys keep the file value
    assert_eq!(config.vault.kdf_iterations, 3);
    assert_eq!(config.storage.backend, StorageBackend::Sqlite);
    assert!(validate_config(&config).is_ok());
}

#[test]
fn test_env_only() {
    std::env::set_var("ESCROW_IT_ENV_STORAGE__BACKEND", "sqlite");
    std::env::set_var("ESCROW_IT_ENV_STORAGE__SQLITE_PATH", "/tmp/escrow.db");
    std::env::set_var("ESCROW_IT_ENV_METRICS__ENABLED", "false");

    let config = ConfigLoader::from_env_with_prefix("ESCROW_IT_ENV").unwrap();
    assert_eq!(config.storage.backend, StorageBackend::Sqlite);
    assert_eq!(config.storage.sqlite_path.as_deref(), Some("/tmp/escrow.db"));
    assert!(!config.metrics.enabled);
    assert_eq!(config.transfer.monitoring_interval_minutes, 30);
}

#[test]
fn test_config_builder_layers() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(
        file,
        "vault:\n  master_secret: \"0123456789abcdef0123456789abcdef\"\ntransfer:\n  default_duration_hours: 36"
    )
    .unwrap();

    let config = ConfigLoader::builder()
        .set_default("logging.level", "warn")
        .unwrap()
        .add_file(file.path(), true)
        .unwrap()
        .set_override("transfer.monitoring_interval_minutes", "10")
        .unwrap()
        .build()
        .unwrap();

    assert_eq!(config.transfer.default_duration_hours, 36);
    assert_eq!(config.transfer.monitoring_interval_minutes, 10);
    assert_eq!(config.logging.level, "warn");
}

#[test]
fn test_missing_required_file() {
    let result = ConfigLoader::builder()
        .add_file(Path::new("/nonexistent/escrow.toml"), true)
        .unwrap()
        .build();
    assert!(matches!(result, Err(ConfigError::ConfigLibError(_))));
}

#[test]
fn test_json_file_round_trip() {
    let mut config = AppConfig::default();
    config.vault.master_secret = "0123456789abcdef0123456789abcdef".to_string();
    config.transfer.default_duration_hours = 12;

    let mut file: NamedTempFile = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(file, "{}", serde_json::to_string(&config).unwrap()).unwrap();

    let loaded = ConfigLoader::from_file(file.path()).unwrap();
    assert_eq!(loaded, config);
}
