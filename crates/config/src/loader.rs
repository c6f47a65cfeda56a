//! Configuration loading from multiple sources

use crate::{AppConfig, ConfigError, Result};
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use std::path::Path;

/// Prefix for environment overrides, e.g. `ACCOUNT_ESCROW_VAULT__MASTER_SECRET`
pub const ENV_PREFIX: &str = "ACCOUNT_ESCROW";

/// Separates nested keys in environment variable names
pub const ENV_SEPARATOR: &str = "__";

fn env_source(prefix: &str) -> Environment {
    Environment::with_prefix(prefix)
        .prefix_separator("_")
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
}

fn format_for(path: &Path) -> Result<FileFormat> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => Ok(FileFormat::Toml),
        Some("yaml") | Some("yml") => Ok(FileFormat::Yaml),
        Some("json") => Ok(FileFormat::Json),
        Some(other) => Err(ConfigError::LoadError(format!(
            "Unsupported file extension: {other}"
        ))),
        None => Err(ConfigError::LoadError("No file extension found".to_string())),
    }
}

/// Configuration loader with support for multiple formats and sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file
    ///
    /// Supports TOML, YAML, and JSON formats based on file extension
    pub fn from_file(path: &Path) -> Result<AppConfig> {
        let format = format_for(path)?;
        let content = std::fs::read_to_string(path)?;

        match format {
            FileFormat::Toml => Self::from_toml(&content),
            FileFormat::Yaml => Self::from_yaml(&content),
            _ => Self::from_json(&content),
        }
    }

    pub fn from_toml(content: &str) -> Result<AppConfig> {
        toml::from_str(content).map_err(ConfigError::from)
    }

    pub fn from_yaml(content: &str) -> Result<AppConfig> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    pub fn from_json(content: &str) -> Result<AppConfig> {
        serde_json::from_str(content).map_err(ConfigError::from)
    }

    /// Load configuration from environment variables with the default prefix
    pub fn from_env() -> Result<AppConfig> {
        Self::from_env_with_prefix(ENV_PREFIX)
    }

    /// Environment variables use `PREFIX_SECTION__KEY`, for example
    /// `ACCOUNT_ESCROW_TRANSFER__DEFAULT_DURATION_HOURS=72`. Anything not set
    /// falls back to its default.
    pub fn from_env_with_prefix(prefix: &str) -> Result<AppConfig> {
        let config = Config::builder().add_source(env_source(prefix)).build()?;
        config.try_deserialize().map_err(ConfigError::from)
    }

    /// Load a file, then let environment variables override single keys
    pub fn from_file_with_env(path: &Path, env_prefix: &str) -> Result<AppConfig> {
        Self::builder()
            .add_file(path, true)?
            .add_env(env_prefix)
            .build()
    }

    /// Build configuration using the config crate's builder pattern
    pub fn builder() -> ConfigLoaderBuilder {
        ConfigLoaderBuilder {
            builder: Config::builder(),
        }
    }
}

/// Builder for layered configuration: later sources override earlier ones
pub struct ConfigLoaderBuilder {
    builder: ConfigBuilder<config::builder::DefaultState>,
}

impl ConfigLoaderBuilder {
    /// Add a configuration file source
    pub fn add_file(mut self, path: &Path, required: bool) -> Result<Self> {
        let format = format_for(path)?;
        self.builder = self
            .builder
            .add_source(File::from(path).format(format).required(required));
        Ok(self)
    }

    /// Add environment variable source with prefix
    pub fn add_env(mut self, prefix: &str) -> Self {
        self.builder = self.builder.add_source(env_source(prefix));
        self
    }

    /// Set a default value for a dotted key such as `storage.backend`
    pub fn set_default(mut self, key: &str, value: &str) -> Result<Self> {
        self.builder = self.builder.set_default(key, value)?;
        Ok(self)
    }

    /// Set a value that wins over every source
    pub fn set_override(mut self, key: &str, value: &str) -> Result<Self> {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    pub fn build(self) -> Result<AppConfig> {
        let config = self.builder.build()?;
        let app: AppConfig = config.try_deserialize()?;
        tracing::debug!(
            backend = ?app.storage.backend,
            metrics = app.metrics.enabled,
            "Configuration loaded"
        );
        Ok(app)
    }
}
