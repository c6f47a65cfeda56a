//! Game account escrow
//!
//! Sellers seal account credentials in the [`CredentialVault`]; a sale then
//! opens a safe transfer that the [`TransferOrchestrator`] monitors for a
//! fixed safe period before the buyer may read the credentials.
//! [`EscrowPlatform`] wires both over one repository chosen by
//! [`AppConfig`].
//!
//! # Example
//!
//! ```no_run
//! use account_escrow::{AppConfig, EscrowPlatform, LoggingNotifier, RandomProbe};
//! use std::sync::Arc;
//!
//! # async fn run(config: AppConfig) -> account_escrow::Result<()> {
//! let platform = EscrowPlatform::builder(config)
//!     .with_probe(Arc::new(RandomProbe::default()))
//!     .with_notifier(Arc::new(LoggingNotifier))
//!     .build()
//!     .await?;
//! platform.start().await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod platform;

pub use error::{ErrorKind, PlatformError, Result};
pub use platform::{EscrowPlatform, EscrowPlatformBuilder};

pub use account_escrow_config::{AppConfig, ConfigLoader, StorageBackend};
pub use account_escrow_metrics::{init_tracing, MetricsCollector, MetricsServer};
pub use account_escrow_orchestrator::{
    Clock, LoggingNotifier, ManualClock, ManualScheduler, MonitoringProbe, NotificationGateway,
    RandomProbe, RecordingNotifier, Scheduler, ScriptedProbe, SystemClock, TickOutcome,
    TokioScheduler, TransferOrchestrator,
};
pub use account_escrow_store::{InMemoryRepository, Repository, SqliteRepository};
pub use account_escrow_types::*;
pub use account_escrow_vault::{CredentialVault, SYSTEM_ACTOR};
