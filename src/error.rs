use account_escrow_config::ConfigError;
use account_escrow_orchestrator::{BuilderError, ErrorKind as TransferErrorKind, OrchestratorError};
use account_escrow_store::StoreError;
use account_escrow_types::TransferStatus;
use account_escrow_vault::{VaultError, VaultErrorKind};
use thiserror::Error;

/// Error kinds across the vault and the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Authorization,
    NotFound,
    InvalidState,
    Encryption,
    Decryption,
    Storage,
}

impl From<TransferErrorKind> for ErrorKind {
    fn from(kind: TransferErrorKind) -> Self {
        match kind {
            TransferErrorKind::Validation => ErrorKind::Validation,
            TransferErrorKind::Authorization => ErrorKind::Authorization,
            TransferErrorKind::NotFound => ErrorKind::NotFound,
            TransferErrorKind::InvalidState => ErrorKind::InvalidState,
            TransferErrorKind::Storage => ErrorKind::Storage,
        }
    }
}

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("orchestrator setup failed: {0}")]
    Builder(#[from] BuilderError),

    #[error("user {actor_id} may not receive credentials for transfer {transfer_id}")]
    Unauthorized {
        actor_id: String,
        transfer_id: String,
    },

    #[error("credentials for transfer {transfer_id} are not released (status {status})")]
    NotReleased {
        transfer_id: String,
        status: TransferStatus,
    },

    #[error("credential record {record_id} belongs to a different seller")]
    SellerMismatch { record_id: String },
}

impl PlatformError {
    /// Collapse every layer's error into the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlatformError::Config(_) | PlatformError::Builder(_) => ErrorKind::Validation,
            PlatformError::SellerMismatch { .. } => ErrorKind::Validation,
            PlatformError::Unauthorized { .. } => ErrorKind::Authorization,
            PlatformError::NotReleased { .. } => ErrorKind::InvalidState,
            PlatformError::Orchestrator(e) => e.kind().into(),
            PlatformError::Store(StoreError::NotFound { .. }) => ErrorKind::NotFound,
            PlatformError::Store(_) => ErrorKind::Storage,
            PlatformError::Vault(e) => match e.kind() {
                VaultErrorKind::NotFound => ErrorKind::NotFound,
                VaultErrorKind::InactiveRecord => ErrorKind::InvalidState,
                VaultErrorKind::Storage => ErrorKind::Storage,
                VaultErrorKind::Encryption | VaultErrorKind::KeyDerivation => {
                    ErrorKind::Encryption
                }
                VaultErrorKind::Decryption => ErrorKind::Decryption,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, PlatformError>;
