use account_escrow_store::StoreError;
use account_escrow_types::TransferStatus;
use thiserror::Error;

/// Orchestrator errors
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("actor {actor_id} is not a participant of transfer {transfer_id}")]
    Unauthorized {
        actor_id: String,
        transfer_id: String,
    },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("cannot {operation} transfer {id} in status {status}")]
    InvalidState {
        id: String,
        status: TransferStatus,
        operation: &'static str,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Stable classification callers can branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Authorization,
    NotFound,
    InvalidState,
    Storage,
}

impl OrchestratorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrchestratorError::Validation(_) => ErrorKind::Validation,
            OrchestratorError::Unauthorized { .. } => ErrorKind::Authorization,
            OrchestratorError::NotFound { .. } => ErrorKind::NotFound,
            OrchestratorError::InvalidState { .. } => ErrorKind::InvalidState,
            OrchestratorError::Store(StoreError::NotFound { .. }) => ErrorKind::NotFound,
            OrchestratorError::Store(_) => ErrorKind::Storage,
        }
    }

    pub(crate) fn transfer_not_found(id: &str) -> Self {
        OrchestratorError::NotFound {
            entity: "transfer",
            id: id.to_string(),
        }
    }
}

/// Builder error
#[derive(Debug, Error)]
pub enum BuilderError {
    #[error("missing required field: {field}")]
    MissingField { field: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
