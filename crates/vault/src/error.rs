use account_escrow_store::StoreError;
use thiserror::Error;

/// Vault failures. Messages never carry plaintext or cipher material.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("credential record not found: {0}")]
    NotFound(String),

    #[error("credential record is inactive: {0}")]
    InactiveRecord(String),

    #[error("encryption failed")]
    Encryption,

    #[error("decryption failed: authentication tag did not verify")]
    Decryption,

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultErrorKind {
    NotFound,
    InactiveRecord,
    Encryption,
    Decryption,
    KeyDerivation,
    Storage,
}

impl VaultError {
    pub fn kind(&self) -> VaultErrorKind {
        match self {
            VaultError::NotFound(_) => VaultErrorKind::NotFound,
            VaultError::InactiveRecord(_) => VaultErrorKind::InactiveRecord,
            VaultError::Encryption => VaultErrorKind::Encryption,
            VaultError::Decryption => VaultErrorKind::Decryption,
            VaultError::KeyDerivation(_) => VaultErrorKind::KeyDerivation,
            VaultError::Store(_) => VaultErrorKind::Storage,
        }
    }
}

pub type Result<T> = std::result::Result<T, VaultError>;
