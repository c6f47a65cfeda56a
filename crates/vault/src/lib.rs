//! Credential vault for game account escrow
//!
//! Seller credentials are sealed with ChaCha20-Poly1305 under a key derived
//! once from the configured master secret with Argon2id. Records are never
//! deleted, only deactivated, and every vault operation leaves an audit
//! entry in the repository.

pub mod crypto;
pub mod error;
pub mod vault;

pub use crypto::*;
pub use error::*;
pub use vault::*;
