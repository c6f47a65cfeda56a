//! Cryptographic primitives for the credential vault.
//!
//! # Algorithms
//!
//! - **Key Derivation**: Argon2id over the master secret with a fixed
//!   context salt, so the same secret always yields the same key
//! - **Encryption**: ChaCha20-Poly1305 with a fresh random nonce per call and
//!   a fixed associated-data tag; the 16-byte tag is stored detached
//! - **Integrity hash**: SHA-256 over the canonical login fields

use account_escrow_types::{CipherPayload, Credentials};
use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::aead::{AeadInPlace, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce, Tag};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::{Result, VaultError};

// =============================================================================
// Constants
// =============================================================================

/// Derived key length (256 bits)
pub const KEY_LEN: usize = 32;

/// ChaCha20-Poly1305 nonce length
pub const NONCE_LEN: usize = 12;

/// ChaCha20-Poly1305 auth tag length
pub const AUTH_TAG_LEN: usize = 16;

/// Raw bytes behind an access token
pub const ACCESS_TOKEN_LEN: usize = 32;

/// Salt for the master-secret KDF. Fixed so key derivation is deterministic.
pub const KDF_CONTEXT: &[u8] = b"account-escrow/credential-vault/kdf/v1";

/// Associated data bound into every credential ciphertext
pub const CREDENTIALS_AAD: &[u8] = b"account-escrow/credentials/v1";

// =============================================================================
// Key Derivation
// =============================================================================

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl KdfParams {
    /// Cheap parameters for tests and local development
    pub fn low_cost() -> Self {
        Self {
            memory_kib: 256,
            iterations: 1,
            parallelism: 1,
        }
    }
}

/// Derive the vault key from the master secret.
pub fn derive_key(master_secret: &[u8], params: KdfParams) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let params = Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|e| VaultError::KeyDerivation(format!("invalid Argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(master_secret, KDF_CONTEXT, &mut key[..])
        .map_err(|e| VaultError::KeyDerivation(e.to_string()))?;

    Ok(key)
}

// =============================================================================
// Hashing / Tokens
// =============================================================================

/// One-way digest over login method, login id and password, hex encoded.
///
/// Each field is prefixed with its byte length (u64, little endian) so no
/// two distinct credential sets share an encoding.
pub fn credential_hash(credentials: &Credentials) -> String {
    let mut hasher = Sha256::new();
    for field in [
        credentials.login_method.as_str(),
        credentials.login_id.as_str(),
        credentials.password.as_str(),
    ] {
        hasher.update((field.len() as u64).to_le_bytes());
        hasher.update(field.as_bytes());
    }

    hex::encode(hasher.finalize())
}

/// Opaque, high-entropy access token from the OS RNG
pub fn generate_access_token() -> String {
    let mut bytes = [0u8; ACCESS_TOKEN_LEN];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

// =============================================================================
// Encryption / Decryption
// =============================================================================

/// Authenticated cipher keyed from the master secret
pub struct CredentialCipher {
    key: Zeroizing<[u8; KEY_LEN]>,
}

impl CredentialCipher {
    /// Derive the key once; this is deliberately slow.
    pub fn new(master_secret: &str, params: KdfParams) -> Result<Self> {
        let key = derive_key(master_secret.as_bytes(), params)?;
        Ok(Self { key })
    }

    fn aead(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(&self.key[..]))
    }

    /// Seal credentials under a fresh nonce.
    pub fn encrypt(&self, credentials: &Credentials) -> Result<CipherPayload> {
        let mut buffer =
            Zeroizing::new(serde_json::to_vec(credentials).map_err(|_| VaultError::Encryption)?);

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let tag = self
            .aead()
            .encrypt_in_place_detached(
                Nonce::from_slice(&nonce),
                CREDENTIALS_AAD,
                buffer.as_mut_slice(),
            )
            .map_err(|_| VaultError::Encryption)?;

        Ok(CipherPayload {
            ciphertext: hex::encode(buffer.as_slice()),
            nonce: hex::encode(nonce),
            auth_tag: hex::encode(tag),
        })
    }

    /// Open a payload. Any malformed field or tag mismatch is a
    /// [`VaultError::Decryption`]; no partial plaintext is ever returned.
    pub fn decrypt(&self, payload: &CipherPayload) -> Result<Credentials> {
        let nonce = hex::decode(&payload.nonce).map_err(|_| VaultError::Decryption)?;
        let tag = hex::decode(&payload.auth_tag).map_err(|_| VaultError::Decryption)?;
        if nonce.len() != NONCE_LEN || tag.len() != AUTH_TAG_LEN {
            return Err(VaultError::Decryption);
        }

        let mut buffer =
            Zeroizing::new(hex::decode(&payload.ciphertext).map_err(|_| VaultError::Decryption)?);

        self.aead()
            .decrypt_in_place_detached(
                Nonce::from_slice(&nonce),
                CREDENTIALS_AAD,
                buffer.as_mut_slice(),
                Tag::from_slice(&tag),
            )
            .map_err(|_| VaultError::Decryption)?;

        serde_json::from_slice(buffer.as_slice()).map_err(|_| VaultError::Decryption)
    }
}

impl std::fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCipher")
            .field("key", &"<redacted>")
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use account_escrow_types::LoginMethod;

    const SECRET: &str = "test-master-secret-with-enough-entropy";

    fn cipher() -> CredentialCipher {
        CredentialCipher::new(SECRET, KdfParams::low_cost()).unwrap()
    }

    fn sample() -> Credentials {
        Credentials::new(LoginMethod::Facebook, "user@example.com", "secret123")
    }

    fn flip_bit(hex_str: &str, bit: usize) -> String {
        let mut bytes = hex::decode(hex_str).unwrap();
        bytes[bit / 8] ^= 1 << (bit % 8);
        hex::encode(bytes)
    }

    #[test]
    fn test_round_trip() {
        let cipher = cipher();
        let creds = sample().with_instructions("skip the 2FA prompt");

        let payload = cipher.encrypt(&creds).unwrap();
        assert_eq!(cipher.decrypt(&payload).unwrap(), creds);
    }

    #[test]
    fn test_nonce_differs_per_call() {
        let cipher = cipher();
        let a = cipher.encrypt(&sample()).unwrap();
        let b = cipher.encrypt(&sample()).unwrap();

        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
        assert_eq!(hex::decode(&a.nonce).unwrap().len(), NONCE_LEN);
        assert_eq!(hex::decode(&a.auth_tag).unwrap().len(), AUTH_TAG_LEN);
    }

    #[test]
    fn test_key_derivation_is_deterministic() {
        let k1 = derive_key(SECRET.as_bytes(), KdfParams::low_cost()).unwrap();
        let k2 = derive_key(SECRET.as_bytes(), KdfParams::low_cost()).unwrap();
        assert_eq!(*k1, *k2);

        // a second instance can open what the first sealed
        let payload = cipher().encrypt(&sample()).unwrap();
        assert_eq!(cipher().decrypt(&payload).unwrap(), sample());
    }

    #[test]
    fn test_wrong_master_secret_fails() {
        let payload = cipher().encrypt(&sample()).unwrap();
        let other = CredentialCipher::new("another-master-secret-entirely", KdfParams::low_cost())
            .unwrap();

        assert!(matches!(other.decrypt(&payload), Err(VaultError::Decryption)));
    }

    #[test]
    fn test_every_ciphertext_bit_flip_is_rejected() {
        let cipher = cipher();
        let payload = cipher.encrypt(&sample()).unwrap();
        let bits = hex::decode(&payload.ciphertext).unwrap().len() * 8;

        for bit in 0..bits {
            let tampered = CipherPayload {
                ciphertext: flip_bit(&payload.ciphertext, bit),
                ..payload.clone()
            };
            assert!(
                matches!(cipher.decrypt(&tampered), Err(VaultError::Decryption)),
                "bit {bit} flip was accepted"
            );
        }
    }

    #[test]
    fn test_every_tag_bit_flip_is_rejected() {
        let cipher = cipher();
        let payload = cipher.encrypt(&sample()).unwrap();

        for bit in 0..AUTH_TAG_LEN * 8 {
            let tampered = CipherPayload {
                auth_tag: flip_bit(&payload.auth_tag, bit),
                ..payload.clone()
            };
            assert!(matches!(
                cipher.decrypt(&tampered),
                Err(VaultError::Decryption)
            ));
        }
    }

    #[test]
    fn test_malformed_payload_is_decryption_error() {
        let cipher = cipher();
        let payload = cipher.encrypt(&sample()).unwrap();

        let bad_hex = CipherPayload {
            nonce: "zz".to_string(),
            ..payload.clone()
        };
        assert!(matches!(cipher.decrypt(&bad_hex), Err(VaultError::Decryption)));

        let short_tag = CipherPayload {
            auth_tag: "00".to_string(),
            ..payload
        };
        assert!(matches!(
            cipher.decrypt(&short_tag),
            Err(VaultError::Decryption)
        ));
    }

    #[test]
    fn test_hash_is_deterministic_and_password_sensitive() {
        let h1 = credential_hash(&sample());
        let h2 = credential_hash(&sample());
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);

        let other = Credentials::new(LoginMethod::Facebook, "user@example.com", "secret124");
        assert_ne!(credential_hash(&other), h1);

        // instructions are not part of the canonical form
        assert_eq!(
            credential_hash(&sample().with_instructions("anything")),
            h1
        );
    }

    #[test]
    fn test_hash_separates_fields() {
        let a = Credentials::new(LoginMethod::Twitter, "player:one", "pass");
        let b = Credentials::new(LoginMethod::Twitter, "player", "one:pass");
        assert_ne!(credential_hash(&a), credential_hash(&b));

        let c = Credentials::new(LoginMethod::Twitter, "ab", "c");
        let d = Credentials::new(LoginMethod::Twitter, "a", "bc");
        assert_ne!(credential_hash(&c), credential_hash(&d));
    }

    #[test]
    fn test_access_tokens_are_unique() {
        let a = generate_access_token();
        let b = generate_access_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), ACCESS_TOKEN_LEN * 2);
    }

    #[test]
    fn test_debug_does_not_leak_key() {
        let rendered = format!("{:?}", cipher());
        assert!(rendered.contains("<redacted>"));
    }
}
