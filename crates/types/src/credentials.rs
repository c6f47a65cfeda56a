use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Social login the game account is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginMethod {
    Facebook,
    Twitter,
}

impl LoginMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginMethod::Facebook => "facebook",
            LoginMethod::Twitter => "twitter",
        }
    }
}

impl std::fmt::Display for LoginMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Plaintext account credentials.
///
/// Only ever lives in memory for the duration of a vault call; the buffers
/// are wiped on drop and `Debug` never prints the secret fields.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    #[zeroize(skip)]
    pub login_method: LoginMethod,
    pub login_id: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_instructions: Option<String>,
}

impl Credentials {
    pub fn new(
        login_method: LoginMethod,
        login_id: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            login_method,
            login_id: login_id.into(),
            password: password.into(),
            additional_instructions: None,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.additional_instructions = Some(instructions.into());
        self
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("login_method", &self.login_method)
            .field("login_id", &"<redacted>")
            .field("password", &"<redacted>")
            .field(
                "additional_instructions",
                &self.additional_instructions.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Partial credentials used to test a stored record without revealing it.
/// Only the fields that are `Some` take part in the comparison.
#[derive(Clone, Default, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct CredentialCandidate {
    #[zeroize(skip)]
    pub login_method: Option<LoginMethod>,
    pub login_id: Option<String>,
    pub password: Option<String>,
}

impl CredentialCandidate {
    pub fn is_empty(&self) -> bool {
        self.login_method.is_none() && self.login_id.is_none() && self.password.is_none()
    }

    /// Compare the present fields against full credentials
    pub fn matches(&self, credentials: &Credentials) -> bool {
        if self.is_empty() {
            return false;
        }
        self.login_method
            .map_or(true, |m| m == credentials.login_method)
            && self
                .login_id
                .as_deref()
                .map_or(true, |id| id == credentials.login_id)
            && self
                .password
                .as_deref()
                .map_or(true, |pw| pw == credentials.password)
    }
}

impl std::fmt::Debug for CredentialCandidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCandidate")
            .field("login_method", &self.login_method)
            .field("login_id", &self.login_id.as_ref().map(|_| "<redacted>"))
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// AEAD output, hex encoded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CipherPayload {
    pub ciphertext: String,
    pub nonce: String,
    pub auth_tag: String,
}

/// Seller-submitted credentials at rest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedCredentialRecord {
    pub id: String,
    pub listing_id: String,
    pub seller_id: String,
    pub cipher: CipherPayload,
    /// SHA-256 over the canonical login fields, hex encoded
    pub integrity_hash: String,
    /// Opaque high-entropy token handed back to the seller on submission
    pub access_token: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub access_count: u64,
    pub active: bool,
    pub deactivated_at: Option<DateTime<Utc>>,
    pub deactivated_by: Option<String>,
}

impl EncryptedCredentialRecord {
    /// Mark the record accessed. Callers serialize this per record.
    pub fn record_access(&mut self, at: DateTime<Utc>) {
        self.access_count += 1;
        self.last_accessed_at = Some(at);
    }

    /// Deactivate the record. Returns `false` when it was already inactive,
    /// in which case nothing is touched.
    pub fn deactivate(&mut self, actor_id: &str, at: DateTime<Utc>) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        self.deactivated_at = Some(at);
        self.deactivated_by = Some(actor_id.to_string());
        true
    }
}

/// What the seller gets back from a submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub record_id: String,
    pub access_token: String,
    pub submitted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Credentials {
        Credentials::new(LoginMethod::Facebook, "user@example.com", "secret123")
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let rendered = format!("{:?}", sample().with_instructions("pin is 1234"));
        assert!(!rendered.contains("secret123"));
        assert!(!rendered.contains("user@example.com"));
        assert!(!rendered.contains("1234"));
        assert!(rendered.contains("Facebook"));
    }

    #[test]
    fn test_credentials_json_shape() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["loginMethod"], "facebook");
        assert_eq!(json["loginId"], "user@example.com");
        assert!(json.get("additionalInstructions").is_none());
    }

    #[test]
    fn test_candidate_matches_present_fields_only() {
        let creds = sample();

        let by_password = CredentialCandidate {
            password: Some("secret123".to_string()),
            login_method: None,
            login_id: None,
        };
        assert!(by_password.matches(&creds));

        let wrong_method = CredentialCandidate {
            login_method: Some(LoginMethod::Twitter),
            password: Some("secret123".to_string()),
            login_id: None,
        };
        assert!(!wrong_method.matches(&creds));

        assert!(!CredentialCandidate::default().matches(&creds));
    }

    #[test]
    fn test_deactivate_is_one_way() {
        let now = Utc::now();
        let mut record = EncryptedCredentialRecord {
            id: "cred-1".to_string(),
            listing_id: "listing-1".to_string(),
            seller_id: "seller-1".to_string(),
            cipher: CipherPayload {
                ciphertext: String::new(),
                nonce: String::new(),
                auth_tag: String::new(),
            },
            integrity_hash: String::new(),
            access_token: String::new(),
            created_at: now,
            last_accessed_at: None,
            access_count: 0,
            active: true,
            deactivated_at: None,
            deactivated_by: None,
        };

        assert!(record.deactivate("admin-1", now));
        let later = now + chrono::Duration::hours(1);
        assert!(!record.deactivate("admin-2", later));
        assert_eq!(record.deactivated_at, Some(now));
        assert_eq!(record.deactivated_by.as_deref(), Some("admin-1"));
        assert!(!record.active);
    }
}
