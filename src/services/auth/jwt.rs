use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::ConfigError;

/// Wire shape of the token claims: `{ "_id", "userName", "exp" }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenClaims {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "userName")]
    user_name: String,
    exp: i64,
}

/// Identity carried by a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityClaim {
    pub subject_id: Uuid,
    pub user_name: String,
    pub expires_at: i64,
}

/// Why a presented token was rejected.
///
/// Callers reject all three identically. The kind exists for logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VerificationFailure {
    #[error("bad signature")]
    BadSignature,
    #[error("expired")]
    Expired,
    #[error("malformed token")]
    Malformed,
}

impl From<jsonwebtoken::errors::Error> for VerificationFailure {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::InvalidSignature => Self::BadSignature,
            ErrorKind::ExpiredSignature => Self::Expired,
            _ => Self::Malformed,
        }
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// Issues and verifies HS256 bearer tokens.
///
/// - Key material is intentionally not printable via Debug.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_seconds: u64,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("validation", &self.validation)
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}

impl TokenService {
    pub fn new(secret: &str, ttl_seconds: u64, leeway_seconds: u64) -> Result<Self, ConfigError> {
        if secret.trim().is_empty() {
            return Err(ConfigError::Invalid("JWT_SECRET"));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = leeway_seconds;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl_seconds,
        })
    }

    /// Issue a token for `subject_id`, expiring `ttl_seconds` from now.
    pub fn issue(&self, subject_id: Uuid, user_name: &str) -> Result<String, TokenError> {
        let now = chrono::Utc::now().timestamp();

        self.sign(&TokenClaims {
            id: subject_id.to_string(),
            user_name: user_name.to_string(),
            exp: now + self.ttl_seconds as i64,
        })
    }

    fn sign(&self, claims: &TokenClaims) -> Result<String, TokenError> {
        let mut header = Header::new(Algorithm::HS256);
        header.typ = Some("JWT".to_string());
        Ok(jsonwebtoken::encode(&header, claims, &self.encoding_key)?)
    }

    /// Check signature and expiry, then lift the claims into an `IdentityClaim`.
    pub fn verify(&self, token: &str) -> Result<IdentityClaim, VerificationFailure> {
        let data = jsonwebtoken::decode::<TokenClaims>(token, &self.decoding_key, &self.validation)?;
        let claims = data.claims;

        // Project convention: subject is a UUID
        let subject_id =
            Uuid::parse_str(&claims.id).map_err(|_| VerificationFailure::Malformed)?;
        if claims.user_name.trim().is_empty() {
            return Err(VerificationFailure::Malformed);
        }

        Ok(IdentityClaim {
            subject_id,
            user_name: claims.user_name,
            expires_at: claims.exp,
        })
    }
}
