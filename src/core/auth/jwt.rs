//! Bearer token issuer and verifier
//!
//! Bearer tokens are HS256-signed and self-contained: the only claim callers
//! may rely on is the subject account id. There is no revocation list, a
//! token dies on expiry or when the signing secret changes.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default token validity window (24 hours)
pub const DEFAULT_VALIDITY_HOURS: i64 = 24;

/// Default issuer embedded in tokens
pub const DEFAULT_ISSUER: &str = "socialecho";

/// Signing settings, injected at construction
#[derive(Clone)]
pub struct JwtConfig {
    /// HS256 signing secret
    pub secret: String,
    /// Token validity window in hours
    pub validity_hours: i64,
    /// Expected `iss` claim
    pub issuer: String,
}

impl JwtConfig {
    /// Defaults: 24h validity, `socialecho` issuer
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            validity_hours: DEFAULT_VALIDITY_HOURS,
            issuer: DEFAULT_ISSUER.to_string(),
        }
    }

    /// Set token validity window
    pub fn validity_hours(mut self, hours: i64) -> Self {
        self.validity_hours = hours;
        self
    }

    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("validity_hours", &self.validity_hours)
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

/// JWT errors
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Token encoding failed: {0}")]
    EncodingError(String),

    #[error("Token expired")]
    Expired,

    #[error("Token signature invalid")]
    InvalidSignature,

    #[error("Token malformed")]
    Malformed,
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    /// Only reached for tokens with a valid compact shape; any failure other
    /// than expiry means the signed bytes were altered.
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            _ => JwtError::InvalidSignature,
        }
    }
}

/// Three non-empty base64url segments separated by dots
fn is_compact_jws(token: &str) -> bool {
    let segments: Vec<&str> = token.split('.').collect();

    segments.len() == 3
        && segments.iter().all(|segment| {
            !segment.is_empty()
                && segment.len() % 4 != 1
                && segment
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        })
}

/// Token payload
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (account ID)
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    /// Issuer
    pub iss: String,
    /// Random per-token id
    pub jti: String,
}

impl Claims {
    /// Get account ID as UUID
    pub fn account_id(&self) -> Result<Uuid, JwtError> {
        Uuid::parse_str(&self.sub).map_err(|_| JwtError::Malformed)
    }
}

/// Issues and verifies bearer tokens for account ids
#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Issue a token for an account, returning it with its expiry timestamp
    pub fn issue(&self, account_id: Uuid) -> Result<(String, i64), JwtError> {
        self.issue_at(account_id, Utc::now())
    }

    /// Issue a token as if it had been signed at `issued_at`
    pub fn issue_at(
        &self,
        account_id: Uuid,
        issued_at: DateTime<Utc>,
    ) -> Result<(String, i64), JwtError> {
        let exp = Duration::try_hours(self.config.validity_hours)
            .and_then(|validity| issued_at.checked_add_signed(validity))
            .ok_or_else(|| {
                JwtError::EncodingError(format!(
                    "validity of {} hours is out of range",
                    self.config.validity_hours
                ))
            })?;

        let claims = Claims {
            sub: account_id.to_string(),
            iat: issued_at.timestamp(),
            exp: exp.timestamp(),
            iss: self.config.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| JwtError::EncodingError(e.to_string()))?;

        Ok((token, exp.timestamp()))
    }

    /// Validate a token and return the account it was issued for
    pub fn verify(&self, token: &str) -> Result<Uuid, JwtError> {
        if !is_compact_jws(token) {
            return Err(JwtError::Malformed);
        }

        let mut validation = Validation::default();
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);
        // Strict expiration
        validation.leeway = 0;

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)?;

        token_data.claims.account_id()
    }
}
