//! Request-boundary error for every identity flow

use crate::core::auth::jwt::JwtError;
use crate::core::auth::mailer::MailerError;
use crate::core::auth::oauth::ProviderError;
use crate::core::auth::password::PasswordError;
use crate::core::db::StoreError;

/// Auth service errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid username or password")]
    CredentialMismatch,

    #[error("Username already taken")]
    DuplicateUsername,

    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token malformed")]
    TokenMalformed,

    #[error("Token signature invalid")]
    TokenInvalidSignature,

    #[error("External authentication failed")]
    ExternalAuthFailure,

    #[error("No account is associated with this identity")]
    AccountNotFound,

    #[error("An account already exists for this identity")]
    AccountAlreadyExists,

    #[error("Verification link is invalid")]
    VerificationTokenNotFound,

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Invalid username format")]
    InvalidUsername,

    #[error("Invalid email format")]
    InvalidEmail,

    #[error("Invalid password")]
    InvalidPassword,

    #[error("No email address on file")]
    NoEmailOnFile,

    #[error("Account already verified")]
    AlreadyVerified,

    #[error("Unknown identity provider")]
    ProviderNotFound,

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    /// Message safe to show to the client
    pub fn public_message(&self) -> String {
        match self {
            AuthError::InternalError(_) => "Something went wrong".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => AuthError::TokenExpired,
            JwtError::Malformed => AuthError::TokenMalformed,
            JwtError::InvalidSignature => AuthError::TokenInvalidSignature,
            JwtError::EncodingError(e) => AuthError::InternalError(e),
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateUsername => AuthError::DuplicateUsername,
            StoreError::DuplicateEmail => AuthError::DuplicateEmail,
            StoreError::NotFound => AuthError::AccountNotFound,
            StoreError::DatabaseError(e) => AuthError::InternalError(e.to_string()),
        }
    }
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        AuthError::InternalError(err.to_string())
    }
}

impl From<MailerError> for AuthError {
    fn from(err: MailerError) -> Self {
        AuthError::InternalError(err.to_string())
    }
}

impl From<ProviderError> for AuthError {
    fn from(err: ProviderError) -> Self {
        tracing::warn!("Identity provider exchange failed: {}", err);
        AuthError::ExternalAuthFailure
    }
}
