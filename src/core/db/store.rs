//! Storage contracts consumed by the identity core
//!
//! The auth services only talk to these traits. PostgreSQL repositories and
//! the in-memory stores both implement them.

use async_trait::async_trait;
use uuid::Uuid;

use crate::core::db::models::{Account, NewAccount, VerificationToken};

/// Store error types
///
/// "Not found" on reads is never an error; lookups return `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Username already exists")]
    DuplicateUsername,

    #[error("Email already exists")]
    DuplicateEmail,

    #[error("Record not found")]
    NotFound,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Account record store
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert a new account; fails on username or email collision
    async fn create_account(&self, account: NewAccount) -> Result<Account, StoreError>;

    /// Insert a new account together with its OAuth link marker; either both
    /// are stored or neither is
    async fn create_oauth_account(&self, account: NewAccount) -> Result<Account, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    /// Flip the verified flag; `NotFound` if the account is gone
    async fn mark_verified(&self, id: Uuid) -> Result<(), StoreError>;

    /// Record that the account was provisioned through federation
    async fn mark_oauth_linked(&self, id: Uuid) -> Result<(), StoreError>;

    async fn is_oauth_linked(&self, id: Uuid) -> Result<bool, StoreError>;
}

/// Opaque verification token -> account id mapping
#[async_trait]
pub trait VerificationStore: Send + Sync {
    async fn insert(&self, token: VerificationToken) -> Result<(), StoreError>;

    async fn find(&self, token: &str) -> Result<Option<VerificationToken>, StoreError>;

    /// Returns whether a mapping was removed
    async fn delete(&self, token: &str) -> Result<bool, StoreError>;

    /// Remove every token issued for an account, returning how many
    async fn delete_for_account(&self, account_id: Uuid) -> Result<u64, StoreError>;

    /// Remove every token past its expiry, returning how many
    async fn delete_expired(&self) -> Result<u64, StoreError>;
}
