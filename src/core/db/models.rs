//! Database models for SocialEcho
//!
//! This module defines the entity structs that map to PostgreSQL tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ============================================================================
// Account Model
// ============================================================================

/// Account entity representing a registered user
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email: Option<String>,
    pub verified: bool,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Account data for creation (password_hash must already be hashed)
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub verified: bool,
    pub avatar_url: Option<String>,
}

impl NewAccount {
    /// Materialize the account row with a fresh id and creation time
    pub fn into_account(self) -> Account {
        Account {
            id: Uuid::new_v4(),
            username: self.username,
            password_hash: self.password_hash,
            email: self.email,
            verified: self.verified,
            avatar_url: self.avatar_url,
            created_at: Utc::now(),
        }
    }
}

/// Account without sensitive data (for API responses)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountResponse {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub verified: bool,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            username: account.username,
            email: account.email,
            verified: account.verified,
            avatar_url: account.avatar_url,
            created_at: account.created_at,
        }
    }
}

// ============================================================================
// Verification Token Model
// ============================================================================

/// Single-use email verification token
#[derive(Debug, Clone, FromRow)]
pub struct VerificationToken {
    pub token: String,
    pub account_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl VerificationToken {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

// ============================================================================
// Tests
// ============================================================================
