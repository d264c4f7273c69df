//! Email verification tokens
//!
//! Each account has at most one live token. Issuing a new one replaces any
//! earlier token, and every token expires after the configured TTL. Lookups
//! never say why a token is unusable: unknown, consumed and expired tokens
//! all resolve to [`AuthError::VerificationTokenNotFound`].

use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use uuid::Uuid;

use crate::core::auth::error::AuthError;
use crate::core::db::{VerificationStore, VerificationToken};

/// Default token lifetime (24 hours)
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;

/// Random bytes per token
const TOKEN_BYTES: usize = 32;

#[derive(Clone)]
pub struct VerificationService {
    store: Arc<dyn VerificationStore>,
    ttl: Duration,
}

impl VerificationService {
    pub fn new(store: Arc<dyn VerificationStore>, ttl_hours: i64) -> Self {
        Self {
            store,
            ttl: Duration::try_hours(ttl_hours).unwrap_or(Duration::MAX),
        }
    }

    /// Issue a fresh token for an account, revoking any earlier one
    pub async fn create(&self, account_id: Uuid) -> Result<String, AuthError> {
        let purged = self.store.delete_expired().await?;
        if purged > 0 {
            tracing::debug!("Purged {} expired verification tokens", purged);
        }

        self.store.delete_for_account(account_id).await?;

        let now = Utc::now();
        let expires_at = now.checked_add_signed(self.ttl).ok_or_else(|| {
            AuthError::InternalError("verification token lifetime is out of range".into())
        })?;

        let token = generate_token();
        self.store
            .insert(VerificationToken {
                token: token.clone(),
                account_id,
                expires_at,
                created_at: now,
            })
            .await?;

        Ok(token)
    }

    /// Look up the account a token was issued for
    pub async fn resolve(&self, token: &str) -> Result<Uuid, AuthError> {
        let Some(found) = self.store.find(token).await? else {
            return Err(AuthError::VerificationTokenNotFound);
        };

        if found.is_expired() {
            self.store.delete(token).await?;
            tracing::debug!("Verification token for {} expired", found.account_id);
            return Err(AuthError::VerificationTokenNotFound);
        }

        Ok(found.account_id)
    }

    /// Delete a token; a no-op if it is already gone
    pub async fn consume(&self, token: &str) -> Result<(), AuthError> {
        self.store.delete(token).await?;
        Ok(())
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
