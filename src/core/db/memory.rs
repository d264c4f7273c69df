//! In-memory stores
//!
//! DashMap-backed implementations of the storage contracts. Used by the test
//! suites and when the server runs without `DATABASE_URL`.

use async_trait::async_trait;
use dashmap::{DashMap, DashSet, mapref::entry::Entry};
use uuid::Uuid;

use crate::core::db::models::{Account, NewAccount, VerificationToken};
use crate::core::db::store::{AccountStore, StoreError, VerificationStore};

/// Account store kept in process memory
#[derive(Default)]
pub struct MemoryAccountStore {
    accounts: DashMap<Uuid, Account>,
    usernames: DashMap<String, Uuid>,
    emails: DashMap<String, Uuid>,
    oauth_links: DashSet<Uuid>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored accounts
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn create_account(&self, account: NewAccount) -> Result<Account, StoreError> {
        let account = account.into_account();

        // Username index entry stays locked until the email slot is settled,
        // so both uniqueness checks commit together.
        let username_slot = match self.usernames.entry(account.username.clone()) {
            Entry::Occupied(_) => return Err(StoreError::DuplicateUsername),
            Entry::Vacant(slot) => slot,
        };

        if let Some(email) = &account.email {
            match self.emails.entry(email.clone()) {
                Entry::Occupied(_) => return Err(StoreError::DuplicateEmail),
                Entry::Vacant(slot) => {
                    slot.insert(account.id);
                }
            }
        }

        self.accounts.insert(account.id, account.clone());
        username_slot.insert(account.id);

        Ok(account)
    }

    async fn create_oauth_account(&self, account: NewAccount) -> Result<Account, StoreError> {
        let account = self.create_account(account).await?;
        self.oauth_links.insert(account.id);
        Ok(account)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        Ok(self.accounts.get(&id).map(|a| a.value().clone()))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        let Some(id) = self.usernames.get(username).map(|id| *id) else {
            return Ok(None);
        };
        self.find_by_id(id).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let Some(id) = self.emails.get(email).map(|id| *id) else {
            return Ok(None);
        };
        self.find_by_id(id).await
    }

    async fn mark_verified(&self, id: Uuid) -> Result<(), StoreError> {
        let mut account = self.accounts.get_mut(&id).ok_or(StoreError::NotFound)?;
        account.verified = true;
        Ok(())
    }

    async fn mark_oauth_linked(&self, id: Uuid) -> Result<(), StoreError> {
        if !self.accounts.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        self.oauth_links.insert(id);
        Ok(())
    }

    async fn is_oauth_linked(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.oauth_links.contains(&id))
    }
}

/// Verification token store kept in process memory
#[derive(Default)]
pub struct MemoryVerificationStore {
    tokens: DashMap<String, VerificationToken>,
}

impl MemoryVerificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live mappings
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Drop matching tokens and count them; concurrent inserts are not counted
    fn remove_where(&self, mut matches: impl FnMut(&VerificationToken) -> bool) -> u64 {
        let mut removed = 0;
        self.tokens.retain(|_, t| {
            let hit = matches(t);
            if hit {
                removed += 1;
            }
            !hit
        });
        removed
    }
}

#[async_trait]
impl VerificationStore for MemoryVerificationStore {
    async fn insert(&self, token: VerificationToken) -> Result<(), StoreError> {
        self.tokens.insert(token.token.clone(), token);
        Ok(())
    }

    async fn find(&self, token: &str) -> Result<Option<VerificationToken>, StoreError> {
        Ok(self.tokens.get(token).map(|t| t.value().clone()))
    }

    async fn delete(&self, token: &str) -> Result<bool, StoreError> {
        Ok(self.tokens.remove(token).is_some())
    }

    async fn delete_for_account(&self, account_id: Uuid) -> Result<u64, StoreError> {
        Ok(self.remove_where(|t| t.account_id == account_id))
    }

    async fn delete_expired(&self) -> Result<u64, StoreError> {
        Ok(self.remove_where(VerificationToken::is_expired))
    }
}
