//! OAuth federation
//!
//! An [`IdentityProvider`] performs the provider-specific exchange (code for
//! access token, access token for profile). [`FederationService`] takes the
//! resulting [`RemoteProfile`] and resolves it to a local account:
//!
//! - **login**: the remote email must already belong to a local account.
//! - **signup**: the remote email must be unused; a new OAuth-linked account
//!   is created with an unusable random password.
//!
//! Both paths finish by minting a bearer token for the resolved account.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::auth::error::AuthError;
use crate::core::auth::jwt::JwtService;
use crate::core::auth::password::{hash_password, random_password};
use crate::core::db::{Account, AccountStore, NewAccount, StoreError};

/// Longest username the account store accepts
pub const MAX_USERNAME_LEN: usize = 32;

/// Fewest random characters appended on a username collision
const MIN_SUFFIX_LEN: usize = 4;

/// Attempts at finding a free username before giving up
const MAX_USERNAME_ATTEMPTS: usize = 5;

/// Which federation flow a callback belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthMode {
    Login,
    Signup,
}

impl fmt::Display for OAuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OAuthMode::Login => write!(f, "login"),
            OAuthMode::Signup => write!(f, "signup"),
        }
    }
}

/// Identity as reported by the external provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteProfile {
    pub provider_id: String,
    pub username: String,
    pub email: Option<String>,
    pub verified: bool,
    /// Provider-specific avatar reference, not a URL
    pub avatar: Option<String>,
}

/// Identity provider exchange errors
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Code exchange failed: {0}")]
    Exchange(String),

    #[error("Invalid provider URL: {0}")]
    InvalidUrl(String),
}

/// Provider-specific half of the authorization-code flow
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Short name used in routes, e.g. `discord`
    fn name(&self) -> &'static str;

    /// Where to send the browser to start the flow
    fn authorize_url(&self, mode: OAuthMode) -> Result<String, ProviderError>;

    /// Trade an authorization code for an access token
    async fn exchange_code(&self, code: &str, mode: OAuthMode) -> Result<String, ProviderError>;

    async fn fetch_profile(&self, access_token: &str) -> Result<RemoteProfile, ProviderError>;

    /// Public avatar URL for a profile, if it has one
    fn avatar_url(&self, profile: &RemoteProfile) -> Option<String>;
}

/// Result of a successful federation
#[derive(Debug, Clone)]
pub struct FederatedSession {
    pub account: Account,
    pub token: String,
}

impl FederatedSession {
    /// Where the browser goes after the callback
    pub fn redirect_target(&self, mode: OAuthMode) -> &'static str {
        post_auth_redirect(&self.account, mode)
    }
}

/// Post-authentication landing page
pub fn post_auth_redirect(account: &Account, mode: OAuthMode) -> &'static str {
    match (account.verified, mode) {
        (false, _) => "/auth/verify?signup=true",
        (true, OAuthMode::Signup) => "/user/",
        (true, OAuthMode::Login) => "/feed",
    }
}

/// Match-or-create resolution of remote identities
#[derive(Clone)]
pub struct FederationService {
    accounts: Arc<dyn AccountStore>,
    tokens: JwtService,
}

impl FederationService {
    pub fn new(accounts: Arc<dyn AccountStore>, tokens: JwtService) -> Self {
        Self { accounts, tokens }
    }

    /// Run the whole callback: exchange, profile fetch, resolution
    pub async fn authenticate(
        &self,
        provider: &dyn IdentityProvider,
        code: &str,
        mode: OAuthMode,
    ) -> Result<FederatedSession, AuthError> {
        let access_token = provider.exchange_code(code, mode).await?;
        let profile = provider.fetch_profile(&access_token).await?;

        match mode {
            OAuthMode::Login => self.login(&profile).await,
            OAuthMode::Signup => {
                let avatar = provider.avatar_url(&profile);
                self.signup(&profile, avatar).await
            }
        }
    }

    /// Log in the local account owning the remote email
    pub async fn login(&self, profile: &RemoteProfile) -> Result<FederatedSession, AuthError> {
        let email = remote_email(profile)?;

        let Some(account) = self.accounts.find_by_email(email).await? else {
            warn!("Federated login for unknown email");
            return Err(AuthError::AccountNotFound);
        };

        let (token, _) = self.tokens.issue(account.id)?;
        info!("Federated login for account {}", account.id);

        Ok(FederatedSession { account, token })
    }

    /// Provision a new OAuth-linked account for the remote identity
    pub async fn signup(
        &self,
        profile: &RemoteProfile,
        avatar_url: Option<String>,
    ) -> Result<FederatedSession, AuthError> {
        let email = remote_email(profile)?;

        if self.accounts.find_by_email(email).await?.is_some() {
            warn!("Federated signup for an email already on file");
            return Err(AuthError::AccountAlreadyExists);
        }

        let password_hash = hash_password(&random_password())?;
        let base = base_username(&profile.username);

        let mut candidate = base.clone();
        if self.accounts.find_by_username(&candidate).await?.is_some() {
            candidate = suffixed_username(&base);
        }

        let mut created = None;
        for _ in 0..MAX_USERNAME_ATTEMPTS {
            let new_account = NewAccount {
                username: candidate.clone(),
                email: Some(email.to_string()),
                password_hash: password_hash.clone(),
                verified: profile.verified,
                avatar_url: avatar_url.clone(),
            };

            match self.accounts.create_oauth_account(new_account).await {
                Ok(account) => {
                    created = Some(account);
                    break;
                }
                Err(StoreError::DuplicateUsername) => {
                    candidate = suffixed_username(&base);
                }
                Err(StoreError::DuplicateEmail) => return Err(AuthError::AccountAlreadyExists),
                Err(e) => return Err(e.into()),
            }
        }

        let Some(account) = created else {
            return Err(AuthError::InternalError(format!(
                "no free username derived from {:?}",
                base
            )));
        };

        let (token, _) = self.tokens.issue(account.id)?;
        info!(
            "Federated signup created account {} ({})",
            account.id, account.username
        );

        Ok(FederatedSession { account, token })
    }
}

fn remote_email(profile: &RemoteProfile) -> Result<&str, AuthError> {
    match profile.email.as_deref() {
        Some(email) if !email.is_empty() => Ok(email),
        _ => {
            warn!("Remote profile {} has no email", profile.provider_id);
            Err(AuthError::ExternalAuthFailure)
        }
    }
}

/// Remote username clipped to the local length limit
fn base_username(remote: &str) -> String {
    let trimmed = remote.trim();
    if trimmed.is_empty() {
        return "user".to_string();
    }
    trimmed.chars().take(MAX_USERNAME_LEN).collect()
}

/// Base name plus a random suffix, filling the username to its maximum length
fn suffixed_username(base: &str) -> String {
    let base_len = base.chars().count();
    let suffix_len = MAX_USERNAME_LEN.saturating_sub(base_len).max(MIN_SUFFIX_LEN);
    let keep = MAX_USERNAME_LEN - suffix_len;

    let mut name: String = base.chars().take(keep).collect();
    name.extend(
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(suffix_len)
            .map(char::from),
    );
    name
}
