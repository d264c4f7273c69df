//! Password signup/login and email verification
//!
//! Federated logins live in [`super::oauth`]; this service covers accounts
//! that authenticate with a local password.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::auth::error::AuthError;
use crate::core::auth::jwt::JwtService;
use crate::core::auth::mailer::{Mailer, VerificationEmail};
use crate::core::auth::oauth::MAX_USERNAME_LEN;
use crate::core::auth::password::{MAX_PASSWORD_BYTES, hash_password, verify_password};
use crate::core::auth::verification::VerificationService;
use crate::core::db::{Account, AccountStore, NewAccount};

/// Shortest accepted username
const MIN_USERNAME_LEN: usize = 3;

/// Signup form
#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub password: String,
}

/// Login form
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Account plus the bearer token minted for it
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub account: Account,
    pub token: String,
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    accounts: Arc<dyn AccountStore>,
    tokens: JwtService,
    verification: VerificationService,
    mailer: Arc<dyn Mailer>,
    public_url: String,
}

impl AuthService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        tokens: JwtService,
        verification: VerificationService,
        mailer: Arc<dyn Mailer>,
        public_url: impl Into<String>,
    ) -> Self {
        Self {
            accounts,
            tokens,
            verification,
            mailer,
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Validate email format
    fn validate_email(email: &str) -> Result<(), AuthError> {
        let Some((local, domain)) = email.split_once('@') else {
            return Err(AuthError::InvalidEmail);
        };

        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(AuthError::InvalidEmail);
        }

        // something@something.something
        if !domain.contains('.') || domain.split('.').any(|p| p.is_empty()) {
            return Err(AuthError::InvalidEmail);
        }

        Ok(())
    }

    /// Validate username format
    fn validate_username(username: &str) -> Result<(), AuthError> {
        let len = username.chars().count();
        if !(MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&len) {
            return Err(AuthError::InvalidUsername);
        }

        if !username
            .chars()
            .next()
            .map(|c| c.is_alphabetic())
            .unwrap_or(false)
        {
            return Err(AuthError::InvalidUsername);
        }

        if !username
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        {
            return Err(AuthError::InvalidUsername);
        }

        Ok(())
    }

    /// bcrypt ignores bytes past 72, so longer passwords are refused outright
    fn validate_password(password: &str) -> Result<(), AuthError> {
        if password.is_empty() || password.len() > MAX_PASSWORD_BYTES {
            return Err(AuthError::InvalidPassword);
        }
        Ok(())
    }

    /// Register a new, unverified account
    pub async fn signup(&self, request: SignupRequest) -> Result<AuthSession, AuthError> {
        let username = request.username.trim().to_string();
        let email = request
            .email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());

        Self::validate_username(&username)?;
        if let Some(email) = &email {
            Self::validate_email(email)?;
        }
        Self::validate_password(&request.password)?;

        if self.accounts.find_by_username(&username).await?.is_some() {
            warn!("Signup rejected: username {} taken", username);
            return Err(AuthError::DuplicateUsername);
        }

        if let Some(email) = &email
            && self.accounts.find_by_email(email).await?.is_some()
        {
            warn!("Signup rejected: email already registered");
            return Err(AuthError::DuplicateEmail);
        }

        let account = self
            .accounts
            .create_account(NewAccount {
                username,
                email,
                password_hash: hash_password(&request.password)?,
                verified: false,
                avatar_url: None,
            })
            .await?;

        let (token, _) = self.tokens.issue(account.id)?;
        info!("Account created: {} ({})", account.username, account.id);

        Ok(AuthSession { account, token })
    }

    /// Log in with username and password
    pub async fn login(&self, request: LoginRequest) -> Result<AuthSession, AuthError> {
        let Some(account) = self
            .accounts
            .find_by_username(request.username.trim())
            .await?
        else {
            warn!("Login failed: unknown username");
            return Err(AuthError::CredentialMismatch);
        };

        if self.accounts.is_oauth_linked(account.id).await? {
            warn!("Login failed: account {} is federated", account.id);
            return Err(AuthError::CredentialMismatch);
        }

        if !verify_password(&request.password, &account.password_hash) {
            warn!("Login failed: wrong password for account {}", account.id);
            return Err(AuthError::CredentialMismatch);
        }

        let (token, _) = self.tokens.issue(account.id)?;
        info!("Login: {} ({})", account.username, account.id);

        Ok(AuthSession { account, token })
    }

    /// Issue a verification token and mail the link
    pub async fn send_verification(&self, account_id: Uuid) -> Result<(), AuthError> {
        let account = self.current_account(account_id).await?;

        if account.verified {
            return Err(AuthError::AlreadyVerified);
        }

        let Some(to_email) = account.email.clone() else {
            return Err(AuthError::NoEmailOnFile);
        };

        let token = self.verification.create(account.id).await?;
        let message = VerificationEmail {
            to_email,
            username: account.username,
            link: format!("{}/auth/verify/{}", self.public_url, token),
        };

        self.mailer.send(&message)?;
        info!("Verification email sent for account {}", account.id);

        Ok(())
    }

    /// Consume a verification token and mark its account verified
    pub async fn complete_verification(&self, token: &str) -> Result<Account, AuthError> {
        let account_id = self.verification.resolve(token).await?;

        self.accounts.mark_verified(account_id).await?;
        self.verification.consume(token).await?;
        info!("Account verified: {}", account_id);

        self.current_account(account_id).await
    }

    pub async fn current_account(&self, account_id: Uuid) -> Result<Account, AuthError> {
        self.accounts
            .find_by_id(account_id)
            .await?
            .ok_or(AuthError::AccountNotFound)
    }
}
