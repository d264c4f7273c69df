//! Identity and session subsystem for SocialEcho
//!
//! This module provides:
//! - Password hashing and bearer token issuance/validation
//! - Cookie-backed sessions
//! - Email verification tokens
//! - OAuth federation (match-or-create) with a Discord provider
//! - The auth gate middleware and the HTTP endpoints

pub mod api;
pub mod discord;
pub mod error;
pub mod jwt;
pub mod mailer;
pub mod middleware;
pub mod oauth;
pub mod password;
pub mod service;
pub mod session;
pub mod verification;

pub use api::{ApiError, AuthApiState, auth_api_router};
pub use discord::{DiscordConfig, DiscordProvider};
pub use error::AuthError;
pub use jwt::{Claims, JwtConfig, JwtError, JwtService};
pub use mailer::{LogMailer, Mailer, MailerError, VerificationEmail};
pub use middleware::{AuthenticatedUser, authenticate, require_auth};
pub use oauth::{
    FederatedSession, FederationService, IdentityProvider, OAuthMode, ProviderError,
    RemoteProfile,
};
pub use service::{AuthService, AuthSession, LoginRequest, SignupRequest};
pub use session::{SESSION_COOKIE_NAME, Session, SessionKey, cookie_key};
pub use verification::VerificationService;
