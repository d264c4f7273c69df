//! Auth API endpoints
//!
//! - POST /auth/signup - Create an account (form), start a session
//! - POST /auth/login - Password login (form), start a session
//! - GET /logout - Clear the session
//! - GET /auth/oauth/{provider}?mode= - Redirect to the identity provider
//! - GET /auth/oauth/{provider}/callback?code=&mode= - Finish federation
//! - GET /auth/verify - Mail a verification link (gated)
//! - GET /auth/verify/{token} - Complete verification
//! - GET /user/ - Current account (gated)

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Form, Json, Router,
    extract::{FromRef, Path, Query, State},
    http::{StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::Key;
use serde::{Deserialize, Serialize};

use crate::core::auth::error::AuthError;
use crate::core::auth::jwt::JwtService;
use crate::core::auth::middleware::{AuthenticatedUser, require_auth};
use crate::core::auth::oauth::{FederationService, IdentityProvider, OAuthMode};
use crate::core::auth::service::{AuthService, LoginRequest, SignupRequest};
use crate::core::auth::session::Session;
use crate::core::db::AccountResponse;

/// Landing page after a password signup
const SIGNUP_REDIRECT: &str = "/auth/verify?signup=true";

/// Landing page after a password login
const LOGIN_REDIRECT: &str = "/feed";

/// Shared state for the auth routes
#[derive(Clone)]
pub struct AuthApiState {
    pub auth: AuthService,
    pub federation: FederationService,
    pub tokens: JwtService,
    pub cookie_key: Key,
    providers: Arc<HashMap<String, Arc<dyn IdentityProvider>>>,
}

impl AuthApiState {
    pub fn new(
        auth: AuthService,
        federation: FederationService,
        tokens: JwtService,
        cookie_key: Key,
    ) -> Self {
        Self {
            auth,
            federation,
            tokens,
            cookie_key,
            providers: Arc::new(HashMap::new()),
        }
    }

    /// Register an identity provider under its route name
    pub fn with_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        Arc::make_mut(&mut self.providers).insert(provider.name().to_string(), provider);
        self
    }

    pub fn has_provider(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    fn provider(&self, name: &str) -> Result<Arc<dyn IdentityProvider>, AuthError> {
        self.providers
            .get(name)
            .cloned()
            .ok_or(AuthError::ProviderNotFound)
    }
}

impl FromRef<AuthApiState> for Key {
    fn from_ref(state: &AuthApiState) -> Self {
        state.cookie_key.clone()
    }
}

impl FromRef<AuthApiState> for JwtService {
    fn from_ref(state: &AuthApiState) -> Self {
        state.tokens.clone()
    }
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

impl ApiError {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }
}

impl AuthError {
    /// HTTP status and stable machine code
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AuthError::CredentialMismatch => (StatusCode::UNAUTHORIZED, "CREDENTIAL_MISMATCH"),
            AuthError::DuplicateUsername => (StatusCode::FORBIDDEN, "USERNAME_EXISTS"),
            AuthError::DuplicateEmail => (StatusCode::FORBIDDEN, "EMAIL_EXISTS"),
            AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "TOKEN_EXPIRED"),
            AuthError::TokenMalformed => (StatusCode::UNAUTHORIZED, "TOKEN_MALFORMED"),
            AuthError::TokenInvalidSignature => (StatusCode::UNAUTHORIZED, "TOKEN_INVALID"),
            AuthError::ExternalAuthFailure => (StatusCode::BAD_REQUEST, "EXTERNAL_AUTH_FAILED"),
            AuthError::AccountNotFound => (StatusCode::UNAUTHORIZED, "ACCOUNT_NOT_FOUND"),
            AuthError::AccountAlreadyExists => (StatusCode::FORBIDDEN, "ACCOUNT_EXISTS"),
            AuthError::VerificationTokenNotFound => {
                (StatusCode::NOT_FOUND, "VERIFICATION_TOKEN_NOT_FOUND")
            }
            AuthError::Unauthenticated => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
            AuthError::InvalidUsername => (StatusCode::BAD_REQUEST, "INVALID_USERNAME"),
            AuthError::InvalidEmail => (StatusCode::BAD_REQUEST, "INVALID_EMAIL"),
            AuthError::InvalidPassword => (StatusCode::BAD_REQUEST, "INVALID_PASSWORD"),
            AuthError::NoEmailOnFile => (StatusCode::BAD_REQUEST, "NO_EMAIL_ON_FILE"),
            AuthError::AlreadyVerified => (StatusCode::CONFLICT, "ALREADY_VERIFIED"),
            AuthError::ProviderNotFound => (StatusCode::NOT_FOUND, "PROVIDER_NOT_FOUND"),
            AuthError::InternalError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

/// Convert AuthError to API response
impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if status.is_server_error() {
            tracing::error!(code, "Request failed: {}", self);
        } else {
            tracing::warn!(code, "Request rejected: {}", self);
        }

        let body = ApiError::new(self.public_message(), code);

        (status, Json(body)).into_response()
    }
}

/// Generic message response
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ModeQuery {
    pub mode: OAuthMode,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: String,
    pub mode: OAuthMode,
}

/// Create the auth API router
pub fn auth_api_router(state: AuthApiState) -> Router {
    let gated = Router::new()
        .route("/auth/verify", get(send_verification_handler))
        .route("/user/", get(me_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/auth/signup", post(signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/logout", get(logout_handler))
        .route("/auth/oauth/{provider}", get(oauth_start_handler))
        .route(
            "/auth/oauth/{provider}/callback",
            get(oauth_callback_handler),
        )
        .route("/auth/verify/{token}", get(verify_handler))
        .merge(gated)
        .fallback(not_found_handler)
        .with_state(state)
}

/// 302 Found to `target`
fn found(target: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, target.to_string())]).into_response()
}

/// POST /auth/signup
async fn signup_handler(
    State(state): State<AuthApiState>,
    mut session: Session,
    Form(request): Form<SignupRequest>,
) -> Result<(PrivateCookieJar, Response), AuthError> {
    tracing::info!("Signup attempt for username: {}", request.username);

    let created = state.auth.signup(request).await?;
    session.establish(created.account.id, created.token);

    Ok((session.save(), found(SIGNUP_REDIRECT)))
}

/// POST /auth/login
async fn login_handler(
    State(state): State<AuthApiState>,
    mut session: Session,
    Form(request): Form<LoginRequest>,
) -> Result<(PrivateCookieJar, Response), AuthError> {
    tracing::info!("Login attempt for username: {}", request.username);

    let logged_in = state.auth.login(request).await?;
    session.establish(logged_in.account.id, logged_in.token);

    Ok((session.save(), found(LOGIN_REDIRECT)))
}

/// GET /logout
///
/// Only the client copy of the token is dropped; tokens are stateless.
async fn logout_handler(
    mut session: Session,
) -> Result<(PrivateCookieJar, Json<MessageResponse>), AuthError> {
    let Some(account_id) = session.user_id() else {
        return Err(AuthError::Unauthenticated);
    };

    session.clear();
    tracing::info!("Logout for account {}", account_id);

    Ok((
        session.save(),
        Json(MessageResponse::new("Logged out successfully")),
    ))
}

/// GET /auth/oauth/{provider}
async fn oauth_start_handler(
    State(state): State<AuthApiState>,
    Path(provider): Path<String>,
    Query(query): Query<ModeQuery>,
) -> Result<Response, AuthError> {
    let provider = state.provider(&provider)?;
    let url = provider.authorize_url(query.mode)?;

    Ok(found(&url))
}

/// GET /auth/oauth/{provider}/callback
async fn oauth_callback_handler(
    State(state): State<AuthApiState>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
    mut session: Session,
) -> Result<(PrivateCookieJar, Response), AuthError> {
    let provider = state.provider(&provider)?;

    let federated = state
        .federation
        .authenticate(provider.as_ref(), &query.code, query.mode)
        .await?;

    let target = federated.redirect_target(query.mode);
    session.establish(federated.account.id, federated.token);

    Ok((session.save(), found(target)))
}

/// GET /auth/verify
async fn send_verification_handler(
    State(state): State<AuthApiState>,
    user: AuthenticatedUser,
) -> Result<Json<MessageResponse>, AuthError> {
    state.auth.send_verification(user.account_id).await?;

    Ok(Json(MessageResponse::new("Verification email sent")))
}

/// GET /auth/verify/{token}
async fn verify_handler(
    State(state): State<AuthApiState>,
    Path(token): Path<String>,
) -> Result<Json<AccountResponse>, AuthError> {
    let account = state.auth.complete_verification(&token).await?;

    Ok(Json(account.into()))
}

/// GET /user/
async fn me_handler(
    State(state): State<AuthApiState>,
    user: AuthenticatedUser,
) -> Result<Json<AccountResponse>, AuthError> {
    let account = state.auth.current_account(user.account_id).await?;

    Ok(Json(account.into()))
}

async fn not_found_handler() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ApiError::new("Not found", "NOT_FOUND")),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_serialization() {
        let error = ApiError::new("Something went wrong", "ERROR_CODE");
        let json = serde_json::to_string(&error).unwrap();

        assert!(json.contains("Something went wrong"));
        assert!(json.contains("ERROR_CODE"));
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AuthError::CredentialMismatch, StatusCode::UNAUTHORIZED),
            (AuthError::DuplicateUsername, StatusCode::FORBIDDEN),
            (AuthError::DuplicateEmail, StatusCode::FORBIDDEN),
            (AuthError::TokenExpired, StatusCode::UNAUTHORIZED),
            (AuthError::TokenMalformed, StatusCode::UNAUTHORIZED),
            (AuthError::TokenInvalidSignature, StatusCode::UNAUTHORIZED),
            (AuthError::ExternalAuthFailure, StatusCode::BAD_REQUEST),
            (AuthError::AccountNotFound, StatusCode::UNAUTHORIZED),
            (AuthError::AccountAlreadyExists, StatusCode::FORBIDDEN),
            (AuthError::VerificationTokenNotFound, StatusCode::NOT_FOUND),
            (AuthError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (AuthError::InvalidUsername, StatusCode::BAD_REQUEST),
            (AuthError::AlreadyVerified, StatusCode::CONFLICT),
            (AuthError::ProviderNotFound, StatusCode::NOT_FOUND),
            (
                AuthError::InternalError("db down".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.status_and_code().0, expected, "{:?}", err);
        }
    }

    #[test]
    fn test_error_response_status() {
        let response = AuthError::DuplicateUsername.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = AuthError::InternalError("secret detail".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_found_redirect() {
        let response = found("/feed");

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/feed");
    }

    #[test]
    fn test_message_response_serialization() {
        let json = serde_json::to_string(&MessageResponse::new("Logged out successfully")).unwrap();
        assert_eq!(json, r#"{"message":"Logged out successfully"}"#);
    }

    #[test]
    fn test_callback_query_deserialization() {
        let query: CallbackQuery = serde_json::from_str(r#"{"code":"abc","mode":"login"}"#).unwrap();

        assert_eq!(query.code, "abc");
        assert_eq!(query.mode, OAuthMode::Login);
    }
}
