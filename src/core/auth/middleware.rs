//! Auth gate for protected routes
//!
//! The gate reads the bearer token from the session, verifies it, and only
//! then lets the request through with an [`AuthenticatedUser`] attached.
//! Every failure produces the same rejection; the reason is only logged.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::core::auth::error::AuthError;
use crate::core::auth::jwt::JwtService;
use crate::core::auth::session::{Session, SessionKey};

/// Identity admitted by the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub account_id: Uuid,
}

/// Resolve the session to an account id
pub fn authenticate(session: &Session, tokens: &JwtService) -> Result<Uuid, AuthError> {
    let Some(token) = session.get(SessionKey::AuthorizationToken) else {
        debug!("No authorization token in session");
        return Err(AuthError::Unauthenticated);
    };

    let account_id = tokens.verify(token).map_err(|e| {
        warn!("Rejected session token: {}", e);
        AuthError::Unauthenticated
    })?;

    if let Some(user_id) = session.get(SessionKey::UserId)
        && user_id != account_id.to_string()
    {
        warn!(
            "Session user {} disagrees with token subject {}",
            user_id, account_id
        );
        return Err(AuthError::Unauthenticated);
    }

    Ok(account_id)
}

/// Middleware admitting only requests with a valid session token
pub async fn require_auth(
    State(tokens): State<JwtService>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(&session, &tokens) {
        Ok(account_id) => {
            debug!("Admitted account {}", account_id);
            request
                .extensions_mut()
                .insert(AuthenticatedUser { account_id });
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .copied()
            .ok_or(AuthError::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum_extra::extract::PrivateCookieJar;
    use chrono::{Duration, Utc};

    use crate::core::auth::jwt::JwtConfig;
    use crate::core::auth::session::cookie_key;

    fn tokens() -> JwtService {
        JwtService::new(JwtConfig::new("gate_test_secret"))
    }

    fn session() -> Session {
        Session::load(PrivateCookieJar::new(cookie_key("gate_test_session_secret")))
    }

    #[test]
    fn test_missing_token_rejected() {
        let result = authenticate(&session(), &tokens());
        assert!(matches!(result, Err(AuthError::Unauthenticated)));
    }

    #[test]
    fn test_valid_session_admitted() {
        let tokens = tokens();
        let account_id = Uuid::new_v4();
        let (token, _) = tokens.issue(account_id).unwrap();

        let mut session = session();
        session.establish(account_id, token);

        assert_eq!(authenticate(&session, &tokens).unwrap(), account_id);
    }

    #[test]
    fn test_token_without_user_id_admitted() {
        let tokens = tokens();
        let account_id = Uuid::new_v4();
        let (token, _) = tokens.issue(account_id).unwrap();

        let mut session = session();
        session.set(SessionKey::AuthorizationToken, token);

        assert_eq!(authenticate(&session, &tokens).unwrap(), account_id);
    }

    #[test]
    fn test_expired_token_rejected() {
        let tokens = tokens();
        let account_id = Uuid::new_v4();
        let (token, _) = tokens
            .issue_at(account_id, Utc::now() - Duration::days(2))
            .unwrap();

        let mut session = session();
        session.establish(account_id, token);

        assert!(matches!(
            authenticate(&session, &tokens),
            Err(AuthError::Unauthenticated)
        ));
    }

    #[test]
    fn test_garbage_token_rejected() {
        let mut session = session();
        session.set(SessionKey::AuthorizationToken, "not.a.token");

        assert!(matches!(
            authenticate(&session, &tokens()),
            Err(AuthError::Unauthenticated)
        ));
    }

    #[test]
    fn test_mismatched_user_id_rejected() {
        let tokens = tokens();
        let (token, _) = tokens.issue(Uuid::new_v4()).unwrap();

        let mut session = session();
        session.establish(Uuid::new_v4(), token);

        assert!(matches!(
            authenticate(&session, &tokens),
            Err(AuthError::Unauthenticated)
        ));
    }

    #[test]
    fn test_cleared_session_rejected() {
        let tokens = tokens();
        let account_id = Uuid::new_v4();
        let (token, _) = tokens.issue(account_id).unwrap();

        let mut session = session();
        session.establish(account_id, token);
        session.clear();

        assert!(matches!(
            authenticate(&session, &tokens),
            Err(AuthError::Unauthenticated)
        ));
    }
}
