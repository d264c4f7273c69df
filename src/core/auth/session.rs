//! Cookie-backed session state
//!
//! The whole session lives client-side in a single private cookie (encrypted
//! and authenticated with the process cookie key). Mutations stay in memory
//! until [`Session::save`] hands back the jar that must be returned with the
//! response. The store never validates what it holds; the auth gate decides
//! whether the token and user id agree.
//!
//! Two parallel requests from the same browser each save their own copy, and
//! the last response wins.

use std::convert::Infallible;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::{Cookie, Key, SameSite};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use uuid::Uuid;

/// Name of the session cookie
pub const SESSION_COOKIE_NAME: &str = "socialecho_session";

/// Session cookie lifetime in days
const SESSION_MAX_AGE_DAYS: i64 = 30;

/// Derive the 64-byte cookie key from the configured session secret
pub fn cookie_key(secret: &str) -> Key {
    let digest = Sha512::digest(secret.as_bytes());
    Key::from(digest.as_slice())
}

/// Keys a session can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKey {
    AuthorizationToken,
    UserId,
    SearchQuery,
}

/// Serialized session contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl SessionData {
    fn slot(&mut self, key: SessionKey) -> &mut Option<String> {
        match key {
            SessionKey::AuthorizationToken => &mut self.authorization_token,
            SessionKey::UserId => &mut self.user_id,
            SessionKey::SearchQuery => &mut self.search,
        }
    }

    fn value(&self, key: SessionKey) -> Option<&str> {
        match key {
            SessionKey::AuthorizationToken => self.authorization_token.as_deref(),
            SessionKey::UserId => self.user_id.as_deref(),
            SessionKey::SearchQuery => self.search.as_deref(),
        }
    }
}

/// A request's session
pub struct Session {
    jar: PrivateCookieJar,
    data: SessionData,
    cleared: bool,
}

impl Session {
    /// Decode the session from the request's cookie jar
    ///
    /// A missing or undecodable cookie yields an empty session.
    pub fn load(jar: PrivateCookieJar) -> Self {
        let data = jar
            .get(SESSION_COOKIE_NAME)
            .and_then(|cookie| match serde_json::from_str(cookie.value()) {
                Ok(data) => Some(data),
                Err(e) => {
                    tracing::debug!("Discarding unreadable session cookie: {}", e);
                    None
                }
            })
            .unwrap_or_default();

        Self {
            jar,
            data,
            cleared: false,
        }
    }

    pub fn get(&self, key: SessionKey) -> Option<&str> {
        self.data.value(key)
    }

    pub fn set(&mut self, key: SessionKey, value: impl Into<String>) {
        *self.data.slot(key) = Some(value.into());
        self.cleared = false;
    }

    pub fn delete(&mut self, key: SessionKey) {
        *self.data.slot(key) = None;
    }

    /// Drop every key and expire the cookie on the next save
    pub fn clear(&mut self) {
        self.data = SessionData::default();
        self.cleared = true;
    }

    /// Record a freshly authenticated account
    pub fn establish(&mut self, account_id: Uuid, token: impl Into<String>) {
        self.set(SessionKey::AuthorizationToken, token);
        self.set(SessionKey::UserId, account_id.to_string());
    }

    /// Account id recorded at login, if it parses
    pub fn user_id(&self) -> Option<Uuid> {
        self.get(SessionKey::UserId)
            .and_then(|id| Uuid::parse_str(id).ok())
    }

    pub fn data(&self) -> &SessionData {
        &self.data
    }

    /// Commit pending mutations into the outgoing cookie jar
    pub fn save(self) -> PrivateCookieJar {
        if self.cleared {
            return self
                .jar
                .remove(Cookie::build(SESSION_COOKIE_NAME).path("/"));
        }

        let value = match serde_json::to_string(&self.data) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("Failed to serialize session: {}", e);
                return self.jar;
            }
        };

        let cookie = Cookie::build((SESSION_COOKIE_NAME, value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::days(SESSION_MAX_AGE_DAYS));

        self.jar.add(cookie)
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
    Key: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = PrivateCookieJar::<Key>::from_request_parts(parts, state).await?;
        Ok(Session::load(jar))
    }
}
