//! End-to-end tests driving the full router with in-memory stores

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use serde_json::Value;
use tower::ServiceExt;

use crate::app::{Stores, build_router, build_state};
use crate::core::auth::RemoteProfile;
use crate::core::auth::mailer::testing::RecordingMailer;
use crate::core::auth::oauth::testing::{ScriptedProvider, profile};
use crate::core::config::Config;
use crate::core::db::{AccountStore, NewAccount};

struct TestApp {
    router: Router,
    mailer: Arc<RecordingMailer>,
    stores: Stores,
    cookie: Option<String>,
}

impl TestApp {
    fn new() -> Self {
        Self::with_remote(profile("nelly", Some("nelly@discord.com"), true))
    }

    fn with_remote(remote: RemoteProfile) -> Self {
        let vars: HashMap<&str, &str> = [
            ("JWT_SECRET", "end-to-end-jwt-secret"),
            ("SESSION_SECRET", "end-to-end-session-secret-of-32-bytes"),
        ]
        .into_iter()
        .collect();
        let config = Config::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();

        let stores = Stores::in_memory();
        let mailer = Arc::new(RecordingMailer::default());
        let state = build_state(&config, stores.clone(), mailer.clone())
            .with_provider(Arc::new(ScriptedProvider::new(remote)));

        Self {
            router: build_router(state),
            mailer,
            stores,
            cookie: None,
        }
    }

    /// Send a request, carrying the session cookie like a browser would
    async fn send(&mut self, method: &str, uri: &str, form: Option<&str>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }

        let body = match form {
            Some(form) => {
                builder = builder.header(
                    header::CONTENT_TYPE,
                    "application/x-www-form-urlencoded",
                );
                Body::from(form.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        if let Some(set_cookie) = response.headers().get(header::SET_COOKIE) {
            let set_cookie = set_cookie.to_str().unwrap();
            let pair = set_cookie.split(';').next().unwrap().trim().to_string();
            let expired = set_cookie.contains("Max-Age=0") || pair.ends_with('=');
            self.cookie = if expired { None } else { Some(pair) };
        }

        response
    }

    async fn get(&mut self, uri: &str) -> Response {
        self.send("GET", uri, None).await
    }

    async fn post_form(&mut self, uri: &str, form: &str) -> Response {
        self.send("POST", uri, Some(form)).await
    }
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ========================================================================
// Password Flow
// ========================================================================

#[tokio::test]
async fn test_signup_verify_login_scenario() {
    let mut app = TestApp::new();

    let response = app
        .post_form(
            "/auth/signup",
            "username=bob&email=bob%40x.com&password=pw123",
        )
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/auth/verify?signup=true");
    assert!(app.cookie.is_some());

    let account = app
        .stores
        .accounts
        .find_by_username("bob")
        .await
        .unwrap()
        .unwrap();
    assert!(!account.verified);

    let response = app.get("/auth/verify?signup=true").await;
    assert_eq!(response.status(), StatusCode::OK);
    let token = app.mailer.last_token().unwrap();

    let response = app.get(&format!("/auth/verify/{}", token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["username"], "bob");
    assert_eq!(body["verified"], true);
    assert!(body.get("password_hash").is_none());

    let response = app.get(&format!("/auth/verify/{}", token)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.get("/logout").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(app.cookie.is_none());

    let response = app
        .post_form("/auth/login", "username=bob&password=pw123")
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/feed");

    let response = app
        .post_form("/auth/login", "username=bob&password=wrong")
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["code"], "CREDENTIAL_MISMATCH");
}

#[tokio::test]
async fn test_duplicate_username_rejected() {
    let mut app = TestApp::new();

    let first = app
        .post_form("/auth/signup", "username=alice&password=pw123")
        .await;
    assert_eq!(first.status(), StatusCode::FOUND);

    let second = app
        .post_form("/auth/signup", "username=alice&email=&password=other")
        .await;
    assert_eq!(second.status(), StatusCode::FORBIDDEN);
    let body = json_body(second).await;
    assert_eq!(body["code"], "USERNAME_EXISTS");
}

#[tokio::test]
async fn test_send_verification_twice_keeps_latest_token() {
    let mut app = TestApp::new();
    app.post_form(
        "/auth/signup",
        "username=carl&email=carl%40x.com&password=pw123",
    )
    .await;

    app.get("/auth/verify").await;
    let first = app.mailer.last_token().unwrap();
    app.get("/auth/verify").await;
    let second = app.mailer.last_token().unwrap();

    assert_ne!(first, second);
    assert_eq!(
        app.get(&format!("/auth/verify/{}", first)).await.status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        app.get(&format!("/auth/verify/{}", second)).await.status(),
        StatusCode::OK
    );
}

// ========================================================================
// Auth Gate
// ========================================================================

#[tokio::test]
async fn test_gate_rejects_anonymous() {
    let mut app = TestApp::new();

    let response = app.get("/user/").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["code"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn test_logout_then_gate_rejects() {
    let mut app = TestApp::new();
    app.post_form("/auth/signup", "username=dora&password=pw123")
        .await;

    let response = app.get("/user/").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["username"], "dora");

    let response = app.get("/logout").await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.get("/user/").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_without_session() {
    let mut app = TestApp::new();

    let response = app.get("/logout").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_gate_rejects_forged_cookie() {
    let mut app = TestApp::new();
    app.cookie = Some("socialecho_session=forged-value".to_string());

    assert_eq!(app.get("/user/").await.status(), StatusCode::UNAUTHORIZED);
}

// ========================================================================
// Federation
// ========================================================================

#[tokio::test]
async fn test_oauth_start_redirects_to_provider() {
    let mut app = TestApp::new();

    let response = app.get("/auth/oauth/scripted?mode=signup").await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        location(&response),
        "https://idp.example/authorize?mode=signup"
    );

    let response = app.get("/auth/oauth/unknown?mode=login").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_oauth_signup_then_login() {
    let mut app = TestApp::new();

    let response = app
        .get("/auth/oauth/scripted/callback?code=c1&mode=signup")
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/user/");

    let account = app
        .stores
        .accounts
        .find_by_email("nelly@discord.com")
        .await
        .unwrap()
        .unwrap();
    assert!(account.verified);
    assert!(
        app.stores
            .accounts
            .is_oauth_linked(account.id)
            .await
            .unwrap()
    );

    let body = json_body(app.get("/user/").await).await;
    assert_eq!(body["id"], account.id.to_string());

    let response = app
        .get("/auth/oauth/scripted/callback?code=c2&mode=signup")
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .get("/auth/oauth/scripted/callback?code=c3&mode=login")
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/feed");
}

#[tokio::test]
async fn test_oauth_login_unknown_email() {
    let mut app = TestApp::new();

    let response = app
        .get("/auth/oauth/scripted/callback?code=c1&mode=login")
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(app.cookie.is_none());
    assert!(
        app.stores
            .accounts
            .find_by_email("nelly@discord.com")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_oauth_unverified_signup_goes_to_verification() {
    let mut app = TestApp::with_remote(profile("otto", Some("otto@x.com"), false));

    let response = app
        .get("/auth/oauth/scripted/callback?code=c1&mode=signup")
        .await;
    assert_eq!(location(&response), "/auth/verify?signup=true");

    let response = app.get("/auth/verify").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.mailer.sent()[0].to_email, "otto@x.com");
}

#[tokio::test]
async fn test_oauth_account_cannot_password_login() {
    let mut app = TestApp::new();
    app.get("/auth/oauth/scripted/callback?code=c1&mode=signup")
        .await;
    app.cookie = None;

    let response = app
        .post_form("/auth/login", "username=nelly&password=anything")
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_oauth_username_collision() {
    let mut app = TestApp::new();
    app.stores
        .accounts
        .create_account(NewAccount {
            username: "nelly".to_string(),
            email: None,
            password_hash: "hash".to_string(),
            verified: false,
            avatar_url: None,
        })
        .await
        .unwrap();

    app.get("/auth/oauth/scripted/callback?code=c1&mode=signup")
        .await;

    let account = app
        .stores
        .accounts
        .find_by_email("nelly@discord.com")
        .await
        .unwrap()
        .unwrap();
    assert_ne!(account.username, "nelly");
    assert!(account.username.starts_with("nelly"));
}

// ========================================================================
// Misc
// ========================================================================

#[tokio::test]
async fn test_session_cookie_is_opaque() {
    let mut app = TestApp::new();
    app.post_form("/auth/signup", "username=pia&password=pw123")
        .await;

    let account = app
        .stores
        .accounts
        .find_by_username("pia")
        .await
        .unwrap()
        .unwrap();
    let cookie = app.cookie.clone().unwrap();

    assert!(cookie.starts_with("socialecho_session="));
    assert!(!cookie.contains("authorization_token"));
    assert!(!cookie.contains(&account.id.to_string()));
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let mut app = TestApp::new();

    let response = app.get("/nowhere").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["code"], "NOT_FOUND");
}
