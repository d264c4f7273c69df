//! Discord identity provider
//!
//! Authorization-code flow against the Discord REST API (v10):
//!
//! 1. The browser is sent to `https://discord.com/oauth2/authorize` with the
//!    `identify email` scopes and a redirect back to
//!    `{PUBLIC_URL}/auth/oauth/discord/callback?mode={mode}`.
//! 2. The callback code is exchanged at `/oauth2/token` (form POST). The
//!    redirect URI sent here must match step 1 exactly, mode included.
//! 3. `/users/@me` returns the profile; avatars live on the CDN under
//!    `avatars/{user id}/{avatar hash}`.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::core::auth::oauth::{IdentityProvider, OAuthMode, ProviderError, RemoteProfile};

const DISCORD_API_BASE: &str = "https://discord.com/api/v10";
const DISCORD_AUTHORIZE_URL: &str = "https://discord.com/oauth2/authorize";
const DISCORD_CDN_AVATARS: &str = "https://cdn.discordapp.com/avatars";
const DISCORD_SCOPES: &str = "identify email";

/// Discord application credentials
#[derive(Clone)]
pub struct DiscordConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Externally reachable base URL of this service
    pub public_url: String,
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("client_id", &self.client_id)
            .field("public_url", &self.public_url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Discord user from `/users/@me`
#[derive(Debug, Deserialize)]
struct DiscordUser {
    id: String,
    username: String,
    email: Option<String>,
    #[serde(default)]
    verified: bool,
    avatar: Option<String>,
}

impl From<DiscordUser> for RemoteProfile {
    fn from(user: DiscordUser) -> Self {
        RemoteProfile {
            provider_id: user.id,
            username: user.username,
            email: user.email,
            verified: user.verified,
            avatar: user.avatar,
        }
    }
}

pub struct DiscordProvider {
    client: Client,
    config: DiscordConfig,
}

impl DiscordProvider {
    pub fn new(config: DiscordConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn redirect_uri(&self, mode: OAuthMode) -> String {
        format!(
            "{}/auth/oauth/discord/callback?mode={}",
            self.config.public_url.trim_end_matches('/'),
            mode
        )
    }
}

#[async_trait]
impl IdentityProvider for DiscordProvider {
    fn name(&self) -> &'static str {
        "discord"
    }

    fn authorize_url(&self, mode: OAuthMode) -> Result<String, ProviderError> {
        let redirect_uri = self.redirect_uri(mode);
        let url = Url::parse_with_params(
            DISCORD_AUTHORIZE_URL,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", redirect_uri.as_str()),
                ("scope", DISCORD_SCOPES),
            ],
        )
        .map_err(|e| ProviderError::InvalidUrl(e.to_string()))?;

        Ok(url.to_string())
    }

    async fn exchange_code(&self, code: &str, mode: OAuthMode) -> Result<String, ProviderError> {
        let redirect_uri = self.redirect_uri(mode);
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri.as_str()),
        ];

        let response = self
            .client
            .post(format!("{}/oauth2/token", DISCORD_API_BASE))
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Exchange(format!(
                "token endpoint returned {}",
                status
            )));
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<RemoteProfile, ProviderError> {
        let response = self
            .client
            .get(format!("{}/users/@me", DISCORD_API_BASE))
            .bearer_auth(access_token)
            .send()
            .await?
            .error_for_status()?;

        let user: DiscordUser = response.json().await?;
        Ok(user.into())
    }

    fn avatar_url(&self, profile: &RemoteProfile) -> Option<String> {
        profile
            .avatar
            .as_ref()
            .map(|hash| format!("{}/{}/{}", DISCORD_CDN_AVATARS, profile.provider_id, hash))
    }
}
