//! Application assembly: stores, services, router

use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::core::auth::{
    AuthApiState, AuthService, DiscordProvider, FederationService, JwtService, LogMailer, Mailer,
    VerificationService, auth_api_router,
};
use crate::core::config::{Config, ConfigError};
use crate::core::db::{
    AccountStore, DbError, MemoryAccountStore, MemoryVerificationStore, PgAccountRepository,
    PgVerificationRepository, VerificationStore, connect,
};

/// Errors that abort startup
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage backends behind the identity core
#[derive(Clone)]
pub struct Stores {
    pub accounts: Arc<dyn AccountStore>,
    pub verification: Arc<dyn VerificationStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            accounts: Arc::new(MemoryAccountStore::new()),
            verification: Arc::new(MemoryVerificationStore::new()),
        }
    }
}

/// Connect to PostgreSQL (running migrations) or fall back to memory
pub async fn init_stores(config: &Config) -> Result<Stores, DbError> {
    let Some(db_config) = config.db_config() else {
        tracing::warn!("DATABASE_URL not set, accounts are kept in memory only");
        return Ok(Stores::in_memory());
    };

    let pool = connect(&db_config).await?;

    Ok(Stores {
        accounts: Arc::new(PgAccountRepository::new(pool.clone())),
        verification: Arc::new(PgVerificationRepository::new(pool)),
    })
}

/// Wire services together
pub fn build_state(config: &Config, stores: Stores, mailer: Arc<dyn Mailer>) -> AuthApiState {
    let tokens = JwtService::new(config.jwt_config());
    let verification = VerificationService::new(stores.verification, config.verification_ttl_hours);
    let auth = AuthService::new(
        stores.accounts.clone(),
        tokens.clone(),
        verification,
        mailer,
        config.public_url.clone(),
    );
    let federation = FederationService::new(stores.accounts, tokens.clone());

    let mut state = AuthApiState::new(auth, federation, tokens, config.cookie_key());
    if let Some(discord) = &config.discord {
        state = state.with_provider(Arc::new(DiscordProvider::new(discord.clone())));
    }
    state
}

pub fn build_router(state: AuthApiState) -> Router {
    auth_api_router(state).layer(TraceLayer::new_for_http())
}

/// Run the server until it stops
pub async fn run(config: Config) -> Result<(), StartupError> {
    let stores = init_stores(&config).await?;
    let state = build_state(&config, stores, Arc::new(LogMailer));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.app_addr).await?;
    tracing::info!("listening on http://{}", config.app_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
