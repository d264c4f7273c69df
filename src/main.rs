use socialecho::app;
use socialecho::core::config::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Load .env file (if exists)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("socialecho=info,tower_http=info")),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };

    // Log config status (without revealing secrets)
    tracing::info!(
        "Config loaded: database={}, discord={}, token_validity_hours={}",
        config.has_database(),
        config.has_discord(),
        config.token_validity_hours
    );

    if let Err(e) = app::run(config).await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}
