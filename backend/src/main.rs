use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agenda_backend::{
    app::build_router,
    config::Config,
    db::connection::{create_pool, DbPool},
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agenda_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!(
        database_url = %config.masked_database_url(),
        token_size_in_bytes = config.token_size_in_bytes,
        token_ttl_seconds = config.token_ttl_seconds,
        token_rolling_ttl_seconds = config.token_rolling_ttl_seconds,
        refresh_token_ttl_days = config.refresh_token_ttl_days,
        max_tokens_per_user = config.max_tokens_per_user,
        "Loaded configuration from environment/.env"
    );

    let pool: DbPool = create_pool(&config.database_url, config.database_max_connections).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let addr: SocketAddr = config.server_addr.parse()?;
    let state = AppState::postgres(pool, config)?;
    let app = build_router(state);

    tracing::info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
