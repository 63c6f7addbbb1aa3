use chrono::Utc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agenda_backend::{
    config::Config,
    db::connection::create_pool,
    repositories::{PgSessionStore, SessionStore},
    services::AuthPolicy,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "token_cleanup=info,agenda_backend=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    let pool = create_pool(&config.database_url, 1).await?;
    let store = PgSessionStore::new(pool.clone(), AuthPolicy::new(config.auth_policy()?));

    let deleted_sessions = store.cleanup_expired(Utc::now()).await?;
    if deleted_sessions > 0 {
        tracing::info!("Deleted {} expired sessions", deleted_sessions);
    }

    for table in ["access_tokens", "refresh_tokens", "sessions"] {
        sqlx::query(&format!("VACUUM (ANALYZE) {}", table))
            .execute(&pool)
            .await?;
    }

    Ok(())
}
