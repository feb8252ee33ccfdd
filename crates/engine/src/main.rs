//! `promptline` maintenance binary.
//!
//! Connects to the configured database, verifies it is reachable, and applies
//! pending migrations. `promptline check` skips the migrations.

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use promptline_engine::store::{ComponentStore, PgStore};
use promptline_engine::EngineConfig;

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "promptline_engine=info,promptline_db=info".into());
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    // --- Configuration ---
    let config = EngineConfig::from_env().context("Invalid configuration")?;
    let database_url = config.require_database_url()?;
    tracing::info!(
        max_connections = config.db_max_connections,
        cache_ttl_secs = config.cache_ttl.as_secs(),
        store_timeout_secs = config.store_timeout.as_secs(),
        "Loaded engine configuration"
    );

    // --- Database ---
    let pool = promptline_db::create_pool(database_url, config.db_max_connections)
        .await
        .context("Failed to connect to database")?;
    promptline_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    tracing::info!("Database connection established");

    let check_only = std::env::args().nth(1).as_deref() == Some("check");
    if !check_only {
        promptline_db::run_migrations(&pool)
            .await
            .context("Failed to run database migrations")?;
    }

    let store = PgStore::new(pool);
    let components = store.list_active_components().await?;
    tracing::info!(active_components = components.len(), "Store ready");

    Ok(())
}
