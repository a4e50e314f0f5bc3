//! Rafa - prepares the marketplace database

use anyhow::Result;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rafa::{config::Config, db, query::RelationshipRegistry};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first so it can supply the log filter
    let config = Config::load_with_env(Path::new("config.yml"))?;

    // Initialize tracing, RUST_LOG wins over the configured filter
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log.filter))?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Rafa...");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    pool.ping().await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    let applied = db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed ({} applied)", applied);

    // Check every registered relationship against the live schema
    let registry = RelationshipRegistry::standard()?;
    registry.verify_schema(&pool).await?;
    tracing::info!(
        "Relationship registry verified: {} foreign keys",
        registry.foreign_keys().len()
    );

    tracing::info!(
        "Ready (page size {}, max {})",
        config.pagination.default_limit,
        config.pagination.max_limit
    );

    pool.close().await;
    Ok(())
}
