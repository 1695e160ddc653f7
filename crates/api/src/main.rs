//! Hifz Backend Server

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hifz_backend_api::{AppState, build_router};
use hifz_backend_config::AppConfig;
use hifz_backend_storage::{create_pool, run_migrations};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Hifz Backend Server...");

    // Load configuration
    let config = AppConfig::from_env()?;
    tracing::info!("Binding to {}", config.bind_address);

    // Create database pool
    let pool = create_pool(&config.database_url).await?;
    tracing::info!("Database connection pool created");

    // Run migrations
    run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let state = Arc::new(AppState::new(pool, config.clone()));
    let app = build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    tracing::info!("Server listening on {}", config.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
