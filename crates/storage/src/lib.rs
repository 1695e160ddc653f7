//! Storage layer for the hifz backend.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

pub mod ayah_repository;
pub mod daily_session_repository;
pub mod error;
pub mod event_repository;
pub mod fluency_repository;
pub mod item_state_repository;
pub mod session_repository;
pub mod transition_repository;
pub mod user_repository;

pub use ayah_repository::AyahRepository;
pub use daily_session_repository::{DailySessionRepository, LifetimeTotals};
pub use error::StorageError;
pub use event_repository::{EventRepository, IngestOutcome, SessionReviewTotals};
pub use fluency_repository::FluencyRepository;
pub use item_state_repository::{ItemStateRepository, ReviewCountTotals};
pub use session_repository::SessionRepository;
pub use transition_repository::TransitionRepository;
pub use user_repository::UserRepository;

/// Create a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool, StorageError> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .map_err(StorageError::Connection)
}

/// Run database migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), StorageError> {
    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(StorageError::Migration)
}

/// Check database connectivity.
pub async fn check_connection(pool: &PgPool) -> Result<(), StorageError> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(StorageError::Query)?;
    Ok(())
}
