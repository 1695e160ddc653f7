//! Storage errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection error: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),

    #[error("Query error: {0}")]
    Query(#[source] sqlx::Error),
}

impl StorageError {
    /// True when the underlying database error is a unique-key collision.
    /// Idempotent write paths convert these into no-op successes.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            StorageError::Query(sqlx::Error::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }
}

impl From<StorageError> for hifz_backend_domain::DomainError {
    fn from(err: StorageError) -> Self {
        hifz_backend_domain::DomainError::Database(err.to_string())
    }
}
