//! Fluency gate test repository.

use sqlx::PgPool;
use uuid::Uuid;

use hifz_backend_domain::FluencyGateTest;
use hifz_backend_domain::fluency::FluencyTestResult;

use crate::StorageError;

#[derive(Clone)]
pub struct FluencyRepository {
    pool: PgPool,
}

impl FluencyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        user_id: Uuid,
        test_page: i32,
    ) -> Result<FluencyGateTest, StorageError> {
        sqlx::query_as::<_, FluencyGateTest>(
            r#"
            INSERT INTO fluency_gate_tests (user_id, test_page)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(test_page)
        .fetch_one(&self.pool)
        .await
        .map_err(StorageError::Query)
    }

    pub async fn latest(&self, user_id: Uuid) -> Result<Option<FluencyGateTest>, StorageError> {
        sqlx::query_as::<_, FluencyGateTest>(
            r#"
            SELECT * FROM fluency_gate_tests
            WHERE user_id = $1
            ORDER BY started_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::Query)
    }

    /// Move an IN_PROGRESS test to its terminal status. Terminal tests are
    /// immutable: completing one again returns `None`.
    pub async fn complete(
        &self,
        id: Uuid,
        user_id: Uuid,
        result: &FluencyTestResult,
    ) -> Result<Option<FluencyGateTest>, StorageError> {
        sqlx::query_as::<_, FluencyGateTest>(
            r#"
            UPDATE fluency_gate_tests SET
                status = $3,
                duration_seconds = $4,
                error_count = $5,
                fluency_score = $6,
                completed_at = $7
            WHERE id = $1 AND user_id = $2 AND status = 'IN_PROGRESS'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(result.status)
        .bind(result.duration_seconds)
        .bind(result.error_count)
        .bind(result.fluency_score)
        .bind(result.completed_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::Query)
    }
}
