//! Transition score reads.
//!
//! Writes ride the event-insert transaction in the event repository, so this
//! repository is read-only.

use sqlx::PgPool;
use uuid::Uuid;

use hifz_backend_domain::TransitionScore;

use crate::StorageError;

#[derive(Clone)]
pub struct TransitionRepository {
    pool: PgPool,
}

impl TransitionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn all_for_user(&self, user_id: Uuid) -> Result<Vec<TransitionScore>, StorageError> {
        sqlx::query_as::<_, TransitionScore>(
            r#"
            SELECT * FROM transition_scores
            WHERE user_id = $1
            ORDER BY from_ayah_id, to_ayah_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Query)
    }

    pub async fn get(
        &self,
        user_id: Uuid,
        from_ayah_id: i32,
        to_ayah_id: i32,
    ) -> Result<Option<TransitionScore>, StorageError> {
        sqlx::query_as::<_, TransitionScore>(
            r#"
            SELECT * FROM transition_scores
            WHERE user_id = $1 AND from_ayah_id = $2 AND to_ayah_id = $3
            "#,
        )
        .bind(user_id)
        .bind(from_ayah_id)
        .bind(to_ayah_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::Query)
    }
}
