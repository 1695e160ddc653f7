//! Session run repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use hifz_backend_domain::{DailySession, QueueMode, SessionRun};

use crate::StorageError;

/// Session run repository.
#[derive(Clone)]
pub struct SessionRepository {
    pool: PgPool,
}

impl SessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a session. With a `client_session_id` the start is idempotent:
    /// a retry returns the originally created run untouched.
    pub async fn start(
        &self,
        user_id: Uuid,
        client_session_id: Option<Uuid>,
        mode: QueueMode,
        warmup_passed: bool,
    ) -> Result<SessionRun, StorageError> {
        match client_session_id {
            Some(client_id) => sqlx::query_as::<_, SessionRun>(
                r#"
                INSERT INTO session_runs (user_id, client_session_id, mode, warmup_passed)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (user_id, client_session_id) WHERE client_session_id IS NOT NULL
                    DO UPDATE SET user_id = EXCLUDED.user_id
                RETURNING *
                "#,
            )
            .bind(user_id)
            .bind(client_id)
            .bind(mode)
            .bind(warmup_passed)
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::Query),
            None => sqlx::query_as::<_, SessionRun>(
                r#"
                INSERT INTO session_runs (user_id, mode, warmup_passed)
                VALUES ($1, $2, $3)
                RETURNING *
                "#,
            )
            .bind(user_id)
            .bind(mode)
            .bind(warmup_passed)
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::Query),
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<SessionRun>, StorageError> {
        sqlx::query_as::<_, SessionRun>("SELECT * FROM session_runs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::Query)
    }

    /// Complete a session and upsert its daily aggregate in one transaction.
    ///
    /// The ACTIVE -> COMPLETED transition is a compare-and-set: a concurrent
    /// or repeated completion loses the race and gets `None`, leaving the
    /// winner's rollup untouched. On a `(user, session_date)` conflict the
    /// minutes and review counters accumulate and the rest is overwritten.
    pub async fn complete_with_rollup(
        &self,
        session_id: Uuid,
        ended_at: DateTime<Utc>,
        daily: &DailySession,
    ) -> Result<Option<DailySession>, StorageError> {
        let mut tx = self.pool.begin().await.map_err(StorageError::Query)?;

        let updated = sqlx::query(
            r#"
            UPDATE session_runs
            SET status = 'COMPLETED', ended_at = $2, minutes_total = $3
            WHERE id = $1 AND status = 'ACTIVE'
            "#,
        )
        .bind(session_id)
        .bind(ended_at)
        .bind(daily.minutes_total)
        .execute(&mut *tx)
        .await
        .map_err(StorageError::Query)?;

        if updated.rows_affected() == 0 {
            tx.rollback().await.map_err(StorageError::Query)?;
            return Ok(None);
        }

        let stored = sqlx::query_as::<_, DailySession>(
            r#"
            INSERT INTO daily_sessions (
                user_id, session_date, mode, retention_score, backlog_minutes_estimate,
                overdue_days_max, minutes_total, reviews_total, reviews_successful,
                new_ayahs_memorized, warmup_passed, sabaq_allowed
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (user_id, session_date) DO UPDATE SET
                mode = EXCLUDED.mode,
                retention_score = EXCLUDED.retention_score,
                backlog_minutes_estimate = EXCLUDED.backlog_minutes_estimate,
                overdue_days_max = EXCLUDED.overdue_days_max,
                minutes_total = daily_sessions.minutes_total + EXCLUDED.minutes_total,
                reviews_total = daily_sessions.reviews_total + EXCLUDED.reviews_total,
                reviews_successful = daily_sessions.reviews_successful + EXCLUDED.reviews_successful,
                new_ayahs_memorized = EXCLUDED.new_ayahs_memorized,
                warmup_passed = EXCLUDED.warmup_passed,
                sabaq_allowed = EXCLUDED.sabaq_allowed,
                updated_at = now()
            RETURNING user_id, session_date, mode, retention_score, backlog_minutes_estimate,
                      overdue_days_max, minutes_total, reviews_total, reviews_successful,
                      new_ayahs_memorized, warmup_passed, sabaq_allowed
            "#,
        )
        .bind(daily.user_id)
        .bind(daily.session_date)
        .bind(daily.mode)
        .bind(daily.retention_score)
        .bind(daily.backlog_minutes_estimate)
        .bind(daily.overdue_days_max)
        .bind(daily.minutes_total)
        .bind(daily.reviews_total)
        .bind(daily.reviews_successful)
        .bind(daily.new_ayahs_memorized)
        .bind(daily.warmup_passed)
        .bind(daily.sabaq_allowed)
        .fetch_one(&mut *tx)
        .await
        .map_err(StorageError::Query)?;

        tx.commit().await.map_err(StorageError::Query)?;

        Ok(Some(stored))
    }
}
