//! Reduced per-item learning state.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use hifz_backend_domain::reducer::{self, ReviewAttempt};
use hifz_backend_domain::{ReviewTier, UserItemState};

use crate::StorageError;

/// Sums over a user's review counters, for overall retention.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct ReviewCountTotals {
    pub total_reviews: i64,
    pub successful_reviews: i64,
}

/// Item state repository. The only write path is the full-replay upsert in
/// [`ItemStateRepository::rebuild`].
#[derive(Clone)]
pub struct ItemStateRepository {
    pool: PgPool,
}

impl ItemStateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Replay all REVIEW_ATTEMPTED events for one (user, ayah) and store the
    /// resulting state.
    ///
    /// The whole replay runs in one transaction holding a pair-scoped
    /// advisory lock, so concurrent ingests for the same item serialize and
    /// the stored row always equals a fresh fold of the durable log.
    pub async fn rebuild(
        &self,
        user_id: Uuid,
        ayah_id: i32,
    ) -> Result<Option<UserItemState>, StorageError> {
        let mut tx = self.pool.begin().await.map_err(StorageError::Query)?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(format!("item-state:{user_id}:{ayah_id}"))
            .execute(&mut *tx)
            .await
            .map_err(StorageError::Query)?;

        let rows: Vec<AttemptRow> = sqlx::query_as(
            r#"
            SELECT occurred_at, success, errors_count, duration_seconds
            FROM review_events
            WHERE user_id = $1 AND item_ayah_id = $2 AND event_type = 'REVIEW_ATTEMPTED'
            ORDER BY occurred_at ASC, id ASC
            "#,
        )
        .bind(user_id)
        .bind(ayah_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(StorageError::Query)?;

        let attempts: Vec<ReviewAttempt> = rows
            .into_iter()
            .map(|row| ReviewAttempt {
                occurred_at: row.occurred_at,
                success: row.success,
                errors_count: row.errors_count,
                duration_seconds: row.duration_seconds,
            })
            .collect();

        let Some(state) = reducer::reduce(user_id, ayah_id, &attempts) else {
            tx.rollback().await.map_err(StorageError::Query)?;
            return Ok(None);
        };

        sqlx::query(
            r#"
            INSERT INTO user_item_states (
                user_id, ayah_id, status, tier, next_review_at,
                review_interval_seconds, interval_checkpoint_index, introduced_at,
                first_memorized_at, difficulty_score, total_reviews,
                successful_reviews, lapses, success_streak, consecutive_perfect_days,
                last_perfect_day, average_duration_seconds, last_errors_count,
                last_reviewed_at, last_event_occurred_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                    $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
            ON CONFLICT (user_id, ayah_id) DO UPDATE SET
                status = EXCLUDED.status,
                tier = EXCLUDED.tier,
                next_review_at = EXCLUDED.next_review_at,
                review_interval_seconds = EXCLUDED.review_interval_seconds,
                interval_checkpoint_index = EXCLUDED.interval_checkpoint_index,
                introduced_at = EXCLUDED.introduced_at,
                first_memorized_at = EXCLUDED.first_memorized_at,
                difficulty_score = EXCLUDED.difficulty_score,
                total_reviews = EXCLUDED.total_reviews,
                successful_reviews = EXCLUDED.successful_reviews,
                lapses = EXCLUDED.lapses,
                success_streak = EXCLUDED.success_streak,
                consecutive_perfect_days = EXCLUDED.consecutive_perfect_days,
                last_perfect_day = EXCLUDED.last_perfect_day,
                average_duration_seconds = EXCLUDED.average_duration_seconds,
                last_errors_count = EXCLUDED.last_errors_count,
                last_reviewed_at = EXCLUDED.last_reviewed_at,
                last_event_occurred_at = EXCLUDED.last_event_occurred_at,
                updated_at = now()
            "#,
        )
        .bind(state.user_id)
        .bind(state.ayah_id)
        .bind(state.status)
        .bind(state.tier)
        .bind(state.next_review_at)
        .bind(state.review_interval_seconds)
        .bind(state.interval_checkpoint_index)
        .bind(state.introduced_at)
        .bind(state.first_memorized_at)
        .bind(state.difficulty_score)
        .bind(state.total_reviews)
        .bind(state.successful_reviews)
        .bind(state.lapses)
        .bind(state.success_streak)
        .bind(state.consecutive_perfect_days)
        .bind(state.last_perfect_day)
        .bind(state.average_duration_seconds)
        .bind(state.last_errors_count)
        .bind(state.last_reviewed_at)
        .bind(state.last_event_occurred_at)
        .execute(&mut *tx)
        .await
        .map_err(StorageError::Query)?;

        tx.commit().await.map_err(StorageError::Query)?;

        Ok(Some(state))
    }

    pub async fn get(
        &self,
        user_id: Uuid,
        ayah_id: i32,
    ) -> Result<Option<UserItemState>, StorageError> {
        sqlx::query_as::<_, UserItemState>(
            "SELECT * FROM user_item_states WHERE user_id = $1 AND ayah_id = $2",
        )
        .bind(user_id)
        .bind(ayah_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::Query)
    }

    /// Everything due at or before `now`.
    pub async fn due_items(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<UserItemState>, StorageError> {
        sqlx::query_as::<_, UserItemState>(
            r#"
            SELECT * FROM user_item_states
            WHERE user_id = $1 AND next_review_at <= $2
            ORDER BY next_review_at ASC
            "#,
        )
        .bind(user_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Query)
    }

    /// Active MANZIL items (everything not paused).
    pub async fn active_manzil(&self, user_id: Uuid) -> Result<Vec<UserItemState>, StorageError> {
        sqlx::query_as::<_, UserItemState>(
            r#"
            SELECT * FROM user_item_states
            WHERE user_id = $1 AND tier = 'MANZIL' AND status <> 'PAUSED'
            ORDER BY next_review_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Query)
    }

    /// Ayah ids of items introduced within the half-open window.
    pub async fn introduced_between(
        &self,
        user_id: Uuid,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<i32>, StorageError> {
        let rows: Vec<(i32,)> = sqlx::query_as(
            r#"
            SELECT ayah_id FROM user_item_states
            WHERE user_id = $1 AND introduced_at >= $2 AND introduced_at < $3
            ORDER BY ayah_id
            "#,
        )
        .bind(user_id)
        .bind(from)
        .bind(until)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Query)?;
        Ok(rows.into_iter().map(|(ayah_id,)| ayah_id).collect())
    }

    /// Items first memorized at or after the instant.
    pub async fn count_memorized_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<i64, StorageError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM user_item_states WHERE user_id = $1 AND first_memorized_at >= $2",
        )
        .bind(user_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(StorageError::Query)?;
        Ok(count)
    }

    pub async fn count_memorized(&self, user_id: Uuid) -> Result<i64, StorageError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM user_item_states WHERE user_id = $1 AND status = 'MEMORIZED'",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(StorageError::Query)?;
        Ok(count)
    }

    pub async fn count_learning(&self, user_id: Uuid) -> Result<i64, StorageError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM user_item_states WHERE user_id = $1 AND status = 'LEARNING'",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(StorageError::Query)?;
        Ok(count)
    }

    pub async fn count_due(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<i64, StorageError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM user_item_states WHERE user_id = $1 AND next_review_at <= $2",
        )
        .bind(user_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(StorageError::Query)?;
        Ok(count)
    }

    pub async fn count_by_tier(
        &self,
        user_id: Uuid,
        tier: ReviewTier,
    ) -> Result<i64, StorageError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM user_item_states WHERE user_id = $1 AND tier = $2",
        )
        .bind(user_id)
        .bind(tier)
        .fetch_one(&self.pool)
        .await
        .map_err(StorageError::Query)?;
        Ok(count)
    }

    /// Item counts per checkpoint index 0..=7.
    pub async fn checkpoint_distribution(&self, user_id: Uuid) -> Result<Vec<i64>, StorageError> {
        let rows: Vec<(i32, i64)> = sqlx::query_as(
            r#"
            SELECT interval_checkpoint_index, COUNT(*)
            FROM user_item_states
            WHERE user_id = $1
            GROUP BY interval_checkpoint_index
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Query)?;

        let mut distribution = vec![0i64; 8];
        for (index, count) in rows {
            if (0..8).contains(&index) {
                distribution[index as usize] = count;
            }
        }
        Ok(distribution)
    }

    /// Lifetime review counter sums.
    pub async fn review_totals(&self, user_id: Uuid) -> Result<ReviewCountTotals, StorageError> {
        sqlx::query_as::<_, ReviewCountTotals>(
            r#"
            SELECT COALESCE(SUM(total_reviews), 0) AS total_reviews,
                   COALESCE(SUM(successful_reviews), 0) AS successful_reviews
            FROM user_item_states
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(StorageError::Query)
    }
}

#[derive(sqlx::FromRow)]
struct AttemptRow {
    occurred_at: DateTime<Utc>,
    success: bool,
    errors_count: i32,
    duration_seconds: i32,
}
