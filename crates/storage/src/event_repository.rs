//! Append-only review event store.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use hifz_backend_domain::events::NewReviewEvent;
use hifz_backend_domain::queue::WarmupAttempt;
use hifz_backend_domain::reducer::ReviewAttempt;
use hifz_backend_domain::{EventType, StepType};

use crate::StorageError;

/// Result of an ingest attempt.
#[derive(Debug, Clone, Copy)]
pub struct IngestOutcome {
    pub deduplicated: bool,
    pub event_id: Option<Uuid>,
}

/// Per-session review aggregates for the daily rollup.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct SessionReviewTotals {
    pub reviews_total: i64,
    pub reviews_successful: i64,
    pub duration_seconds_total: i64,
}

/// Event repository.
#[derive(Clone)]
pub struct EventRepository {
    pool: PgPool,
}

impl EventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert one event with its companion side effects in a single
    /// transaction.
    ///
    /// A collision on `(user_id, client_event_id)` makes the whole call a
    /// no-op returning `deduplicated: true`: the session counter and the
    /// transition score move exactly once per durable event. Reducer work
    /// belongs after this commit, never inside it.
    pub async fn ingest(&self, event: &NewReviewEvent) -> Result<IngestOutcome, StorageError> {
        let mut tx = self.pool.begin().await.map_err(StorageError::Query)?;

        let inserted: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO review_events (
                user_id, session_run_id, client_event_id, event_type, session_type,
                item_ayah_id, tier, step_type, attempt_number, scaffolding_used,
                linked_ayah_id, errors_count, duration_seconds, error_tags,
                from_ayah_id, to_ayah_id, success, occurred_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                    $11, $12, $13, $14, $15, $16, $17, $18)
            ON CONFLICT (user_id, client_event_id) WHERE client_event_id IS NOT NULL
                DO NOTHING
            RETURNING id
            "#,
        )
        .bind(event.user_id)
        .bind(event.session_run_id)
        .bind(event.client_event_id)
        .bind(event.event_type)
        .bind(event.session_type)
        .bind(event.item_ayah_id)
        .bind(event.tier)
        .bind(event.step_type)
        .bind(event.attempt_number)
        .bind(event.scaffolding_used)
        .bind(event.linked_ayah_id)
        .bind(event.errors_count)
        .bind(event.duration_seconds)
        .bind(event.error_tags.as_deref())
        .bind(event.from_ayah_id)
        .bind(event.to_ayah_id)
        .bind(event.success)
        .bind(event.occurred_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(StorageError::Query)?;

        let Some((event_id,)) = inserted else {
            tx.rollback().await.map_err(StorageError::Query)?;
            return Ok(IngestOutcome {
                deduplicated: true,
                event_id: None,
            });
        };

        if let Some(session_run_id) = event.session_run_id {
            sqlx::query("UPDATE session_runs SET events_count = events_count + 1 WHERE id = $1")
                .bind(session_run_id)
                .execute(&mut *tx)
                .await
                .map_err(StorageError::Query)?;
        }

        // Transition strength moves once per durable event: LINK-typed
        // reviews link the item to its follower, transition events carry the
        // pair explicitly.
        let transition_pair = match event.event_type {
            EventType::TransitionAttempted => event.from_ayah_id.zip(event.to_ayah_id),
            EventType::ReviewAttempted if event.step_type == Some(StepType::Link) => {
                event.item_ayah_id.zip(event.linked_ayah_id)
            }
            EventType::ReviewAttempted => None,
        };
        if let Some((from, to)) = transition_pair {
            sqlx::query(
                r#"
                INSERT INTO transition_scores
                    (user_id, from_ayah_id, to_ayah_id, attempt_count, success_count, last_practiced_at)
                VALUES ($1, $2, $3, 1, $4, $5)
                ON CONFLICT (user_id, from_ayah_id, to_ayah_id) DO UPDATE SET
                    attempt_count = transition_scores.attempt_count + 1,
                    success_count = transition_scores.success_count + EXCLUDED.success_count,
                    last_practiced_at = GREATEST(transition_scores.last_practiced_at, EXCLUDED.last_practiced_at)
                "#,
            )
            .bind(event.user_id)
            .bind(from)
            .bind(to)
            .bind(if event.success { 1 } else { 0 })
            .bind(event.occurred_at)
            .execute(&mut *tx)
            .await
            .map_err(StorageError::Query)?;
        }

        tx.commit().await.map_err(StorageError::Query)?;

        Ok(IngestOutcome {
            deduplicated: false,
            event_id: Some(event_id),
        })
    }

    /// The ordered REVIEW_ATTEMPTED fold input for one (user, ayah).
    pub async fn attempts_for_item(
        &self,
        user_id: Uuid,
        ayah_id: i32,
    ) -> Result<Vec<ReviewAttempt>, StorageError> {
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
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Query)?;

        Ok(rows
            .into_iter()
            .map(|row| ReviewAttempt {
                occurred_at: row.occurred_at,
                success: row.success,
                errors_count: row.errors_count,
                duration_seconds: row.duration_seconds,
            })
            .collect())
    }

    /// Review attempts in a half-open window, for warm-up evaluation.
    pub async fn attempts_in_window(
        &self,
        user_id: Uuid,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<WarmupAttempt>, StorageError> {
        let rows: Vec<WindowRow> = sqlx::query_as(
            r#"
            SELECT item_ayah_id, success, errors_count
            FROM review_events
            WHERE user_id = $1 AND event_type = 'REVIEW_ATTEMPTED'
              AND occurred_at >= $2 AND occurred_at < $3
            "#,
        )
        .bind(user_id)
        .bind(from)
        .bind(until)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Query)?;

        Ok(rows
            .into_iter()
            .map(|row| WarmupAttempt {
                ayah_id: row.item_ayah_id,
                success: row.success,
                errors_count: row.errors_count,
            })
            .collect())
    }

    /// Observed (step, attempt) counts for one ayah within one session.
    pub async fn step_counts(
        &self,
        session_run_id: Uuid,
        ayah_id: i32,
    ) -> Result<HashMap<StepType, i32>, StorageError> {
        let rows: Vec<(StepType, i64)> = sqlx::query_as(
            r#"
            SELECT step_type, COUNT(*)
            FROM review_events
            WHERE session_run_id = $1 AND item_ayah_id = $2
              AND event_type = 'REVIEW_ATTEMPTED' AND step_type IS NOT NULL
            GROUP BY step_type
            "#,
        )
        .bind(session_run_id)
        .bind(ayah_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Query)?;

        Ok(rows
            .into_iter()
            .map(|(step, count)| (step, count as i32))
            .collect())
    }

    /// Review aggregates for one session run.
    pub async fn session_review_totals(
        &self,
        session_run_id: Uuid,
    ) -> Result<SessionReviewTotals, StorageError> {
        sqlx::query_as::<_, SessionReviewTotals>(
            r#"
            SELECT COUNT(*) AS reviews_total,
                   COUNT(*) FILTER (WHERE success) AS reviews_successful,
                   COALESCE(SUM(duration_seconds), 0) AS duration_seconds_total
            FROM review_events
            WHERE session_run_id = $1 AND event_type = 'REVIEW_ATTEMPTED'
            "#,
        )
        .bind(session_run_id)
        .fetch_one(&self.pool)
        .await
        .map_err(StorageError::Query)
    }

    /// Total stored events for one user. Test and diagnostics helper.
    pub async fn count_for_user(&self, user_id: Uuid) -> Result<i64, StorageError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM review_events WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await
                .map_err(StorageError::Query)?;
        Ok(count)
    }
}

#[derive(sqlx::FromRow)]
struct AttemptRow {
    occurred_at: DateTime<Utc>,
    success: bool,
    errors_count: i32,
    duration_seconds: i32,
}

#[derive(sqlx::FromRow)]
struct WindowRow {
    item_ayah_id: i32,
    success: bool,
    errors_count: i32,
}
