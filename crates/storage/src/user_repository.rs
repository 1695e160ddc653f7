//! User repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use hifz_backend_domain::assessment::AssessmentParameters;
use hifz_backend_domain::{HifzGoal, PriorJuzBand, TajwidConfidence, User};

use crate::StorageError;

/// User repository.
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find user by id, or provision on first authenticated request.
    ///
    /// A single atomic upsert avoids TOCTOU races between concurrent
    /// first-time requests carrying the same identity.
    pub async fn find_or_create(&self, id: Uuid, email: &str) -> Result<User, StorageError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, last_seen_at)
            VALUES ($1, $2, now())
            ON CONFLICT (id) DO UPDATE SET last_seen_at = now()
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(StorageError::Query)
    }

    /// Persist assessment inputs and the parameters computed from them.
    #[allow(clippy::too_many_arguments)]
    pub async fn apply_assessment(
        &self,
        id: Uuid,
        time_budget_minutes: i32,
        tajwid_confidence: TajwidConfidence,
        goal: HifzGoal,
        has_teacher: bool,
        prior_juz_band: PriorJuzBand,
        params: &AssessmentParameters,
        completed_at: DateTime<Utc>,
    ) -> Result<User, StorageError> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                time_budget_minutes = $2,
                tajwid_confidence = $3,
                goal = $4,
                has_teacher = $5,
                prior_juz_band = $6,
                scaffolding_level = $7,
                variant = $8,
                daily_new_target_ayahs = $9,
                review_ratio_target = $10,
                retention_threshold = $11,
                backlog_freeze_ratio = $12,
                consolidation_retention_floor = $13,
                manzil_rotation_days = $14,
                avg_seconds_per_item = $15,
                overdue_cap_seconds = $16,
                assessment_completed_at = $17
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(time_budget_minutes)
        .bind(tajwid_confidence)
        .bind(goal)
        .bind(has_teacher)
        .bind(prior_juz_band)
        .bind(params.scaffolding_level)
        .bind(params.variant)
        .bind(params.daily_new_target_ayahs)
        .bind(params.review_ratio_target)
        .bind(params.retention_threshold)
        .bind(params.backlog_freeze_ratio)
        .bind(params.consolidation_retention_floor)
        .bind(params.manzil_rotation_days)
        .bind(params.avg_seconds_per_item)
        .bind(params.overdue_cap_seconds)
        .bind(completed_at)
        .fetch_one(&self.pool)
        .await
        .map_err(StorageError::Query)
    }

    /// Flip the fluency flags after a gate submission.
    pub async fn apply_fluency_result(
        &self,
        id: Uuid,
        fluency_score: f64,
        passed: bool,
    ) -> Result<User, StorageError> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                fluency_score = $2,
                fluency_gate_passed = $3,
                requires_pre_hifz = NOT $3
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(fluency_score)
        .bind(passed)
        .fetch_one(&self.pool)
        .await
        .map_err(StorageError::Query)
    }
}
