//! Daily aggregate reads.

use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use hifz_backend_domain::DailySession;

use crate::StorageError;

/// Lifetime sums over daily aggregates, for XP and badges.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct LifetimeTotals {
    pub minutes_total: i64,
    pub reviews_successful: i64,
    pub new_ayahs_memorized: i64,
    pub perfect_days: i64,
}

/// Daily session repository.
#[derive(Clone)]
pub struct DailySessionRepository {
    pool: PgPool,
}

impl DailySessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Retention scores for the seven-day window ending today, oldest first.
    pub async fn retention_window(
        &self,
        user_id: Uuid,
        today: NaiveDate,
    ) -> Result<Vec<f64>, StorageError> {
        let rows: Vec<(f64,)> = sqlx::query_as(
            r#"
            SELECT retention_score FROM daily_sessions
            WHERE user_id = $1 AND session_date > $2 - 7 AND session_date <= $2
            ORDER BY session_date
            "#,
        )
        .bind(user_id)
        .bind(today)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Query)?;
        Ok(rows.into_iter().map(|(score,)| score).collect())
    }

    /// All aggregates within one calendar month.
    pub async fn month(
        &self,
        user_id: Uuid,
        first_day: NaiveDate,
        next_month: NaiveDate,
    ) -> Result<Vec<DailySession>, StorageError> {
        sqlx::query_as::<_, DailySession>(
            r#"
            SELECT * FROM daily_sessions
            WHERE user_id = $1 AND session_date >= $2 AND session_date < $3
            ORDER BY session_date
            "#,
        )
        .bind(user_id)
        .bind(first_day)
        .bind(next_month)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Query)
    }

    /// Every day with a stored aggregate, ascending.
    pub async fn active_days(&self, user_id: Uuid) -> Result<Vec<NaiveDate>, StorageError> {
        let rows: Vec<(NaiveDate,)> = sqlx::query_as(
            "SELECT session_date FROM daily_sessions WHERE user_id = $1 ORDER BY session_date",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Query)?;
        Ok(rows.into_iter().map(|(day,)| day).collect())
    }

    /// Lifetime sums, including the perfect-day count (retention 1.0 over at
    /// least ten reviews).
    pub async fn lifetime_totals(&self, user_id: Uuid) -> Result<LifetimeTotals, StorageError> {
        sqlx::query_as::<_, LifetimeTotals>(
            r#"
            SELECT COALESCE(SUM(minutes_total), 0) AS minutes_total,
                   COALESCE(SUM(reviews_successful), 0) AS reviews_successful,
                   COALESCE(SUM(new_ayahs_memorized), 0) AS new_ayahs_memorized,
                   COUNT(*) FILTER (WHERE retention_score >= 1.0 AND reviews_total >= 10)
                       AS perfect_days
            FROM daily_sessions
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(StorageError::Query)
    }
}
