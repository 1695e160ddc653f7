//! Daily session rollup on completion.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use hifz_backend_domain::analytics::xp_for;
use hifz_backend_domain::queue::QueueStatus;
use hifz_backend_domain::session::CompleteSessionResponse;
use hifz_backend_domain::time::{day_start, utc_day};
use hifz_backend_domain::{DailySession, DomainError, SessionStatus, User};

use crate::AppState;
use crate::services::queue::build_today_queue;

/// Complete a session: CAS to COMPLETED, aggregate its events, upsert the
/// daily row.
pub async fn complete_session(
    state: &AppState,
    user: &User,
    session_id: Uuid,
    now: DateTime<Utc>,
) -> Result<CompleteSessionResponse, DomainError> {
    let session = state
        .session_repo
        .get(session_id)
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?
        .filter(|session| session.user_id == user.id)
        .ok_or_else(|| DomainError::NotFound(format!("Session {session_id} not found")))?;

    if session.status != SessionStatus::Active {
        return Err(DomainError::Conflict(
            "Session is already completed".to_string(),
        ));
    }

    // Re-evaluate the queue at completion time; a user who has become
    // gate-blocked cannot close out a session.
    let snapshot = build_today_queue(state, user, now).await?;
    if snapshot.status == QueueStatus::FluencyGateRequired {
        return Err(DomainError::Forbidden(
            "Fluency gate must be completed first".to_string(),
        ));
    }

    let totals = state
        .event_repo
        .session_review_totals(session_id)
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?;
    let retention_score = if totals.reviews_total == 0 {
        1.0
    } else {
        totals.reviews_successful as f64 / totals.reviews_total as f64
    };
    let minutes_total = {
        let d = totals.duration_seconds_total / 60;
        let r = totals.duration_seconds_total % 60;
        if r > 0 { d + 1 } else { d }
    } as i32;

    let today = utc_day(now);
    let new_ayahs_memorized = state
        .item_repo
        .count_memorized_since(user.id, day_start(today))
        .await
        .map_err(|e| DomainError::Database(e.to_string()))? as i32;

    let daily = DailySession {
        user_id: user.id,
        session_date: today,
        mode: snapshot.mode.unwrap_or(session.mode),
        retention_score,
        backlog_minutes_estimate: snapshot.debt.backlog_minutes_estimate as i32,
        overdue_days_max: snapshot.debt.overdue_days_max as i32,
        minutes_total,
        reviews_total: totals.reviews_total as i32,
        reviews_successful: totals.reviews_successful as i32,
        new_ayahs_memorized,
        warmup_passed: snapshot.warmup.passed,
        sabaq_allowed: snapshot.sabaq_task.allowed,
    };

    let stored = state
        .session_repo
        .complete_with_rollup(session_id, now, &daily)
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?
        .ok_or_else(|| DomainError::Conflict("Session is already completed".to_string()))?;

    tracing::info!(
        user_id = %user.id,
        session_id = %session_id,
        reviews_total = stored.reviews_total,
        retention = stored.retention_score,
        minutes = stored.minutes_total,
        "session completed"
    );

    let xp = xp_for(
        stored.minutes_total,
        stored.reviews_successful,
        stored.new_ayahs_memorized,
    );

    Ok(CompleteSessionResponse { daily: stored, xp })
}
