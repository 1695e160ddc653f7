//! Today-queue assembly.
//!
//! All inputs are read once per request and handed to the pure planner in
//! the domain crate; there is no shared planner state.

use chrono::{DateTime, Duration, Utc};

use hifz_backend_domain::queue::{
    self, QueueStatus, TodayQueueResponse, WarmupEvaluation, queue_item,
};
use hifz_backend_domain::time::{day_start, utc_day};
use hifz_backend_domain::{DomainError, ReviewTier, User};

use crate::AppState;

/// Build the full queue payload for one user at one instant.
pub async fn build_today_queue(
    state: &AppState,
    user: &User,
    now: DateTime<Utc>,
) -> Result<TodayQueueResponse, DomainError> {
    // Fluency gate guard: no queue until the gate is passed.
    if user.requires_pre_hifz || !user.fluency_gate_passed {
        return Ok(TodayQueueResponse::fluency_gate_required(
            user.time_budget_minutes,
            user.backlog_freeze_ratio,
        ));
    }

    // Debt metrics over the due set.
    let due = state
        .item_repo
        .due_items(user.id, now)
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?;
    let earliest_due_at = due.first().map(|item| item.next_review_at);
    let debt = queue::debt_metrics(
        due.len() as i64,
        earliest_due_at,
        now,
        user.avg_seconds_per_item,
        user.time_budget_minutes,
        user.backlog_freeze_ratio,
    );

    // Warm-up: items introduced the prior UTC day, re-tested today.
    let today = utc_day(now);
    let today_start = day_start(today);
    let yesterday_start = today_start - Duration::days(1);
    let introduced_yesterday = state
        .item_repo
        .introduced_between(user.id, yesterday_start, today_start)
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?;
    let warmup = if introduced_yesterday.is_empty() {
        WarmupEvaluation::vacuous()
    } else {
        let todays_attempts = state
            .event_repo
            .attempts_in_window(user.id, today_start, today_start + Duration::days(1))
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;
        queue::evaluate_warmup(&introduced_yesterday, &todays_attempts)
    };

    // Rolling retention and mode.
    let retention_scores = state
        .daily_repo
        .retention_window(user.id, today)
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?;
    let retention_rolling_7d = queue::rolling_retention(&retention_scores);
    let mode = queue::select_mode(&debt, &warmup, retention_rolling_7d, user.retention_threshold);

    // Sabqi: every due non-MANZIL item in risk order.
    let mut sabqi: Vec<_> = due
        .iter()
        .filter(|item| item.tier != ReviewTier::Manzil)
        .cloned()
        .collect();
    queue::risk_sort(&mut sabqi, now);

    // Manzil rotation: due items first, filled from the active set.
    let mut due_manzil: Vec<_> = due
        .iter()
        .filter(|item| item.tier == ReviewTier::Manzil)
        .cloned()
        .collect();
    queue::risk_sort(&mut due_manzil, now);
    let active_manzil = state
        .item_repo
        .active_manzil(user.id)
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?;
    let target = queue::manzil_rotation_target(active_manzil.len(), user.manzil_rotation_days);
    let mut not_due_manzil: Vec<_> = active_manzil
        .into_iter()
        .filter(|item| item.next_review_at > now)
        .collect();
    queue::risk_sort(&mut not_due_manzil, now);
    let manzil = queue::manzil_queue(due_manzil, not_due_manzil, target);

    // Weak transitions.
    let transitions = state
        .transition_repo
        .all_for_user(user.id)
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?;
    let (weak, link_repair_recommended) = queue::weak_transitions(&transitions);

    let sabaq_task = queue::sabaq_task(mode, &warmup, user.daily_new_target_ayahs);

    tracing::debug!(
        user_id = %user.id,
        ?mode,
        due_count = debt.due_count,
        backlog_minutes = debt.backlog_minutes_estimate,
        warmup_passed = warmup.passed,
        "today queue planned"
    );

    Ok(TodayQueueResponse {
        status: QueueStatus::Ready,
        action: None,
        mode: Some(mode),
        debt,
        warmup,
        retention_rolling_7d,
        sabqi_queue: sabqi.iter().map(|item| queue_item(item, now)).collect(),
        manzil_queue: manzil.iter().map(|item| queue_item(item, now)).collect(),
        weak_transitions: weak,
        link_repair_recommended,
        sabaq_task,
    })
}
