//! Analytics read-model handlers. Reads always succeed, possibly with
//! empty collections.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{Datelike, NaiveDate, Utc};
use serde::Deserialize;

use hifz_backend_domain::analytics::{
    self, AchievementFacts, AchievementsResponse, CalendarDayView, CalendarResponse,
    ProgressResponse, StatsResponse,
};
use hifz_backend_domain::time::utc_day;
use hifz_backend_domain::{DomainError, ReviewTier};

use crate::AppState;
use crate::middleware::auth::AuthUser;

/// Overall stats for the profile header.
pub async fn user_stats(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<StatsResponse>, DomainError> {
    let now = Utc::now();
    let memorized_count = state.item_repo.count_memorized(user.id).await?;
    let learning_count = state.item_repo.count_learning(user.id).await?;
    let due_now = state.item_repo.count_due(user.id, now).await?;
    let totals = state.item_repo.review_totals(user.id).await?;
    let active_days = state.daily_repo.active_days(user.id).await?;
    let lifetime = state.daily_repo.lifetime_totals(user.id).await?;

    let streaks = analytics::streaks(&active_days, utc_day(now));
    let overall_retention = if totals.total_reviews == 0 {
        1.0
    } else {
        totals.successful_reviews as f64 / totals.total_reviews as f64
    };
    let lifetime_xp = lifetime.minutes_total * 2
        + lifetime.reviews_successful
        + lifetime.new_ayahs_memorized * 10;

    Ok(Json(StatsResponse {
        memorized_count,
        learning_count,
        due_now,
        reviews_total: totals.total_reviews,
        overall_retention,
        current_streak: streaks.current,
        longest_streak: streaks.longest,
        lifetime_xp,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    /// Month as `YYYY-MM`; defaults to the current UTC month.
    pub month: Option<String>,
}

/// Per-day completion calendar for one month.
pub async fn user_calendar(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(query): Query<CalendarQuery>,
) -> Result<Json<CalendarResponse>, DomainError> {
    let today = utc_day(Utc::now());
    let (year, month) = match &query.month {
        Some(raw) => parse_month(raw)
            .ok_or_else(|| DomainError::Validation(format!("Invalid month '{raw}'")))?,
        None => (today.year(), today.month()),
    };
    let first_day = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| DomainError::Validation(format!("Invalid month '{year}-{month:02}'")))?;
    let next_month = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .expect("first of month is always valid");

    let sessions = state.daily_repo.month(user.id, first_day, next_month).await?;
    let active_days = state.daily_repo.active_days(user.id).await?;
    let streaks = analytics::streaks(&active_days, today);

    let days = sessions
        .into_iter()
        .map(|daily| CalendarDayView {
            date: daily.session_date,
            completed: daily.reviews_total > 0,
            minutes_total: daily.minutes_total,
            reviews_total: daily.reviews_total,
            reviews_successful: daily.reviews_successful,
            new_ayahs_memorized: daily.new_ayahs_memorized,
            xp: analytics::xp_for(
                daily.minutes_total,
                daily.reviews_successful,
                daily.new_ayahs_memorized,
            ),
            mode: daily.mode,
        })
        .collect();

    Ok(Json(CalendarResponse {
        month: format!("{year}-{month:02}"),
        days,
        current_streak: streaks.current,
        longest_streak: streaks.longest,
    }))
}

fn parse_month(raw: &str) -> Option<(i32, u32)> {
    let (year, month) = raw.split_once('-')?;
    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    (1..=12).contains(&month).then_some((year, month))
}

/// The fixed badge set with unlock state.
pub async fn user_achievements(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<AchievementsResponse>, DomainError> {
    let memorized_count = state.item_repo.count_memorized(user.id).await?;
    let manzil_count = state
        .item_repo
        .count_by_tier(user.id, ReviewTier::Manzil)
        .await?;
    let active_days = state.daily_repo.active_days(user.id).await?;
    let lifetime = state.daily_repo.lifetime_totals(user.id).await?;
    let streaks = analytics::streaks(&active_days, utc_day(Utc::now()));

    let facts = AchievementFacts {
        memorized_count,
        longest_streak: streaks.longest,
        lifetime_xp: lifetime.minutes_total * 2
            + lifetime.reviews_successful
            + lifetime.new_ayahs_memorized * 10,
        perfect_days: lifetime.perfect_days,
        manzil_count,
    };

    Ok(Json(AchievementsResponse {
        achievements: analytics::achievements(&facts),
    }))
}

/// Retention, transition strength and ladder distribution.
pub async fn user_progress(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<ProgressResponse>, DomainError> {
    let totals = state.item_repo.review_totals(user.id).await?;
    let memorized_count = state.item_repo.count_memorized(user.id).await?;
    let transitions = state.transition_repo.all_for_user(user.id).await?;
    let checkpoint_distribution = state.item_repo.checkpoint_distribution(user.id).await?;

    let overall_retention = if totals.total_reviews == 0 {
        1.0
    } else {
        totals.successful_reviews as f64 / totals.total_reviews as f64
    };
    let weak_transition_count = transitions.iter().filter(|t| t.is_weak()).count() as i64;
    let strong_transition_count = transitions
        .iter()
        .filter(|t| t.attempt_count >= 3 && t.success_rate() >= 0.90)
        .count() as i64;

    Ok(Json(ProgressResponse {
        overall_retention,
        total_reviews: totals.total_reviews,
        memorized_count,
        weak_transition_count,
        strong_transition_count,
        checkpoint_distribution,
        recommendation: analytics::recommendation(
            overall_retention,
            weak_transition_count,
            memorized_count,
        ),
    }))
}
