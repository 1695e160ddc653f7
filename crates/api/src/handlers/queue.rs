//! Today-queue handler.

use std::sync::Arc;

use axum::{Json, extract::State};
use chrono::Utc;

use hifz_backend_domain::DomainError;
use hifz_backend_domain::queue::TodayQueueResponse;

use crate::AppState;
use crate::middleware::auth::AuthUser;
use crate::services::queue::build_today_queue;

/// The user's queue for today.
pub async fn today_queue(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<TodayQueueResponse>, DomainError> {
    let queue = build_today_queue(&state, &user, Utc::now()).await?;
    Ok(Json(queue))
}
