//! Review event ingestion handler.

use std::sync::Arc;

use axum::{Json, extract::State};
use chrono::Utc;
use validator::Validate;

use hifz_backend_domain::events::{IngestResponse, ReviewEventRequest};
use hifz_backend_domain::{DomainError, EventType};

use crate::AppState;
use crate::middleware::auth::AuthUser;

/// Append one review or transition event.
///
/// Duplicate `client_event_id`s are success with `deduplicated: true`. The
/// item reducer runs only after the event is durably committed.
pub async fn ingest_event(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<ReviewEventRequest>,
) -> Result<Json<IngestResponse>, DomainError> {
    req.validate()
        .map_err(DomainError::from_validation_errors)?;
    req.validate_shape().map_err(DomainError::Validation)?;

    let event = req.into_new_event(user.id, Utc::now());
    let item_ayah_id = event.item_ayah_id;
    let event_type = event.event_type;

    let outcome = state
        .event_repo
        .ingest(&event)
        .await
        .map_err(|e| {
            tracing::error!("Failed to ingest event: {}", e);
            DomainError::Database(e.to_string())
        })?;

    if !outcome.deduplicated && event_type == EventType::ReviewAttempted {
        if let Some(ayah_id) = item_ayah_id {
            state
                .item_repo
                .rebuild(user.id, ayah_id)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to reduce item state: {}", e);
                    DomainError::Database(e.to_string())
                })?;
        }
    }

    tracing::info!(
        user_id = %user.id,
        ?event_type,
        deduplicated = outcome.deduplicated,
        "event ingested"
    );

    Ok(Json(IngestResponse {
        deduplicated: outcome.deduplicated,
        event_id: outcome.event_id,
    }))
}
