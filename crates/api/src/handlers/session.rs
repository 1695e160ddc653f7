//! Session lifecycle handlers: start, step submission, completion.

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use validator::Validate;

use hifz_backend_domain::events::NewReviewEvent;
use hifz_backend_domain::protocol::{
    self, StepCompleteRequest, StepCompleteResponse, StepSequenceViolation,
};
use hifz_backend_domain::queue::QueueStatus;
use hifz_backend_domain::session::{
    CompleteSessionRequest, CompleteSessionResponse, StartSessionRequest, StartSessionResponse,
};
use hifz_backend_domain::time::step_event_id;
use hifz_backend_domain::{
    DomainError, EventType, QueueMode, ReviewTier, SessionStatus, SessionType, StepType,
};

use crate::AppState;
use crate::middleware::auth::AuthUser;
use crate::services::queue::build_today_queue;
use crate::services::rollup;

/// Open a session. Blocked while the fluency gate is unpassed; idempotent on
/// `client_session_id`.
pub async fn start_session(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<StartSessionRequest>,
) -> Result<(StatusCode, Json<StartSessionResponse>), DomainError> {
    req.validate()
        .map_err(DomainError::from_validation_errors)?;

    let queue = build_today_queue(&state, &user, Utc::now()).await?;
    if queue.status == QueueStatus::FluencyGateRequired {
        return Err(DomainError::Forbidden(
            "Fluency gate must be completed first".to_string(),
        ));
    }

    // The planner supplies mode and warm-up state unless the client pins
    // them (a coach override, or a resumed offline session).
    let mode = req.mode.or(queue.mode).unwrap_or(QueueMode::Normal);
    let warmup_passed = req.warmup_passed.unwrap_or(queue.warmup.passed);

    let session = state
        .session_repo
        .start(user.id, req.client_session_id, mode, warmup_passed)
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?;

    tracing::info!(
        user_id = %user.id,
        session_id = %session.id,
        ?mode,
        warmup_passed,
        "session started"
    );

    Ok((
        StatusCode::CREATED,
        Json(StartSessionResponse {
            session_id: session.id,
            mode: session.mode,
            warmup_passed: session.warmup_passed,
            started_at: session.started_at,
        }),
    ))
}

/// Record one protocol step for one ayah.
///
/// Validation is recomputed from the event log on every call; state is only
/// ever written through the event store, so a replay of the log reproduces
/// the same protocol position.
pub async fn step_complete(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<StepCompleteRequest>,
) -> Result<Json<StepCompleteResponse>, DomainError> {
    req.validate()
        .map_err(DomainError::from_validation_errors)?;
    if req.step_type == StepType::Link && req.linked_ayah_id.is_none() {
        return Err(DomainError::Validation(
            "LINK steps require linked_ayah_id".to_string(),
        ));
    }

    let session = state
        .session_repo
        .get(req.session_id)
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?
        .filter(|session| session.user_id == user.id)
        .ok_or_else(|| DomainError::NotFound(format!("Session {} not found", req.session_id)))?;
    if session.status != SessionStatus::Active {
        return Err(DomainError::Conflict("Session is not active".to_string()));
    }

    let proto = protocol::protocol_for(user.scaffolding_level);
    let counts = state
        .event_repo
        .step_counts(session.id, req.ayah_id)
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?;

    if let Err(expectation) =
        protocol::validate_submission(proto, &counts, req.step_type, req.attempt_number)
    {
        return Err(DomainError::StepSequence(Box::new(
            StepSequenceViolation::new(expectation, protocol::summarize(proto, &counts)),
        )));
    }

    // Deterministic event id: a client retry of the same step dedupes at
    // the store instead of double-recording.
    let now = Utc::now();
    let event = NewReviewEvent {
        user_id: user.id,
        session_run_id: Some(session.id),
        client_event_id: Some(step_event_id(
            session.id,
            req.ayah_id,
            req.step_type,
            req.attempt_number,
        )),
        event_type: EventType::ReviewAttempted,
        session_type: Some(SessionType::Sabaq),
        item_ayah_id: Some(req.ayah_id),
        tier: Some(ReviewTier::Sabaq),
        step_type: Some(req.step_type),
        attempt_number: Some(req.attempt_number),
        scaffolding_used: Some(req.scaffolding_used),
        linked_ayah_id: req.linked_ayah_id,
        errors_count: Some(req.errors_count),
        duration_seconds: Some(req.duration_seconds),
        error_tags: req.error_tags.clone(),
        from_ayah_id: None,
        to_ayah_id: None,
        success: req.success,
        occurred_at: now,
    };

    let outcome = state
        .event_repo
        .ingest(&event)
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?;
    if !outcome.deduplicated {
        state
            .item_repo
            .rebuild(user.id, req.ayah_id)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;
    }

    // Two racing submissions can both pass validation; the event id breaks
    // the tie, and re-reading the log gives both the same answer.
    let counts = state
        .event_repo
        .step_counts(session.id, req.ayah_id)
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?;
    let expectation = protocol::expected(proto, &counts);

    Ok(Json(StepCompleteResponse {
        recorded: !outcome.deduplicated,
        deduplicated: outcome.deduplicated,
        step_status: protocol::step_status_after(proto, &counts, req.step_type),
        next_step: expectation.expected_step,
        next_attempt: expectation.expected_attempt,
        protocol: protocol::summarize(proto, &counts),
        progress: protocol::progress(proto, &counts),
    }))
}

/// Complete a session and return the daily aggregate.
pub async fn complete_session(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<CompleteSessionRequest>,
) -> Result<Json<CompleteSessionResponse>, DomainError> {
    req.validate()
        .map_err(DomainError::from_validation_errors)?;

    let response = rollup::complete_session(&state, &user, req.session_id, Utc::now()).await?;
    Ok(Json(response))
}
