//! Assessment handlers.

use std::sync::Arc;

use axum::{Json, extract::State};
use chrono::Utc;
use validator::Validate;

use hifz_backend_domain::assessment::{
    self, AssessmentInput, SubmitAssessmentRequest, SubmitAssessmentResponse,
};
use hifz_backend_domain::DomainError;

use crate::AppState;
use crate::middleware::auth::AuthUser;

/// Default fluency assumed when neither a gate score nor a self-report
/// exists.
const DEFAULT_FLUENCY: f64 = 50.0;

/// Compute and persist scheduling parameters from assessment inputs.
pub async fn submit_assessment(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<SubmitAssessmentRequest>,
) -> Result<Json<SubmitAssessmentResponse>, DomainError> {
    req.validate()
        .map_err(DomainError::from_validation_errors)?;
    req.validate_time_budget().map_err(DomainError::Validation)?;

    // A real gate score always wins over self-report.
    let fluency_score = user
        .fluency_score
        .or(req.fluency_score)
        .unwrap_or(DEFAULT_FLUENCY);

    let params = assessment::plan(AssessmentInput {
        time_budget_minutes: req.time_budget_minutes,
        fluency_score,
        tajwid_confidence: req.tajwid_confidence,
        goal: req.goal,
        has_teacher: req.has_teacher,
        prior_juz_band: req.prior_juz_band,
    });

    let completed_at = Utc::now();
    state
        .user_repo
        .apply_assessment(
            user.id,
            req.time_budget_minutes,
            req.tajwid_confidence,
            req.goal,
            req.has_teacher,
            req.prior_juz_band,
            &params,
            completed_at,
        )
        .await
        .map_err(|e| {
            tracing::error!("Failed to persist assessment: {}", e);
            DomainError::Database(e.to_string())
        })?;

    tracing::info!(
        user_id = %user.id,
        variant = ?params.variant,
        scaffolding = ?params.scaffolding_level,
        daily_new_target = params.daily_new_target_ayahs,
        "assessment applied"
    );

    Ok(Json(SubmitAssessmentResponse {
        parameters: params,
        completed_at,
    }))
}
