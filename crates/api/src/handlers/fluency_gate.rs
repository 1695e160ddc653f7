//! Fluency gate handlers.

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use rand::Rng;
use validator::Validate;

use hifz_backend_domain::fluency::{
    self, FluencyGateStatusResponse, FluencyTestResult, StartFluencyTestResponse,
    SubmitFluencyTestRequest, SubmitFluencyTestResponse,
};
use hifz_backend_domain::{DomainError, FluencyTestStatus};

use crate::AppState;
use crate::middleware::auth::AuthUser;

/// Start a page-read test on a page the user has not memorized.
pub async fn start_test(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<(StatusCode, Json<StartFluencyTestResponse>), DomainError> {
    let pages = match state.page_cache.page_numbers() {
        Some(pages) => pages,
        None => {
            let pages = state
                .ayah_repo
                .pages()
                .await
                .map_err(|e| DomainError::Database(e.to_string()))?;
            state.page_cache.store_page_numbers(pages)
        }
    };
    if pages.is_empty() {
        return Err(DomainError::Conflict(
            "Ayah corpus is not seeded".to_string(),
        ));
    }

    let memorized = state
        .ayah_repo
        .memorized_pages(user.id)
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?;
    let candidates: Vec<i32> = pages
        .iter()
        .copied()
        .filter(|page| !memorized.contains(page))
        .collect();
    let candidate_pool = if candidates.is_empty() {
        pages.as_slice()
    } else {
        candidates.as_slice()
    };
    let test_page = candidate_pool[rand::thread_rng().gen_range(0..candidate_pool.len())];

    let test = state
        .fluency_repo
        .create(user.id, test_page)
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?;

    let ayahs = match state.page_cache.page(test_page) {
        Some(ayahs) => ayahs,
        None => {
            let ayahs = state
                .ayah_repo
                .list_page(test_page)
                .await
                .map_err(|e| DomainError::Database(e.to_string()))?;
            state.page_cache.store_page(test_page, ayahs)
        }
    };

    tracing::info!(user_id = %user.id, test_id = %test.id, test_page, "fluency test started");

    Ok((
        StatusCode::CREATED,
        Json(StartFluencyTestResponse {
            test_id: test.id,
            page_number: test_page,
            ayahs: ayahs.as_ref().clone(),
        }),
    ))
}

/// Score a completed read and flip the user's gate flags.
pub async fn submit_test(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<SubmitFluencyTestRequest>,
) -> Result<Json<SubmitFluencyTestResponse>, DomainError> {
    req.validate()
        .map_err(DomainError::from_validation_errors)?;

    let time_score = fluency::time_score(req.duration_seconds);
    let accuracy_score = fluency::accuracy_score(req.error_count);
    let score = time_score + accuracy_score;
    let passed = fluency::passes(score);
    let status = if passed {
        FluencyTestStatus::Passed
    } else {
        FluencyTestStatus::Failed
    };

    // Only IN_PROGRESS tests may be submitted; terminal tests are gone.
    let test = state
        .fluency_repo
        .complete(
            req.test_id,
            user.id,
            &FluencyTestResult {
                status,
                duration_seconds: req.duration_seconds,
                error_count: req.error_count,
                fluency_score: score,
                completed_at: Utc::now(),
            },
        )
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?
        .ok_or_else(|| {
            DomainError::NotFound(format!(
                "No in-progress fluency test {} for this user",
                req.test_id
            ))
        })?;

    state
        .user_repo
        .apply_fluency_result(user.id, score, passed)
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?;

    tracing::info!(
        user_id = %user.id,
        test_id = %test.id,
        score,
        passed,
        "fluency test submitted"
    );

    Ok(Json(SubmitFluencyTestResponse {
        test_id: test.id,
        status,
        fluency_score: score,
        time_score,
        accuracy_score,
        passed,
    }))
}

/// Current gate status plus the latest test.
pub async fn gate_status(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<FluencyGateStatusResponse>, DomainError> {
    let latest_test = state
        .fluency_repo
        .latest(user.id)
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?;

    Ok(Json(FluencyGateStatusResponse {
        fluency_gate_passed: user.fluency_gate_passed,
        requires_pre_hifz: user.requires_pre_hifz,
        fluency_score: user.fluency_score,
        latest_test,
    }))
}
