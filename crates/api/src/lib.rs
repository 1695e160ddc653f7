//! Hifz Backend Server library.

pub mod cache;
pub mod handlers;
pub mod middleware;
pub mod services;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use hifz_backend_config::AppConfig;
use hifz_backend_domain::{HealthResponse, ReadyResponse};
use hifz_backend_storage::{
    AyahRepository, DailySessionRepository, EventRepository, FluencyRepository,
    ItemStateRepository, SessionRepository, TransitionRepository, UserRepository, check_connection,
};
use sqlx::PgPool;

use crate::cache::page_cache::PageCache;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub user_repo: UserRepository,
    pub ayah_repo: AyahRepository,
    pub event_repo: EventRepository,
    pub item_repo: ItemStateRepository,
    pub session_repo: SessionRepository,
    pub daily_repo: DailySessionRepository,
    pub transition_repo: TransitionRepository,
    pub fluency_repo: FluencyRepository,
    pub page_cache: PageCache,
    pub config: AppConfig,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(pool: PgPool, config: AppConfig) -> Self {
        Self {
            user_repo: UserRepository::new(pool.clone()),
            ayah_repo: AyahRepository::new(pool.clone()),
            event_repo: EventRepository::new(pool.clone()),
            item_repo: ItemStateRepository::new(pool.clone()),
            session_repo: SessionRepository::new(pool.clone()),
            daily_repo: DailySessionRepository::new(pool.clone()),
            transition_repo: TransitionRepository::new(pool.clone()),
            fluency_repo: FluencyRepository::new(pool.clone()),
            page_cache: PageCache::new(),
            pool,
            config,
            start_time: Instant::now(),
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health/live", get(live))
        .route("/health/ready", get(ready))
        .route(
            "/api/v1/assessment/submit",
            post(handlers::assessment::submit_assessment),
        )
        .route(
            "/api/v1/fluency-gate/start",
            post(handlers::fluency_gate::start_test),
        )
        .route(
            "/api/v1/fluency-gate/submit",
            post(handlers::fluency_gate::submit_test),
        )
        .route(
            "/api/v1/fluency-gate/status",
            get(handlers::fluency_gate::gate_status),
        )
        .route("/api/v1/queue/today", get(handlers::queue::today_queue))
        .route("/api/v1/session/start", post(handlers::session::start_session))
        .route(
            "/api/v1/session/step-complete",
            post(handlers::session::step_complete),
        )
        .route(
            "/api/v1/session/complete",
            post(handlers::session::complete_session),
        )
        .route("/api/v1/review/event", post(handlers::review_events::ingest_event))
        .route("/api/v1/user/stats", get(handlers::stats::user_stats))
        .route("/api/v1/user/calendar", get(handlers::stats::user_calendar))
        .route(
            "/api/v1/user/achievements",
            get(handlers::stats::user_achievements),
        )
        .route("/api/v1/user/progress", get(handlers::stats::user_progress))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Liveness check endpoint.
async fn live(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let uptime = state.start_time.elapsed().as_secs();

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
    })
}

/// Readiness check endpoint. 503 while the database is unreachable.
async fn ready(State(state): State<Arc<AppState>>) -> (StatusCode, Json<ReadyResponse>) {
    let db_status = match check_connection(&state.pool).await {
        Ok(()) => "connected",
        Err(_) => "disconnected",
    };

    let (status, body_status) = if db_status == "connected" {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status,
        Json(ReadyResponse {
            status: body_status.to_string(),
            database: db_status.to_string(),
        }),
    )
}
