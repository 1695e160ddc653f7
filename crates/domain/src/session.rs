//! Session lifecycle request/response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{DailySession, QueueMode};

/// POST /session/start body. All fields optional: the planner supplies mode
/// and warm-up state unless the client pins them.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct StartSessionRequest {
    /// Supplied for idempotent starts: the same id returns the same session.
    pub client_session_id: Option<Uuid>,
    pub mode: Option<QueueMode>,
    pub warmup_passed: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub session_id: Uuid,
    pub mode: QueueMode,
    pub warmup_passed: bool,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CompleteSessionRequest {
    pub session_id: Uuid,
}

/// Completion response: the upserted daily aggregate plus the day's XP.
#[derive(Debug, Serialize)]
pub struct CompleteSessionResponse {
    pub daily: DailySession,
    pub xp: i64,
}
