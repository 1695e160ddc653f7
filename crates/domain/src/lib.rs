//! Domain types and the scheduling core for the hifz backend.

pub mod analytics;
pub mod assessment;
pub mod auth;
pub mod errors;
pub mod events;
pub mod fluency;
pub mod protocol;
pub mod queue;
pub mod reducer;
pub mod session;
pub mod spacing;
pub mod time;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use auth::*;
pub use errors::*;

/// Memorization tier of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "review_tier", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewTier {
    Sabaq,
    Sabqi,
    Manzil,
}

/// Lifecycle status of a per-item learning record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "item_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    Learning,
    Memorized,
    Reviewing,
    Paused,
}

/// Daily queue mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "queue_mode", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueMode {
    Normal,
    Consolidation,
    ReviewOnly,
}

/// Session run status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "session_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Active,
    Completed,
    Abandoned,
}

/// Scaffolding level assigned by the assessment planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "scaffolding_level", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScaffoldingLevel {
    Beginner,
    Standard,
    Minimal,
}

/// Program variant assigned by the assessment planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "program_variant", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgramVariant {
    Conservative,
    Standard,
    Momentum,
}

/// Self-reported tajwid confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "tajwid_confidence", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TajwidConfidence {
    Low,
    Medium,
    High,
}

/// Self-reported prior memorization, in juz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "prior_juz_band", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriorJuzBand {
    Zero,
    OneToFour,
    FivePlus,
}

/// Memorization goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "hifz_goal", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HifzGoal {
    FullQuran,
    JuzAmma,
    SelectedSurahs,
}

/// Step in the 3x3 session protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "step_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepType {
    Exposure,
    Guided,
    Blind,
    Link,
}

impl StepType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepType::Exposure => "EXPOSURE",
            StepType::Guided => "GUIDED",
            StepType::Blind => "BLIND",
            StepType::Link => "LINK",
        }
    }
}

/// Discriminator of the event-log sum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "event_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    ReviewAttempted,
    TransitionAttempted,
}

/// Session context an event was recorded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "session_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionType {
    Sabaq,
    Review,
    Warmup,
}

/// Fluency gate test status. Terminal statuses are immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "fluency_test_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FluencyTestStatus {
    InProgress,
    Passed,
    Failed,
}

/// User identity plus scheduling parameters.
///
/// Parameters are mutated only by assessment submission or fluency-gate
/// completion; everything else reads them.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub time_budget_minutes: i32,
    pub fluency_score: Option<f64>,
    pub fluency_gate_passed: bool,
    pub requires_pre_hifz: bool,
    pub scaffolding_level: ScaffoldingLevel,
    pub variant: ProgramVariant,
    pub daily_new_target_ayahs: i32,
    pub review_ratio_target: i32,
    pub retention_threshold: f64,
    pub backlog_freeze_ratio: f64,
    pub consolidation_retention_floor: f64,
    pub manzil_rotation_days: i32,
    pub avg_seconds_per_item: i32,
    pub overdue_cap_seconds: i64,
    pub prior_juz_band: Option<PriorJuzBand>,
    pub goal: Option<HifzGoal>,
    pub has_teacher: bool,
    pub tajwid_confidence: Option<TajwidConfidence>,
    pub assessment_completed_at: Option<DateTime<Utc>>,
}

/// One verse of the static corpus.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Ayah {
    pub id: i32,
    pub surah_number: i32,
    pub ayah_number: i32,
    pub juz_number: i32,
    pub page_number: i32,
    pub hizb_quarter: i32,
    pub text_uthmani: String,
}

/// Sparse per-(user, ayah) learning record.
///
/// Every field is a pure function of the ordered REVIEW_ATTEMPTED events for
/// the pair; the reducer overwrites the row wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserItemState {
    pub user_id: Uuid,
    pub ayah_id: i32,
    pub status: ItemStatus,
    pub tier: ReviewTier,
    pub next_review_at: DateTime<Utc>,
    pub review_interval_seconds: i64,
    pub interval_checkpoint_index: i32,
    pub introduced_at: DateTime<Utc>,
    pub first_memorized_at: Option<DateTime<Utc>>,
    pub difficulty_score: f64,
    pub total_reviews: i32,
    pub successful_reviews: i32,
    pub lapses: i32,
    pub success_streak: i32,
    pub consecutive_perfect_days: i32,
    pub last_perfect_day: Option<NaiveDate>,
    pub average_duration_seconds: f64,
    pub last_errors_count: i32,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub last_event_occurred_at: Option<DateTime<Utc>>,
}

/// One user sitting.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SessionRun {
    pub id: Uuid,
    pub user_id: Uuid,
    pub client_session_id: Option<Uuid>,
    pub mode: QueueMode,
    pub warmup_passed: bool,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub events_count: i32,
    pub minutes_total: i32,
}

/// Aggregate per (user, UTC day).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DailySession {
    pub user_id: Uuid,
    pub session_date: NaiveDate,
    pub mode: QueueMode,
    pub retention_score: f64,
    pub backlog_minutes_estimate: i32,
    pub overdue_days_max: i32,
    pub minutes_total: i32,
    pub reviews_total: i32,
    pub reviews_successful: i32,
    pub new_ayahs_memorized: i32,
    pub warmup_passed: bool,
    pub sabaq_allowed: bool,
}

/// Inter-ayah link strength for one (user, from, to) triple.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TransitionScore {
    pub user_id: Uuid,
    pub from_ayah_id: i32,
    pub to_ayah_id: i32,
    pub attempt_count: i32,
    pub success_count: i32,
    pub last_practiced_at: DateTime<Utc>,
}

impl TransitionScore {
    pub fn success_rate(&self) -> f64 {
        if self.attempt_count == 0 {
            0.0
        } else {
            self.success_count as f64 / self.attempt_count as f64
        }
    }

    /// Weak when practiced at least 3 times with under 70% success.
    pub fn is_weak(&self) -> bool {
        self.attempt_count >= 3 && self.success_rate() < 0.70
    }
}

/// Page-read fluency test.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FluencyGateTest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: FluencyTestStatus,
    pub test_page: i32,
    pub duration_seconds: Option<i32>,
    pub error_count: Option<i32>,
    pub fluency_score: Option<f64>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Ready check response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub database: String,
}
