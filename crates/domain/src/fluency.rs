//! Fluency gate scoring and its request/response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{Ayah, FluencyGateTest, FluencyTestStatus};

/// Minimum combined score to pass the gate.
pub const PASS_THRESHOLD: f64 = 70.0;

/// Time half of the score: full 50 under three minutes, then one point lost
/// per six seconds over.
pub fn time_score(duration_seconds: i32) -> f64 {
    if duration_seconds < 180 {
        50.0
    } else {
        (50.0 - (duration_seconds - 180) as f64 / 6.0).max(0.0)
    }
}

/// Accuracy half: full 50 under five errors, then five points per error over.
pub fn accuracy_score(error_count: i32) -> f64 {
    if error_count < 5 {
        50.0
    } else {
        (50.0 - ((error_count - 5) * 5) as f64).max(0.0)
    }
}

pub fn fluency_score(duration_seconds: i32, error_count: i32) -> f64 {
    time_score(duration_seconds) + accuracy_score(error_count)
}

pub fn passes(score: f64) -> bool {
    score >= PASS_THRESHOLD
}

/// Start response: the page to read aloud.
#[derive(Debug, Serialize)]
pub struct StartFluencyTestResponse {
    pub test_id: Uuid,
    pub page_number: i32,
    pub ayahs: Vec<Ayah>,
}

/// Submission of a completed page read.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitFluencyTestRequest {
    pub test_id: Uuid,
    #[validate(range(min = 1))]
    pub duration_seconds: i32,
    #[validate(range(min = 0))]
    pub error_count: i32,
}

#[derive(Debug, Serialize)]
pub struct SubmitFluencyTestResponse {
    pub test_id: Uuid,
    pub status: FluencyTestStatus,
    pub fluency_score: f64,
    pub time_score: f64,
    pub accuracy_score: f64,
    pub passed: bool,
}

/// Gate status: user flags plus the most recent test, if any.
#[derive(Debug, Serialize)]
pub struct FluencyGateStatusResponse {
    pub fluency_gate_passed: bool,
    pub requires_pre_hifz: bool,
    pub fluency_score: Option<f64>,
    pub latest_test: Option<FluencyGateTest>,
}

/// Completed-test fields written on submission.
#[derive(Debug, Clone, Copy)]
pub struct FluencyTestResult {
    pub status: FluencyTestStatus,
    pub duration_seconds: i32,
    pub error_count: i32,
    pub fluency_score: f64,
    pub completed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1, 50.0)]
    #[case(179, 50.0)]
    #[case(180, 50.0)]
    #[case(240, 40.0)]
    #[case(480, 0.0)]
    #[case(600, 0.0)]
    fn time_score_decays_past_three_minutes(#[case] duration: i32, #[case] expected: f64) {
        assert!((time_score(duration) - expected).abs() < 1e-9);
    }

    #[rstest]
    #[case(0, 50.0)]
    #[case(4, 50.0)]
    #[case(5, 50.0)]
    #[case(7, 40.0)]
    #[case(15, 0.0)]
    #[case(30, 0.0)]
    fn accuracy_score_decays_past_five_errors(#[case] errors: i32, #[case] expected: f64) {
        assert!((accuracy_score(errors) - expected).abs() < 1e-9);
    }

    #[test]
    fn fast_clean_read_scores_full_marks() {
        let score = fluency_score(175, 3);
        assert!((score - 100.0).abs() < 1e-9);
        assert!(passes(score));
    }

    #[test]
    fn pass_threshold_is_seventy() {
        assert!(passes(70.0));
        assert!(!passes(69.9));
    }

    #[test]
    fn slow_error_heavy_read_fails() {
        // 300s -> 30 time points, 9 errors -> 30 accuracy points.
        let score = fluency_score(300, 9);
        assert!((score - 60.0).abs() < 1e-9);
        assert!(!passes(score));
    }
}
