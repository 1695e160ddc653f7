//! Server-side 3x3 step-protocol state machine.
//!
//! The state for one (session, ayah) is nothing but the multiset of
//! (step, attempt) pairs already recorded in the event log; validation and
//! progress are recomputed from it on every submission.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{ScaffoldingLevel, StepType};

/// One step of a protocol: how many attempts it takes and whether the
/// scaffolding makes it optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolStep {
    pub step: StepType,
    pub attempts: i32,
    pub optional: bool,
}

const BEGINNER: [ProtocolStep; 4] = [
    ProtocolStep { step: StepType::Exposure, attempts: 3, optional: false },
    ProtocolStep { step: StepType::Guided, attempts: 3, optional: false },
    ProtocolStep { step: StepType::Blind, attempts: 3, optional: false },
    ProtocolStep { step: StepType::Link, attempts: 3, optional: false },
];

const STANDARD: [ProtocolStep; 4] = [
    ProtocolStep { step: StepType::Exposure, attempts: 3, optional: false },
    ProtocolStep { step: StepType::Guided, attempts: 1, optional: false },
    ProtocolStep { step: StepType::Blind, attempts: 3, optional: false },
    ProtocolStep { step: StepType::Link, attempts: 3, optional: false },
];

const MINIMAL: [ProtocolStep; 4] = [
    ProtocolStep { step: StepType::Exposure, attempts: 3, optional: true },
    ProtocolStep { step: StepType::Guided, attempts: 3, optional: true },
    ProtocolStep { step: StepType::Blind, attempts: 3, optional: false },
    ProtocolStep { step: StepType::Link, attempts: 3, optional: false },
];

/// Canonical protocol for a scaffolding level.
pub fn protocol_for(level: ScaffoldingLevel) -> &'static [ProtocolStep] {
    match level {
        ScaffoldingLevel::Beginner => &BEGINNER,
        ScaffoldingLevel::Standard => &STANDARD,
        ScaffoldingLevel::Minimal => &MINIMAL,
    }
}

/// Observed attempt counts per step within one (session, ayah).
pub type StepCounts = HashMap<StepType, i32>;

/// What the protocol expects next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Expectation {
    pub completed: bool,
    pub expected_step: Option<StepType>,
    pub expected_attempt: Option<i32>,
}

/// First non-optional step whose observed count is below its required
/// attempts. All satisfied means the ayah is complete for this session.
pub fn expected(protocol: &[ProtocolStep], counts: &StepCounts) -> Expectation {
    for entry in protocol.iter().filter(|entry| !entry.optional) {
        let observed = counts.get(&entry.step).copied().unwrap_or(0);
        if observed < entry.attempts {
            return Expectation {
                completed: false,
                expected_step: Some(entry.step),
                expected_attempt: Some(observed + 1),
            };
        }
    }
    Expectation {
        completed: true,
        expected_step: None,
        expected_attempt: None,
    }
}

/// Validate a submitted (step, attempt) against the protocol state.
///
/// Optional steps may be interleaved only while all mandatory pre-blind work
/// is already satisfied (the expected step is BLIND), and only in their own
/// attempt order. Everything else must match the expectation exactly.
pub fn validate_submission(
    protocol: &[ProtocolStep],
    counts: &StepCounts,
    step: StepType,
    attempt: i32,
) -> Result<(), Expectation> {
    let expectation = expected(protocol, counts);
    if expectation.completed {
        return Err(expectation);
    }

    let entry = protocol.iter().find(|entry| entry.step == step);
    if let Some(entry) = entry.filter(|entry| entry.optional) {
        let observed = counts.get(&step).copied().unwrap_or(0);
        if expectation.expected_step == Some(StepType::Blind)
            && attempt == observed + 1
            && attempt <= entry.attempts
        {
            return Ok(());
        }
        return Err(expectation);
    }

    if expectation.expected_step == Some(step) && expectation.expected_attempt == Some(attempt) {
        Ok(())
    } else {
        Err(expectation)
    }
}

/// Where the submission left this ayah.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    InProgress,
    StepComplete,
    AyahComplete,
}

/// Status of the just-submitted step given the updated counts.
pub fn step_status_after(protocol: &[ProtocolStep], counts: &StepCounts, step: StepType) -> StepStatus {
    if expected(protocol, counts).completed {
        return StepStatus::AyahComplete;
    }
    let required = protocol
        .iter()
        .find(|entry| entry.step == step)
        .map(|entry| entry.attempts)
        .unwrap_or(0);
    if counts.get(&step).copied().unwrap_or(0) < required {
        StepStatus::InProgress
    } else {
        StepStatus::StepComplete
    }
}

/// One protocol row plus observed progress, for responses and 409 bodies.
#[derive(Debug, Clone, Serialize)]
pub struct ProtocolStepSummary {
    pub step: StepType,
    pub required_attempts: i32,
    pub optional: bool,
    pub completed_attempts: i32,
}

pub fn summarize(protocol: &[ProtocolStep], counts: &StepCounts) -> Vec<ProtocolStepSummary> {
    protocol
        .iter()
        .map(|entry| ProtocolStepSummary {
            step: entry.step,
            required_attempts: entry.attempts,
            optional: entry.optional,
            completed_attempts: counts.get(&entry.step).copied().unwrap_or(0),
        })
        .collect()
}

/// Body of an INVALID_STEP_SEQUENCE response.
#[derive(Debug, Serialize)]
pub struct StepSequenceViolation {
    pub error: &'static str,
    pub expected_step: Option<StepType>,
    pub expected_attempt: Option<i32>,
    pub protocol: Vec<ProtocolStepSummary>,
}

impl StepSequenceViolation {
    pub fn new(expectation: Expectation, protocol: Vec<ProtocolStepSummary>) -> Self {
        Self {
            error: "INVALID_STEP_SEQUENCE",
            expected_step: expectation.expected_step,
            expected_attempt: expectation.expected_attempt,
            protocol,
        }
    }
}

/// Step submission.
#[derive(Debug, Deserialize, Validate)]
pub struct StepCompleteRequest {
    pub session_id: Uuid,
    #[validate(range(min = 1, max = 6236))]
    pub ayah_id: i32,
    pub step_type: StepType,
    #[validate(range(min = 1, max = 3))]
    pub attempt_number: i32,
    pub success: bool,
    #[validate(range(min = 0))]
    pub errors_count: i32,
    #[validate(range(min = 1))]
    pub duration_seconds: i32,
    #[serde(default)]
    pub scaffolding_used: bool,
    pub linked_ayah_id: Option<i32>,
    #[serde(default)]
    pub error_tags: Option<Vec<String>>,
}

/// Aggregate protocol progress.
#[derive(Debug, Serialize)]
pub struct ProtocolProgress {
    pub required_attempts_total: i32,
    pub required_attempts_completed: i32,
    pub ayah_complete: bool,
}

pub fn progress(protocol: &[ProtocolStep], counts: &StepCounts) -> ProtocolProgress {
    let required: i32 = protocol
        .iter()
        .filter(|entry| !entry.optional)
        .map(|entry| entry.attempts)
        .sum();
    let completed: i32 = protocol
        .iter()
        .filter(|entry| !entry.optional)
        .map(|entry| {
            counts
                .get(&entry.step)
                .copied()
                .unwrap_or(0)
                .min(entry.attempts)
        })
        .sum();
    ProtocolProgress {
        required_attempts_total: required,
        required_attempts_completed: completed,
        ayah_complete: expected(protocol, counts).completed,
    }
}

#[derive(Debug, Serialize)]
pub struct StepCompleteResponse {
    pub recorded: bool,
    pub deduplicated: bool,
    pub step_status: StepStatus,
    pub next_step: Option<StepType>,
    pub next_attempt: Option<i32>,
    pub protocol: Vec<ProtocolStepSummary>,
    pub progress: ProtocolProgress,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(pairs: &[(StepType, i32)]) -> StepCounts {
        pairs.iter().copied().collect()
    }

    #[test]
    fn fresh_standard_expects_first_exposure() {
        let protocol = protocol_for(ScaffoldingLevel::Standard);
        let expectation = expected(protocol, &StepCounts::new());
        assert!(!expectation.completed);
        assert_eq!(expectation.expected_step, Some(StepType::Exposure));
        assert_eq!(expectation.expected_attempt, Some(1));
    }

    #[test]
    fn standard_guided_takes_one_attempt() {
        let protocol = protocol_for(ScaffoldingLevel::Standard);
        let state = counts(&[(StepType::Exposure, 3)]);
        let expectation = expected(protocol, &state);
        assert_eq!(expectation.expected_step, Some(StepType::Guided));
        assert_eq!(expectation.expected_attempt, Some(1));

        let state = counts(&[(StepType::Exposure, 3), (StepType::Guided, 1)]);
        let expectation = expected(protocol, &state);
        assert_eq!(expectation.expected_step, Some(StepType::Blind));
    }

    #[test]
    fn beginner_guided_takes_three_attempts() {
        let protocol = protocol_for(ScaffoldingLevel::Beginner);
        let state = counts(&[(StepType::Exposure, 3), (StepType::Guided, 1)]);
        let expectation = expected(protocol, &state);
        assert_eq!(expectation.expected_step, Some(StepType::Guided));
        assert_eq!(expectation.expected_attempt, Some(2));
    }

    #[test]
    fn full_sequence_completes() {
        let protocol = protocol_for(ScaffoldingLevel::Standard);
        let state = counts(&[
            (StepType::Exposure, 3),
            (StepType::Guided, 1),
            (StepType::Blind, 3),
            (StepType::Link, 3),
        ]);
        let expectation = expected(protocol, &state);
        assert!(expectation.completed);
        assert_eq!(expectation.expected_step, None);
    }

    #[test]
    fn link_before_exposure_is_rejected_with_expectation() {
        let protocol = protocol_for(ScaffoldingLevel::Standard);
        let err = validate_submission(protocol, &StepCounts::new(), StepType::Link, 1).unwrap_err();
        assert_eq!(err.expected_step, Some(StepType::Exposure));
        assert_eq!(err.expected_attempt, Some(1));
    }

    #[test]
    fn attempt_number_must_match_exactly() {
        let protocol = protocol_for(ScaffoldingLevel::Standard);
        let state = counts(&[(StepType::Exposure, 1)]);
        assert!(validate_submission(protocol, &state, StepType::Exposure, 2).is_ok());
        assert!(validate_submission(protocol, &state, StepType::Exposure, 1).is_err());
        assert!(validate_submission(protocol, &state, StepType::Exposure, 3).is_err());
    }

    #[test]
    fn completed_ayah_rejects_further_steps() {
        let protocol = protocol_for(ScaffoldingLevel::Standard);
        let state = counts(&[
            (StepType::Exposure, 3),
            (StepType::Guided, 1),
            (StepType::Blind, 3),
            (StepType::Link, 3),
        ]);
        let err = validate_submission(protocol, &state, StepType::Link, 3).unwrap_err();
        assert!(err.completed);
    }

    #[test]
    fn minimal_allows_optional_steps_while_blind_is_expected() {
        let protocol = protocol_for(ScaffoldingLevel::Minimal);
        // Fresh ayah: expected step is BLIND, but optional EXPOSURE may run.
        assert!(validate_submission(protocol, &StepCounts::new(), StepType::Exposure, 1).is_ok());
        assert!(validate_submission(protocol, &StepCounts::new(), StepType::Guided, 1).is_ok());
        assert!(validate_submission(protocol, &StepCounts::new(), StepType::Blind, 1).is_ok());

        // Optional attempts follow their own ordering.
        let state = counts(&[(StepType::Exposure, 1)]);
        assert!(validate_submission(protocol, &state, StepType::Exposure, 2).is_ok());
        assert!(validate_submission(protocol, &state, StepType::Exposure, 1).is_err());

        // An optional step cannot exceed its attempt budget.
        let state = counts(&[(StepType::Exposure, 3)]);
        assert!(validate_submission(protocol, &state, StepType::Exposure, 4).is_err());
    }

    #[test]
    fn minimal_rejects_optional_once_blind_is_done() {
        let protocol = protocol_for(ScaffoldingLevel::Minimal);
        let state = counts(&[(StepType::Blind, 3)]);
        // Expected step is LINK now; optional work can no longer interleave.
        assert!(validate_submission(protocol, &state, StepType::Exposure, 1).is_err());
        assert!(validate_submission(protocol, &state, StepType::Link, 1).is_ok());
    }

    #[test]
    fn step_status_tracks_submission() {
        let protocol = protocol_for(ScaffoldingLevel::Standard);
        let state = counts(&[(StepType::Exposure, 1)]);
        assert_eq!(
            step_status_after(protocol, &state, StepType::Exposure),
            StepStatus::InProgress
        );
        let state = counts(&[(StepType::Exposure, 3)]);
        assert_eq!(
            step_status_after(protocol, &state, StepType::Exposure),
            StepStatus::StepComplete
        );
        let state = counts(&[
            (StepType::Exposure, 3),
            (StepType::Guided, 1),
            (StepType::Blind, 3),
            (StepType::Link, 3),
        ]);
        assert_eq!(
            step_status_after(protocol, &state, StepType::Link),
            StepStatus::AyahComplete
        );
    }

    #[test]
    fn progress_counts_only_required_attempts() {
        let protocol = protocol_for(ScaffoldingLevel::Minimal);
        let state = counts(&[(StepType::Exposure, 2), (StepType::Blind, 1)]);
        let progress = progress(protocol, &state);
        assert_eq!(progress.required_attempts_total, 6);
        assert_eq!(progress.required_attempts_completed, 1);
        assert!(!progress.ayah_complete);
    }
}
