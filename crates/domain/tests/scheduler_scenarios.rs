//! End-to-end scheduler scenarios exercised against the pure core.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use hifz_backend_domain::protocol::{self, StepCounts};
use hifz_backend_domain::queue::{self, WarmupEvaluation};
use hifz_backend_domain::reducer::{ReviewAttempt, reduce};
use hifz_backend_domain::{
    ItemStatus, QueueMode, ReviewTier, ScaffoldingLevel, StepType, fluency,
};

fn at(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

fn user() -> Uuid {
    Uuid::from_u128(7)
}

/// Eight perfect reviews on consecutive UTC days climb the full ladder and
/// earn MANZIL through the promotion gate.
#[test]
fn perfect_ladder_climb() {
    let events: Vec<ReviewAttempt> = (1..=8)
        .map(|day| ReviewAttempt {
            occurred_at: at(&format!("2026-02-{day:02}T10:00:00Z")),
            success: true,
            errors_count: 0,
            duration_seconds: 45,
        })
        .collect();

    let state = reduce(user(), 1, &events).unwrap();
    assert_eq!(state.interval_checkpoint_index, 7);
    assert_eq!(state.review_interval_seconds, 7_776_000);
    assert_eq!(state.consecutive_perfect_days, 8);
    assert_eq!(state.tier, ReviewTier::Manzil);
    assert_eq!(state.status, ItemStatus::Memorized);
    assert_eq!(state.next_review_at, at("2026-02-08T10:00:00Z") + chrono::Duration::days(90));
    // Memorization is stamped by the event that first reaches checkpoint 2.
    assert_eq!(state.first_memorized_at, Some(at("2026-02-02T10:00:00Z")));
}

/// A fail after three perfect reviews resets the ladder, the interval and
/// the promotion-gate run.
#[test]
fn fail_resets_ladder() {
    let mut events: Vec<ReviewAttempt> = (1..=3)
        .map(|day| ReviewAttempt {
            occurred_at: at(&format!("2026-02-{day:02}T10:00:00Z")),
            success: true,
            errors_count: 0,
            duration_seconds: 45,
        })
        .collect();

    let climbed = reduce(user(), 2, &events).unwrap();
    assert_eq!(climbed.interval_checkpoint_index, 3);
    assert_eq!(climbed.review_interval_seconds, 3 * 86_400);

    events.push(ReviewAttempt {
        occurred_at: at("2026-02-04T10:00:00Z"),
        success: false,
        errors_count: 3,
        duration_seconds: 80,
    });
    let state = reduce(user(), 2, &events).unwrap();
    assert_eq!(state.interval_checkpoint_index, 0);
    assert_eq!(state.review_interval_seconds, 14_400);
    assert_eq!(state.consecutive_perfect_days, 0);
    assert_eq!(state.last_perfect_day, None);
    assert_eq!(state.tier, ReviewTier::Sabaq);
}

/// Queue under debt: a 60-minute budget with 90 due items freezes Sabaq.
#[test]
fn queue_under_debt() {
    let now = at("2026-02-11T12:00:00Z");
    let debt = queue::debt_metrics(90, Some(at("2026-02-11T10:00:00Z")), now, 75, 60, 0.8);
    assert_eq!(debt.backlog_minutes_estimate, 113);
    assert_eq!(debt.freeze_threshold_minutes, 48);
    assert_eq!(debt.overdue_days_max, 0);

    let warmup = WarmupEvaluation::vacuous();
    let mode = queue::select_mode(&debt, &warmup, 1.0, 0.85);
    assert_eq!(mode, QueueMode::ReviewOnly);

    let task = queue::sabaq_task(mode, &warmup, 7);
    assert!(!task.allowed);
    assert_eq!(task.target_ayahs, 0);
    assert_eq!(task.blocked_reason, queue::BlockedReason::ModeReviewOnly);
}

/// A LINK step submitted first violates the STANDARD protocol, reporting
/// first EXPOSURE attempt as expected.
#[test]
fn step_sequence_violation() {
    let proto = protocol::protocol_for(ScaffoldingLevel::Standard);
    let err =
        protocol::validate_submission(proto, &StepCounts::new(), StepType::Link, 1).unwrap_err();
    assert_eq!(err.expected_step, Some(StepType::Exposure));
    assert_eq!(err.expected_attempt, Some(1));

    let violation =
        protocol::StepSequenceViolation::new(err, protocol::summarize(proto, &StepCounts::new()));
    assert_eq!(violation.error, "INVALID_STEP_SEQUENCE");
    assert_eq!(violation.protocol.len(), 4);
}

/// Fluency gate: a fast, nearly clean read scores 100 and passes.
#[test]
fn fluency_gate_pass() {
    assert_eq!(fluency::time_score(175), 50.0);
    assert_eq!(fluency::accuracy_score(3), 50.0);
    let score = fluency::fluency_score(175, 3);
    assert_eq!(score, 100.0);
    assert!(fluency::passes(score));
}
