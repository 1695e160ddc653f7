//! Deterministic replay of review events into per-item state.
//!
//! `reduce` is a pure left-fold over the REVIEW_ATTEMPTED events for one
//! (user, ayah) pair, ordered by `(occurred_at, id)`. Running it twice over
//! the same sequence yields the same state, which is what makes the stored
//! row safe to rebuild at any time.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use uuid::Uuid;

use crate::spacing::{self, Outcome};
use crate::time::days_between;
use crate::{ItemStatus, ReviewTier, UserItemState};

/// The slice of a REVIEW_ATTEMPTED event the fold consumes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReviewAttempt {
    pub occurred_at: DateTime<Utc>,
    pub success: bool,
    pub errors_count: i32,
    pub duration_seconds: i32,
}

/// Number of consecutive perfect UTC days required to hold MANZIL.
pub const PROMOTION_GATE_DAYS: i32 = 7;

/// Fold the ordered event sequence into item state.
///
/// Returns `None` for an empty sequence: rows exist only once the user has
/// begun the ayah.
pub fn reduce(user_id: Uuid, ayah_id: i32, events: &[ReviewAttempt]) -> Option<UserItemState> {
    let first = events.first()?;

    let mut checkpoint = 0i32;
    let mut difficulty = 0.0f64;
    let mut total_reviews = 0i32;
    let mut successful_reviews = 0i32;
    let mut lapses = 0i32;
    let mut success_streak = 0i32;
    let mut consecutive_perfect_days = 0i32;
    let mut last_perfect_day: Option<NaiveDate> = None;
    let mut first_memorized_at: Option<DateTime<Utc>> = None;
    let mut duration_sum = 0.0f64;
    let mut last_errors_count = 0i32;
    let mut next_review_at = first.occurred_at;
    let mut last_occurred_at = first.occurred_at;

    for event in events {
        let outcome = spacing::classify(event.success, event.errors_count);
        checkpoint = spacing::next_checkpoint(checkpoint, outcome);
        next_review_at = event.occurred_at + Duration::seconds(spacing::interval_seconds(checkpoint));

        total_reviews += 1;
        if event.success {
            successful_reviews += 1;
            success_streak += 1;
        } else {
            lapses += 1;
            success_streak = 0;
        }

        difficulty = spacing::apply_difficulty(difficulty, outcome);
        duration_sum += event.duration_seconds as f64;
        last_errors_count = event.errors_count;
        last_occurred_at = event.occurred_at;

        apply_promotion_gate(
            outcome,
            event.occurred_at.date_naive(),
            &mut consecutive_perfect_days,
            &mut last_perfect_day,
        );

        if first_memorized_at.is_none() && checkpoint >= 2 {
            first_memorized_at = Some(event.occurred_at);
        }
    }

    let tier = effective_tier(checkpoint, consecutive_perfect_days);
    let status = if checkpoint >= 2 {
        ItemStatus::Memorized
    } else {
        ItemStatus::Learning
    };

    Some(UserItemState {
        user_id,
        ayah_id,
        status,
        tier,
        next_review_at,
        review_interval_seconds: spacing::interval_seconds(checkpoint),
        interval_checkpoint_index: checkpoint,
        introduced_at: first.occurred_at,
        first_memorized_at,
        difficulty_score: difficulty,
        total_reviews,
        successful_reviews,
        lapses,
        success_streak,
        consecutive_perfect_days,
        last_perfect_day,
        average_duration_seconds: duration_sum / total_reviews as f64,
        last_errors_count,
        last_reviewed_at: Some(last_occurred_at),
        last_event_occurred_at: Some(last_occurred_at),
    })
}

/// Track the run of consecutive perfect UTC days.
///
/// A perfect attempt on the day after the previous perfect day extends the
/// run; a perfect attempt on the same day keeps it; a gap restarts it at 1.
/// Any imperfect attempt clears the run entirely.
fn apply_promotion_gate(
    outcome: Outcome,
    day: NaiveDate,
    consecutive_perfect_days: &mut i32,
    last_perfect_day: &mut Option<NaiveDate>,
) {
    if outcome == Outcome::Perfect {
        *consecutive_perfect_days = match *last_perfect_day {
            None => 1,
            Some(prev) if day == prev => *consecutive_perfect_days,
            Some(prev) if days_between(prev, day) == 1 => *consecutive_perfect_days + 1,
            Some(_) => 1,
        };
        *last_perfect_day = Some(day);
    } else {
        *consecutive_perfect_days = 0;
        *last_perfect_day = None;
    }
}

/// Checkpoint-derived tier, demoted below MANZIL until the promotion gate
/// is earned.
pub fn effective_tier(checkpoint: i32, consecutive_perfect_days: i32) -> ReviewTier {
    let derived = spacing::tier_for_checkpoint(checkpoint);
    if derived == ReviewTier::Manzil && consecutive_perfect_days < PROMOTION_GATE_DAYS {
        ReviewTier::Sabqi
    } else {
        derived
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn perfect(when: &str) -> ReviewAttempt {
        ReviewAttempt {
            occurred_at: at(when),
            success: true,
            errors_count: 0,
            duration_seconds: 40,
        }
    }

    fn user() -> Uuid {
        Uuid::from_u128(1)
    }

    #[test]
    fn empty_sequence_produces_no_row() {
        assert_eq!(reduce(user(), 1, &[]), None);
    }

    #[test]
    fn single_perfect_event() {
        let state = reduce(user(), 1, &[perfect("2026-02-01T10:00:00Z")]).unwrap();
        assert_eq!(state.interval_checkpoint_index, 1);
        assert_eq!(state.review_interval_seconds, 8 * 3600);
        assert_eq!(state.next_review_at, at("2026-02-01T18:00:00Z"));
        assert_eq!(state.status, ItemStatus::Learning);
        assert_eq!(state.tier, ReviewTier::Sabaq);
        assert_eq!(state.consecutive_perfect_days, 1);
        assert_eq!(state.first_memorized_at, None);
        assert_eq!(state.introduced_at, at("2026-02-01T10:00:00Z"));
    }

    #[test]
    fn minor_outcome_holds_checkpoint_and_streak() {
        let events = [
            perfect("2026-02-01T10:00:00Z"),
            ReviewAttempt {
                occurred_at: at("2026-02-01T19:00:00Z"),
                success: true,
                errors_count: 2,
                duration_seconds: 60,
            },
        ];
        let state = reduce(user(), 1, &events).unwrap();
        assert_eq!(state.interval_checkpoint_index, 1);
        assert_eq!(state.success_streak, 2);
        assert_eq!(state.successful_reviews, 2);
        assert_eq!(state.lapses, 0);
        // A minor attempt is not perfect: the run clears.
        assert_eq!(state.consecutive_perfect_days, 0);
        assert_eq!(state.last_perfect_day, None);
    }

    #[test]
    fn fail_resets_ladder_and_counts_lapse() {
        let events = [
            perfect("2026-02-01T10:00:00Z"),
            perfect("2026-02-02T10:00:00Z"),
            perfect("2026-02-03T10:00:00Z"),
            ReviewAttempt {
                occurred_at: at("2026-02-04T10:00:00Z"),
                success: false,
                errors_count: 3,
                duration_seconds: 90,
            },
        ];
        let state = reduce(user(), 2, &events).unwrap();
        assert_eq!(state.interval_checkpoint_index, 0);
        assert_eq!(state.review_interval_seconds, 14_400);
        assert_eq!(state.consecutive_perfect_days, 0);
        assert_eq!(state.last_perfect_day, None);
        assert_eq!(state.tier, ReviewTier::Sabaq);
        assert_eq!(state.lapses, 1);
        assert_eq!(state.success_streak, 0);
        // Once set, the memorization timestamp survives the lapse.
        assert_eq!(state.first_memorized_at, Some(at("2026-02-02T10:00:00Z")));
        assert_eq!(state.status, ItemStatus::Learning);
    }

    #[test]
    fn first_memorized_at_is_frozen() {
        let mut events = vec![
            perfect("2026-02-01T10:00:00Z"),
            perfect("2026-02-02T10:00:00Z"),
        ];
        let early = reduce(user(), 3, &events).unwrap();
        assert_eq!(early.first_memorized_at, Some(at("2026-02-02T10:00:00Z")));

        events.push(ReviewAttempt {
            occurred_at: at("2026-02-03T10:00:00Z"),
            success: false,
            errors_count: 5,
            duration_seconds: 120,
        });
        events.push(perfect("2026-02-04T10:00:00Z"));
        events.push(perfect("2026-02-05T10:00:00Z"));
        let later = reduce(user(), 3, &events).unwrap();
        assert_eq!(later.first_memorized_at, Some(at("2026-02-02T10:00:00Z")));
    }

    #[test]
    fn same_day_perfects_keep_the_run() {
        let events = [
            perfect("2026-02-01T08:00:00Z"),
            perfect("2026-02-01T20:00:00Z"),
            perfect("2026-02-02T09:00:00Z"),
        ];
        let state = reduce(user(), 4, &events).unwrap();
        assert_eq!(state.consecutive_perfect_days, 2);
    }

    #[test]
    fn gap_in_perfect_days_restarts_run_at_one() {
        let events = [
            perfect("2026-02-01T10:00:00Z"),
            perfect("2026-02-02T10:00:00Z"),
            perfect("2026-02-05T10:00:00Z"),
        ];
        let state = reduce(user(), 5, &events).unwrap();
        assert_eq!(state.consecutive_perfect_days, 1);
        assert_eq!(
            state.last_perfect_day,
            Some(NaiveDate::from_ymd_opt(2026, 2, 5).unwrap())
        );
    }

    #[test]
    fn manzil_requires_seven_perfect_days() {
        // Climb to checkpoint 6 with six consecutive perfect days: the
        // checkpoint-derived tier is MANZIL but the gate demotes to SABQI.
        let days: Vec<ReviewAttempt> = (1..=6)
            .map(|d| perfect(&format!("2026-02-{d:02}T10:00:00Z")))
            .collect();
        let state = reduce(user(), 6, &days).unwrap();
        assert_eq!(state.interval_checkpoint_index, 6);
        assert_eq!(state.consecutive_perfect_days, 6);
        assert_eq!(state.tier, ReviewTier::Sabqi);

        let days: Vec<ReviewAttempt> = (1..=7)
            .map(|d| perfect(&format!("2026-02-{d:02}T10:00:00Z")))
            .collect();
        let state = reduce(user(), 6, &days).unwrap();
        assert_eq!(state.consecutive_perfect_days, 7);
        assert_eq!(state.tier, ReviewTier::Manzil);
    }

    #[test]
    fn average_duration_is_running_mean() {
        let events = [
            ReviewAttempt {
                occurred_at: at("2026-02-01T10:00:00Z"),
                success: true,
                errors_count: 0,
                duration_seconds: 30,
            },
            ReviewAttempt {
                occurred_at: at("2026-02-01T11:00:00Z"),
                success: true,
                errors_count: 0,
                duration_seconds: 90,
            },
        ];
        let state = reduce(user(), 7, &events).unwrap();
        assert!((state.average_duration_seconds - 60.0).abs() < 1e-9);
    }

    proptest! {
        /// Replay determinism: folding the same ordered sequence twice gives
        /// identical state.
        #[test]
        fn replay_is_deterministic(
            seed in proptest::collection::vec((0i64..2_000_000, any::<bool>(), 0i32..6, 1i32..300), 1..40)
        ) {
            let base = at("2026-01-01T00:00:00Z");
            let mut events: Vec<ReviewAttempt> = seed
                .into_iter()
                .map(|(offset, success, errors, duration)| ReviewAttempt {
                    occurred_at: base + Duration::seconds(offset),
                    success,
                    errors_count: errors,
                    duration_seconds: duration,
                })
                .collect();
            events.sort_by_key(|e| e.occurred_at);

            let a = reduce(user(), 10, &events).unwrap();
            let b = reduce(user(), 10, &events).unwrap();
            prop_assert_eq!(&a, &b);

            // Structural invariants that must hold for every sequence.
            prop_assert!(a.interval_checkpoint_index >= 0 && a.interval_checkpoint_index <= 7);
            prop_assert!(a.difficulty_score >= 0.0 && a.difficulty_score <= 1.0);
            prop_assert_eq!(a.total_reviews, a.successful_reviews + a.lapses);
            if a.tier == ReviewTier::Manzil {
                prop_assert!(a.consecutive_perfect_days >= PROMOTION_GATE_DAYS);
            }
        }
    }
}
