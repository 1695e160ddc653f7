//! Today-queue planning: debt metrics, warm-up gating, mode selection and
//! list construction.
//!
//! Everything here is a request-scoped pure computation; the api crate feeds
//! it rows and user parameters and serializes the result.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{QueueMode, ReviewTier, TransitionScore, UserItemState};

/// Review-debt snapshot for one user at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DebtMetrics {
    pub due_count: i64,
    pub backlog_minutes_estimate: i64,
    pub overdue_days_max: i64,
    pub freeze_threshold_minutes: i64,
}

impl DebtMetrics {
    pub fn zero(time_budget_minutes: i32, backlog_freeze_ratio: f64) -> Self {
        Self {
            due_count: 0,
            backlog_minutes_estimate: 0,
            overdue_days_max: 0,
            freeze_threshold_minutes: freeze_threshold(time_budget_minutes, backlog_freeze_ratio),
        }
    }

    /// Debt-freeze triggers strictly past the threshold, or past two days of
    /// overdue age.
    pub fn frozen(&self) -> bool {
        self.backlog_minutes_estimate > self.freeze_threshold_minutes || self.overdue_days_max > 2
    }
}

fn freeze_threshold(time_budget_minutes: i32, backlog_freeze_ratio: f64) -> i64 {
    (time_budget_minutes as f64 * backlog_freeze_ratio).floor() as i64
}

/// Compute debt metrics from the due set.
pub fn debt_metrics(
    due_count: i64,
    earliest_due_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    avg_seconds_per_item: i32,
    time_budget_minutes: i32,
    backlog_freeze_ratio: f64,
) -> DebtMetrics {
    let backlog_seconds = due_count * avg_seconds_per_item as i64;
    let backlog_minutes_estimate = {
        let d = backlog_seconds / 60;
        let r = backlog_seconds % 60;
        if r > 0 { d + 1 } else { d }
    };

    let overdue_days_max = match earliest_due_at {
        Some(earliest) if earliest <= now => (now - earliest).num_seconds() / 86_400,
        _ => 0,
    };

    DebtMetrics {
        due_count,
        backlog_minutes_estimate,
        overdue_days_max,
        freeze_threshold_minutes: freeze_threshold(time_budget_minutes, backlog_freeze_ratio),
    }
}

/// One warm-up attempt against an item introduced yesterday.
#[derive(Debug, Clone, Copy)]
pub struct WarmupAttempt {
    pub ayah_id: i32,
    pub success: bool,
    pub errors_count: i32,
}

/// Warm-up verdict across all items introduced the prior UTC day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WarmupEvaluation {
    pub passed: bool,
    pub failed: bool,
    pub pending: bool,
    pub passing_ayah_ids: Vec<i32>,
    pub failing_ayah_ids: Vec<i32>,
    pub pending_ayah_ids: Vec<i32>,
}

impl WarmupEvaluation {
    /// Nothing introduced yesterday: vacuously passed, so brand-new users
    /// can begin Sabaq immediately.
    pub fn vacuous() -> Self {
        Self {
            passed: true,
            failed: false,
            pending: false,
            passing_ayah_ids: Vec::new(),
            failing_ayah_ids: Vec::new(),
            pending_ayah_ids: Vec::new(),
        }
    }
}

/// Evaluate warm-up: an item passes on any attempt with success and at most
/// one error, fails when attempted without a pass, and is pending untouched.
pub fn evaluate_warmup(
    introduced_yesterday: &[i32],
    todays_attempts: &[WarmupAttempt],
) -> WarmupEvaluation {
    let mut passing = Vec::new();
    let mut failing = Vec::new();
    let mut pending = Vec::new();

    for &ayah_id in introduced_yesterday {
        let attempts: Vec<_> = todays_attempts
            .iter()
            .filter(|attempt| attempt.ayah_id == ayah_id)
            .collect();
        if attempts.is_empty() {
            pending.push(ayah_id);
        } else if attempts
            .iter()
            .any(|attempt| attempt.success && attempt.errors_count <= 1)
        {
            passing.push(ayah_id);
        } else {
            failing.push(ayah_id);
        }
    }

    WarmupEvaluation {
        passed: failing.is_empty() && pending.is_empty(),
        failed: !failing.is_empty(),
        pending: !pending.is_empty(),
        passing_ayah_ids: passing,
        failing_ayah_ids: failing,
        pending_ayah_ids: pending,
    }
}

/// Mean of the last seven days of retention scores, defaulting to 1 with no
/// history.
pub fn rolling_retention(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        1.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    }
}

/// Pick the daily mode.
pub fn select_mode(
    debt: &DebtMetrics,
    warmup: &WarmupEvaluation,
    retention_rolling_7d: f64,
    retention_threshold: f64,
) -> QueueMode {
    if debt.frozen() || warmup.failed {
        QueueMode::ReviewOnly
    } else if retention_rolling_7d < retention_threshold {
        QueueMode::Consolidation
    } else {
        QueueMode::Normal
    }
}

/// Risk order: most overdue first, then lapses, difficulty, last errors.
pub fn risk_sort(items: &mut [UserItemState], now: DateTime<Utc>) {
    items.sort_by(|a, b| {
        let overdue_a = (now - a.next_review_at).num_seconds();
        let overdue_b = (now - b.next_review_at).num_seconds();
        overdue_b
            .cmp(&overdue_a)
            .then_with(|| b.lapses.cmp(&a.lapses))
            .then_with(|| b.difficulty_score.total_cmp(&a.difficulty_score))
            .then_with(|| b.last_errors_count.cmp(&a.last_errors_count))
    });
}

/// Rotation target: enough per day to touch every active MANZIL item once
/// per rotation window, and never less than one.
pub fn manzil_rotation_target(active_manzil_count: usize, rotation_days: i32) -> usize {
    let window = rotation_days.max(1) as usize;
    active_manzil_count.div_ceil(window).max(1)
}

/// Due MANZIL items first; when fewer are due than the rotation target,
/// not-yet-due active items fill the list.
pub fn manzil_queue(
    due: Vec<UserItemState>,
    not_due: Vec<UserItemState>,
    target: usize,
) -> Vec<UserItemState> {
    if due.len() >= target {
        return due;
    }
    let mut queue = due;
    for item in not_due {
        if queue.len() >= target {
            break;
        }
        queue.push(item);
    }
    queue
}

/// A weak inter-ayah link surfaced for repair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeakTransition {
    pub from_ayah_id: i32,
    pub to_ayah_id: i32,
    pub attempt_count: i32,
    pub success_count: i32,
    pub success_rate: f64,
}

/// Top-10 weak transitions, weakest first, plus the link-repair flag
/// (raised when more than five links qualify).
pub fn weak_transitions(scores: &[TransitionScore]) -> (Vec<WeakTransition>, bool) {
    let mut weak: Vec<WeakTransition> = scores
        .iter()
        .filter(|score| score.is_weak())
        .map(|score| WeakTransition {
            from_ayah_id: score.from_ayah_id,
            to_ayah_id: score.to_ayah_id,
            attempt_count: score.attempt_count,
            success_count: score.success_count,
            success_rate: score.success_rate(),
        })
        .collect();
    weak.sort_by(|a, b| a.success_rate.total_cmp(&b.success_rate));
    let link_repair_recommended = weak.len() > 5;
    weak.truncate(10);
    (weak, link_repair_recommended)
}

/// Why Sabaq is blocked today, by precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockedReason {
    WarmupFailed,
    ModeReviewOnly,
    WarmupPending,
    None,
}

/// The new-material task for today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SabaqTask {
    pub target_ayahs: i32,
    pub allowed: bool,
    pub blocked_reason: BlockedReason,
}

pub fn sabaq_task(mode: QueueMode, warmup: &WarmupEvaluation, daily_new_target: i32) -> SabaqTask {
    let target_ayahs = match mode {
        QueueMode::ReviewOnly => 0,
        QueueMode::Consolidation => (daily_new_target / 2).max(1),
        QueueMode::Normal => daily_new_target,
    };
    let blocked_reason = if warmup.failed {
        BlockedReason::WarmupFailed
    } else if mode == QueueMode::ReviewOnly {
        BlockedReason::ModeReviewOnly
    } else if warmup.pending {
        BlockedReason::WarmupPending
    } else {
        BlockedReason::None
    };
    SabaqTask {
        target_ayahs,
        allowed: mode != QueueMode::ReviewOnly && warmup.passed,
        blocked_reason,
    }
}

/// One review-queue entry.
#[derive(Debug, Clone, Serialize)]
pub struct QueueItem {
    pub ayah_id: i32,
    pub tier: ReviewTier,
    pub next_review_at: DateTime<Utc>,
    pub overdue_seconds: i64,
    pub interval_checkpoint_index: i32,
    pub lapses: i32,
    pub difficulty_score: f64,
    pub last_errors_count: i32,
}

pub fn queue_item(state: &UserItemState, now: DateTime<Utc>) -> QueueItem {
    QueueItem {
        ayah_id: state.ayah_id,
        tier: state.tier,
        next_review_at: state.next_review_at,
        overdue_seconds: (now - state.next_review_at).num_seconds(),
        interval_checkpoint_index: state.interval_checkpoint_index,
        lapses: state.lapses,
        difficulty_score: state.difficulty_score,
        last_errors_count: state.last_errors_count,
    }
}

/// Whether the user may enter the queue at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueStatus {
    Ready,
    FluencyGateRequired,
}

/// The full today-queue payload.
#[derive(Debug, Serialize)]
pub struct TodayQueueResponse {
    pub status: QueueStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub mode: Option<QueueMode>,
    pub debt: DebtMetrics,
    pub warmup: WarmupEvaluation,
    pub retention_rolling_7d: f64,
    pub sabqi_queue: Vec<QueueItem>,
    pub manzil_queue: Vec<QueueItem>,
    pub weak_transitions: Vec<WeakTransition>,
    pub link_repair_recommended: bool,
    pub sabaq_task: SabaqTask,
}

impl TodayQueueResponse {
    /// Gate-blocked payload: empty queues, one action.
    pub fn fluency_gate_required(time_budget_minutes: i32, backlog_freeze_ratio: f64) -> Self {
        Self {
            status: QueueStatus::FluencyGateRequired,
            action: Some("COMPLETE_FLUENCY_GATE".to_string()),
            mode: None,
            debt: DebtMetrics::zero(time_budget_minutes, backlog_freeze_ratio),
            warmup: WarmupEvaluation::vacuous(),
            retention_rolling_7d: 1.0,
            sabqi_queue: Vec::new(),
            manzil_queue: Vec::new(),
            weak_transitions: Vec::new(),
            link_repair_recommended: false,
            sabaq_task: SabaqTask {
                target_ayahs: 0,
                allowed: false,
                blocked_reason: BlockedReason::None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ItemStatus, ReviewTier};
    use chrono::Duration;
    use uuid::Uuid;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn item(ayah_id: i32, next_review_at: DateTime<Utc>) -> UserItemState {
        UserItemState {
            user_id: Uuid::from_u128(1),
            ayah_id,
            status: ItemStatus::Memorized,
            tier: ReviewTier::Sabqi,
            next_review_at,
            review_interval_seconds: 86_400,
            interval_checkpoint_index: 2,
            introduced_at: next_review_at - Duration::days(3),
            first_memorized_at: None,
            difficulty_score: 0.0,
            total_reviews: 3,
            successful_reviews: 3,
            lapses: 0,
            success_streak: 3,
            consecutive_perfect_days: 0,
            last_perfect_day: None,
            average_duration_seconds: 40.0,
            last_errors_count: 0,
            last_reviewed_at: None,
            last_event_occurred_at: None,
        }
    }

    #[test]
    fn debt_metrics_round_up_backlog() {
        // 90 items at 75s is 112.5 minutes of work.
        let now = at("2026-02-11T12:00:00Z");
        let debt = debt_metrics(90, Some(at("2026-02-11T10:00:00Z")), now, 75, 60, 0.8);
        assert_eq!(debt.backlog_minutes_estimate, 113);
        assert_eq!(debt.freeze_threshold_minutes, 48);
        assert_eq!(debt.overdue_days_max, 0);
        assert!(debt.frozen());
    }

    #[test]
    fn freeze_is_strictly_greater_than_threshold() {
        let mut debt = DebtMetrics {
            due_count: 10,
            backlog_minutes_estimate: 48,
            overdue_days_max: 0,
            freeze_threshold_minutes: 48,
        };
        assert!(!debt.frozen());
        debt.backlog_minutes_estimate = 49;
        assert!(debt.frozen());
    }

    #[test]
    fn overdue_age_freezes_regardless_of_backlog() {
        let now = at("2026-02-11T12:00:00Z");
        let debt = debt_metrics(1, Some(at("2026-02-08T11:00:00Z")), now, 55, 90, 0.8);
        assert_eq!(debt.overdue_days_max, 3);
        assert!(debt.frozen());
    }

    #[test]
    fn future_earliest_due_counts_no_overdue_days() {
        let now = at("2026-02-11T12:00:00Z");
        let debt = debt_metrics(0, Some(at("2026-02-12T09:00:00Z")), now, 55, 60, 0.8);
        assert_eq!(debt.overdue_days_max, 0);
    }

    #[test]
    fn warmup_with_no_items_passes_vacuously() {
        let eval = evaluate_warmup(&[], &[]);
        assert!(eval.passed);
        assert!(!eval.failed);
        assert!(!eval.pending);
    }

    #[test]
    fn warmup_pass_fail_pending_partition() {
        let attempts = [
            WarmupAttempt { ayah_id: 1, success: true, errors_count: 1 },
            WarmupAttempt { ayah_id: 2, success: true, errors_count: 2 },
            WarmupAttempt { ayah_id: 2, success: false, errors_count: 0 },
        ];
        let eval = evaluate_warmup(&[1, 2, 3], &attempts);
        assert_eq!(eval.passing_ayah_ids, vec![1]);
        assert_eq!(eval.failing_ayah_ids, vec![2]);
        assert_eq!(eval.pending_ayah_ids, vec![3]);
        assert!(!eval.passed);
        assert!(eval.failed);
        assert!(eval.pending);
    }

    #[test]
    fn warmup_later_attempt_can_rescue_item() {
        let attempts = [
            WarmupAttempt { ayah_id: 1, success: false, errors_count: 3 },
            WarmupAttempt { ayah_id: 1, success: true, errors_count: 0 },
        ];
        let eval = evaluate_warmup(&[1], &attempts);
        assert!(eval.passed);
        assert!(!eval.failed);
    }

    #[test]
    fn rolling_retention_defaults_to_one() {
        assert_eq!(rolling_retention(&[]), 1.0);
        assert!((rolling_retention(&[0.9, 0.7]) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn mode_selection_precedence() {
        let calm = DebtMetrics {
            due_count: 1,
            backlog_minutes_estimate: 5,
            overdue_days_max: 0,
            freeze_threshold_minutes: 48,
        };
        let frozen = DebtMetrics {
            backlog_minutes_estimate: 49,
            ..calm
        };
        let failed_warmup = WarmupEvaluation {
            passed: false,
            failed: true,
            pending: false,
            passing_ayah_ids: vec![],
            failing_ayah_ids: vec![9],
            pending_ayah_ids: vec![],
        };

        assert_eq!(
            select_mode(&frozen, &WarmupEvaluation::vacuous(), 0.99, 0.85),
            QueueMode::ReviewOnly
        );
        assert_eq!(
            select_mode(&calm, &failed_warmup, 0.99, 0.85),
            QueueMode::ReviewOnly
        );
        assert_eq!(
            select_mode(&calm, &WarmupEvaluation::vacuous(), 0.80, 0.85),
            QueueMode::Consolidation
        );
        assert_eq!(
            select_mode(&calm, &WarmupEvaluation::vacuous(), 0.85, 0.85),
            QueueMode::Normal
        );
    }

    #[test]
    fn risk_sort_orders_by_overdue_then_lapses_then_difficulty() {
        let now = at("2026-02-11T12:00:00Z");
        let mut fresh = item(1, now - Duration::hours(1));
        fresh.lapses = 5;
        let stale = item(2, now - Duration::hours(10));
        let mut tied_a = item(3, now - Duration::hours(10));
        tied_a.lapses = 2;
        let mut tied_b = item(4, now - Duration::hours(10));
        tied_b.lapses = 2;
        tied_b.difficulty_score = 0.9;

        let mut items = vec![fresh, stale, tied_a, tied_b];
        risk_sort(&mut items, now);
        let order: Vec<i32> = items.iter().map(|i| i.ayah_id).collect();
        assert_eq!(order, vec![4, 3, 2, 1]);
    }

    #[test]
    fn rotation_target_covers_set_in_window() {
        assert_eq!(manzil_rotation_target(0, 30), 1);
        assert_eq!(manzil_rotation_target(29, 30), 1);
        assert_eq!(manzil_rotation_target(31, 30), 2);
        assert_eq!(manzil_rotation_target(300, 30), 10);
        // A zero window degrades to one day.
        assert_eq!(manzil_rotation_target(5, 0), 5);
    }

    #[test]
    fn manzil_queue_fills_with_not_yet_due_items() {
        let now = at("2026-02-11T12:00:00Z");
        let due = vec![item(1, now - Duration::hours(2))];
        let not_due = vec![item(2, now + Duration::days(3)), item(3, now + Duration::days(9))];
        let queue = manzil_queue(due, not_due, 2);
        let order: Vec<i32> = queue.iter().map(|i| i.ayah_id).collect();
        assert_eq!(order, vec![1, 2]);
    }

    #[test]
    fn manzil_queue_keeps_all_due_items_past_target() {
        let now = at("2026-02-11T12:00:00Z");
        let due = vec![
            item(1, now - Duration::hours(3)),
            item(2, now - Duration::hours(2)),
            item(3, now - Duration::hours(1)),
        ];
        let queue = manzil_queue(due, vec![item(4, now + Duration::days(1))], 1);
        assert_eq!(queue.len(), 3);
    }

    fn score(from: i32, attempts: i32, successes: i32) -> TransitionScore {
        TransitionScore {
            user_id: Uuid::from_u128(1),
            from_ayah_id: from,
            to_ayah_id: from + 1,
            attempt_count: attempts,
            success_count: successes,
            last_practiced_at: at("2026-02-11T12:00:00Z"),
        }
    }

    #[test]
    fn weak_transitions_are_filtered_and_sorted_ascending() {
        let scores = [
            score(1, 10, 3),
            score(2, 2, 0),  // too few attempts
            score(3, 4, 1),
            score(4, 10, 9), // strong
        ];
        let (weak, recommended) = weak_transitions(&scores);
        let order: Vec<i32> = weak.iter().map(|w| w.from_ayah_id).collect();
        assert_eq!(order, vec![3, 1]);
        assert!(!recommended);
    }

    #[test]
    fn link_repair_recommended_past_five_weak_pairs() {
        let scores: Vec<TransitionScore> = (1..=7).map(|i| score(i, 5, 1)).collect();
        let (weak, recommended) = weak_transitions(&scores);
        assert_eq!(weak.len(), 7);
        assert!(recommended);

        let scores: Vec<TransitionScore> = (1..=12).map(|i| score(i, 5, 1)).collect();
        let (weak, _) = weak_transitions(&scores);
        assert_eq!(weak.len(), 10);
    }

    #[test]
    fn sabaq_task_blocked_reason_precedence() {
        let failed = WarmupEvaluation {
            passed: false,
            failed: true,
            pending: true,
            passing_ayah_ids: vec![],
            failing_ayah_ids: vec![1],
            pending_ayah_ids: vec![2],
        };
        let pending = WarmupEvaluation {
            passed: false,
            failed: false,
            pending: true,
            passing_ayah_ids: vec![],
            failing_ayah_ids: vec![],
            pending_ayah_ids: vec![2],
        };

        let task = sabaq_task(QueueMode::ReviewOnly, &failed, 7);
        assert_eq!(task.blocked_reason, BlockedReason::WarmupFailed);
        assert_eq!(task.target_ayahs, 0);
        assert!(!task.allowed);

        let task = sabaq_task(QueueMode::ReviewOnly, &WarmupEvaluation::vacuous(), 7);
        assert_eq!(task.blocked_reason, BlockedReason::ModeReviewOnly);

        let task = sabaq_task(QueueMode::Normal, &pending, 7);
        assert_eq!(task.blocked_reason, BlockedReason::WarmupPending);
        assert!(!task.allowed);

        let task = sabaq_task(QueueMode::Normal, &WarmupEvaluation::vacuous(), 7);
        assert_eq!(task.blocked_reason, BlockedReason::None);
        assert!(task.allowed);
        assert_eq!(task.target_ayahs, 7);
    }

    #[test]
    fn consolidation_halves_new_target_with_floor_of_one() {
        let warmup = WarmupEvaluation::vacuous();
        assert_eq!(sabaq_task(QueueMode::Consolidation, &warmup, 7).target_ayahs, 3);
        assert_eq!(sabaq_task(QueueMode::Consolidation, &warmup, 1).target_ayahs, 1);
    }
}
