//! One-shot computation of per-user scheduling parameters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{HifzGoal, PriorJuzBand, ProgramVariant, ScaffoldingLevel, TajwidConfidence};

/// Review ratio target, percent of session time reserved for review.
pub const REVIEW_RATIO_TARGET: i32 = 70;
/// Fraction of the time budget that, once exceeded by backlog, freezes Sabaq.
pub const BACKLOG_FREEZE_RATIO: f64 = 0.8;
/// Days to rotate through the full MANZIL set.
pub const MANZIL_ROTATION_DAYS: i32 = 30;
/// Cap on counted overdue age.
pub const OVERDUE_CAP_SECONDS: i64 = 48 * 3600;

/// Planner inputs, after defaults are resolved.
#[derive(Debug, Clone, Copy)]
pub struct AssessmentInput {
    pub time_budget_minutes: i32,
    pub fluency_score: f64,
    pub tajwid_confidence: TajwidConfidence,
    pub goal: HifzGoal,
    pub has_teacher: bool,
    pub prior_juz_band: PriorJuzBand,
}

/// Computed scheduling parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentParameters {
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
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_minutes: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Compute scheduling parameters from assessment inputs.
pub fn plan(input: AssessmentInput) -> AssessmentParameters {
    let scaffolding_level = scaffolding_for(&input);
    let variant = variant_for(&input);
    let daily_new_target_ayahs = daily_new_target(&input, variant);

    let retention_threshold = match variant {
        ProgramVariant::Conservative => 0.88,
        ProgramVariant::Momentum => 0.82,
        ProgramVariant::Standard => 0.85,
    };

    let avg_seconds_per_item = if input.fluency_score >= 75.0 {
        55
    } else if input.fluency_score >= 50.0 {
        70
    } else {
        90
    };

    let (recommended_minutes, warning) = if input.time_budget_minutes == 15 {
        (
            Some(30),
            Some(
                "A 15-minute budget only sustains a very small daily load; \
                 30 minutes is the recommended minimum for steady progress."
                    .to_string(),
            ),
        )
    } else {
        (None, None)
    };

    AssessmentParameters {
        scaffolding_level,
        variant,
        daily_new_target_ayahs,
        review_ratio_target: REVIEW_RATIO_TARGET,
        retention_threshold,
        backlog_freeze_ratio: BACKLOG_FREEZE_RATIO,
        consolidation_retention_floor: (retention_threshold - 0.08).max(0.70),
        manzil_rotation_days: MANZIL_ROTATION_DAYS,
        avg_seconds_per_item,
        overdue_cap_seconds: OVERDUE_CAP_SECONDS,
        recommended_minutes,
        warning,
    }
}

fn scaffolding_for(input: &AssessmentInput) -> ScaffoldingLevel {
    if input.fluency_score < 75.0 || input.prior_juz_band == PriorJuzBand::Zero {
        ScaffoldingLevel::Beginner
    } else if input.fluency_score > 85.0
        && input.prior_juz_band == PriorJuzBand::FivePlus
        && input.has_teacher
    {
        ScaffoldingLevel::Minimal
    } else {
        ScaffoldingLevel::Standard
    }
}

fn variant_for(input: &AssessmentInput) -> ProgramVariant {
    if input.time_budget_minutes == 15
        || input.fluency_score < 45.0
        || input.tajwid_confidence == TajwidConfidence::Low
        || !input.has_teacher
    {
        ProgramVariant::Conservative
    } else if input.time_budget_minutes >= 90
        && input.fluency_score >= 70.0
        && input.tajwid_confidence != TajwidConfidence::Low
        && input.has_teacher
    {
        ProgramVariant::Momentum
    } else {
        ProgramVariant::Standard
    }
}

fn daily_new_target(input: &AssessmentInput, variant: ProgramVariant) -> i32 {
    let mut target = 7;
    if variant == ProgramVariant::Momentum {
        target = 10;
    }
    if variant == ProgramVariant::Conservative || input.time_budget_minutes == 30 {
        target = 5;
    }
    if input.time_budget_minutes >= 90 {
        target = target.max(7);
    }
    // 15-minute budgets hard-cap at 3 regardless of anything else.
    if input.time_budget_minutes == 15 {
        target = 3;
    }
    target
}

/// Assessment submission.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitAssessmentRequest {
    pub time_budget_minutes: i32,
    /// Self-reported reading fluency, used only when no gate score exists.
    #[validate(range(min = 0.0, max = 100.0))]
    pub fluency_score: Option<f64>,
    pub tajwid_confidence: TajwidConfidence,
    pub goal: HifzGoal,
    pub has_teacher: bool,
    pub prior_juz_band: PriorJuzBand,
}

impl SubmitAssessmentRequest {
    /// The time budget is a fixed menu, not a range.
    pub fn validate_time_budget(&self) -> Result<(), String> {
        match self.time_budget_minutes {
            15 | 30 | 60 | 90 => Ok(()),
            other => Err(format!(
                "time_budget_minutes must be one of 15, 30, 60, 90 (got {other})"
            )),
        }
    }
}

/// Assessment response: the persisted parameters.
#[derive(Debug, Serialize)]
pub struct SubmitAssessmentResponse {
    pub parameters: AssessmentParameters,
    pub completed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn input() -> AssessmentInput {
        AssessmentInput {
            time_budget_minutes: 60,
            fluency_score: 80.0,
            tajwid_confidence: TajwidConfidence::Medium,
            goal: HifzGoal::FullQuran,
            has_teacher: true,
            prior_juz_band: PriorJuzBand::OneToFour,
        }
    }

    #[rstest]
    #[case(74.9, PriorJuzBand::FivePlus, true, ScaffoldingLevel::Beginner)]
    #[case(90.0, PriorJuzBand::Zero, true, ScaffoldingLevel::Beginner)]
    #[case(86.0, PriorJuzBand::FivePlus, true, ScaffoldingLevel::Minimal)]
    #[case(86.0, PriorJuzBand::FivePlus, false, ScaffoldingLevel::Standard)]
    #[case(85.0, PriorJuzBand::FivePlus, true, ScaffoldingLevel::Standard)]
    #[case(80.0, PriorJuzBand::OneToFour, true, ScaffoldingLevel::Standard)]
    fn scaffolding_rules(
        #[case] fluency: f64,
        #[case] band: PriorJuzBand,
        #[case] teacher: bool,
        #[case] expected: ScaffoldingLevel,
    ) {
        let params = plan(AssessmentInput {
            fluency_score: fluency,
            prior_juz_band: band,
            has_teacher: teacher,
            ..input()
        });
        assert_eq!(params.scaffolding_level, expected);
    }

    #[test]
    fn fifteen_minutes_forces_conservative() {
        let params = plan(AssessmentInput {
            time_budget_minutes: 15,
            ..input()
        });
        assert_eq!(params.variant, ProgramVariant::Conservative);
        assert_eq!(params.daily_new_target_ayahs, 3);
        assert_eq!(params.recommended_minutes, Some(30));
        assert!(params.warning.is_some());
    }

    #[test]
    fn no_teacher_forces_conservative() {
        let params = plan(AssessmentInput {
            has_teacher: false,
            ..input()
        });
        assert_eq!(params.variant, ProgramVariant::Conservative);
        assert!((params.retention_threshold - 0.88).abs() < 1e-9);
        assert!((params.consolidation_retention_floor - 0.80).abs() < 1e-9);
    }

    #[test]
    fn momentum_needs_budget_fluency_and_teacher() {
        let momentum = plan(AssessmentInput {
            time_budget_minutes: 90,
            ..input()
        });
        assert_eq!(momentum.variant, ProgramVariant::Momentum);
        assert_eq!(momentum.daily_new_target_ayahs, 10);
        assert!((momentum.retention_threshold - 0.82).abs() < 1e-9);

        let low_tajwid = plan(AssessmentInput {
            time_budget_minutes: 90,
            tajwid_confidence: TajwidConfidence::Low,
            ..input()
        });
        assert_eq!(low_tajwid.variant, ProgramVariant::Conservative);
    }

    #[test]
    fn standard_defaults() {
        let params = plan(input());
        assert_eq!(params.variant, ProgramVariant::Standard);
        assert_eq!(params.daily_new_target_ayahs, 7);
        assert!((params.retention_threshold - 0.85).abs() < 1e-9);
        assert!((params.consolidation_retention_floor - 0.77).abs() < 1e-9);
        assert_eq!(params.review_ratio_target, 70);
        assert!((params.backlog_freeze_ratio - 0.8).abs() < 1e-9);
        assert_eq!(params.manzil_rotation_days, 30);
        assert_eq!(params.overdue_cap_seconds, 172_800);
        assert_eq!(params.recommended_minutes, None);
    }

    #[test]
    fn thirty_minutes_trims_new_target() {
        let params = plan(AssessmentInput {
            time_budget_minutes: 30,
            ..input()
        });
        assert_eq!(params.daily_new_target_ayahs, 5);
    }

    #[test]
    fn ninety_minute_conservative_floors_at_seven() {
        // Conservative would trim to 5, but a 90-minute budget floors at 7.
        let params = plan(AssessmentInput {
            time_budget_minutes: 90,
            has_teacher: false,
            ..input()
        });
        assert_eq!(params.variant, ProgramVariant::Conservative);
        assert_eq!(params.daily_new_target_ayahs, 7);
    }

    #[rstest]
    #[case(75.0, 55)]
    #[case(74.9, 70)]
    #[case(50.0, 70)]
    #[case(49.9, 90)]
    fn seconds_per_item_bands(#[case] fluency: f64, #[case] expected: i32) {
        let params = plan(AssessmentInput {
            fluency_score: fluency,
            ..input()
        });
        assert_eq!(params.avg_seconds_per_item, expected);
    }

    #[test]
    fn time_budget_menu_is_enforced() {
        let req = SubmitAssessmentRequest {
            time_budget_minutes: 45,
            fluency_score: None,
            tajwid_confidence: TajwidConfidence::Medium,
            goal: HifzGoal::JuzAmma,
            has_teacher: false,
            prior_juz_band: PriorJuzBand::Zero,
        };
        assert!(req.validate_time_budget().is_err());
    }
}
