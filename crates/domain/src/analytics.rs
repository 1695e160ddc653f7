//! Derived read models: calendar, achievements, progress.

use chrono::NaiveDate;
use serde::Serialize;

use crate::QueueMode;
use crate::time::days_between;

/// Daily XP formula.
pub fn xp_for(minutes_total: i32, reviews_successful: i32, new_ayahs_memorized: i32) -> i64 {
    minutes_total as i64 * 2 + reviews_successful as i64 + new_ayahs_memorized as i64 * 10
}

/// Streaks over active UTC days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Streaks {
    pub current: i64,
    pub longest: i64,
}

/// Compute streaks from the sorted-unique set of active days.
///
/// The current streak is the run ending today or yesterday (an unfinished
/// today does not break it).
pub fn streaks(active_days: &[NaiveDate], today: NaiveDate) -> Streaks {
    let mut days = active_days.to_vec();
    days.sort();
    days.dedup();

    let mut longest = 0i64;
    let mut run = 0i64;
    let mut prev: Option<NaiveDate> = None;
    for &day in &days {
        run = match prev {
            Some(p) if days_between(p, day) == 1 => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        prev = Some(day);
    }

    let current = match days.last() {
        Some(&last) if days_between(last, today) <= 1 => {
            // Walk back from the most recent active day.
            let mut streak = 1i64;
            for pair in days.windows(2).rev() {
                if days_between(pair[0], pair[1]) == 1 {
                    streak += 1;
                } else {
                    break;
                }
            }
            streak
        }
        _ => 0,
    };

    Streaks { current, longest }
}

/// Badge rarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BadgeRarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

/// One achievement with unlock state.
#[derive(Debug, Clone, Serialize)]
pub struct Achievement {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub rarity: BadgeRarity,
    pub threshold: i64,
    pub progress: i64,
    pub unlocked: bool,
}

/// Facts the badge set is evaluated against.
#[derive(Debug, Clone, Copy, Default)]
pub struct AchievementFacts {
    pub memorized_count: i64,
    pub longest_streak: i64,
    pub lifetime_xp: i64,
    pub perfect_days: i64,
    pub manzil_count: i64,
}

fn badge(
    id: &'static str,
    name: &'static str,
    description: &'static str,
    rarity: BadgeRarity,
    threshold: i64,
    progress: i64,
) -> Achievement {
    Achievement {
        id,
        name,
        description,
        rarity,
        threshold,
        progress: progress.min(threshold),
        unlocked: progress >= threshold,
    }
}

/// The fixed nine-badge set.
pub fn achievements(facts: &AchievementFacts) -> Vec<Achievement> {
    vec![
        badge(
            "first_steps",
            "First Steps",
            "Memorize your first ayah",
            BadgeRarity::Common,
            1,
            facts.memorized_count,
        ),
        badge(
            "ten_ayahs",
            "Ten Ayahs",
            "Memorize ten ayahs",
            BadgeRarity::Common,
            10,
            facts.memorized_count,
        ),
        badge(
            "fifty_ayahs",
            "Fifty Ayahs",
            "Memorize fifty ayahs",
            BadgeRarity::Uncommon,
            50,
            facts.memorized_count,
        ),
        badge(
            "century",
            "Century",
            "Memorize one hundred ayahs",
            BadgeRarity::Rare,
            100,
            facts.memorized_count,
        ),
        badge(
            "week_streak",
            "Week Streak",
            "Practice seven days in a row",
            BadgeRarity::Common,
            7,
            facts.longest_streak,
        ),
        badge(
            "month_streak",
            "Month Streak",
            "Practice thirty days in a row",
            BadgeRarity::Rare,
            30,
            facts.longest_streak,
        ),
        badge(
            "perfect_day",
            "Perfect Day",
            "Finish a day of at least ten reviews without a single miss",
            BadgeRarity::Uncommon,
            1,
            facts.perfect_days,
        ),
        badge(
            "xp_collector",
            "XP Collector",
            "Earn one thousand lifetime XP",
            BadgeRarity::Uncommon,
            1000,
            facts.lifetime_xp,
        ),
        badge(
            "manzil_keeper",
            "Manzil Keeper",
            "Carry an ayah all the way to the Manzil tier",
            BadgeRarity::Epic,
            1,
            facts.manzil_count,
        ),
    ]
}

/// One calendar day.
#[derive(Debug, Clone, Serialize)]
pub struct CalendarDayView {
    pub date: NaiveDate,
    pub completed: bool,
    pub minutes_total: i32,
    pub reviews_total: i32,
    pub reviews_successful: i32,
    pub new_ayahs_memorized: i32,
    pub xp: i64,
    pub mode: QueueMode,
}

#[derive(Debug, Serialize)]
pub struct CalendarResponse {
    pub month: String,
    pub days: Vec<CalendarDayView>,
    pub current_streak: i64,
    pub longest_streak: i64,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub memorized_count: i64,
    pub learning_count: i64,
    pub due_now: i64,
    pub reviews_total: i64,
    pub overall_retention: f64,
    pub current_streak: i64,
    pub longest_streak: i64,
    pub lifetime_xp: i64,
}

#[derive(Debug, Serialize)]
pub struct AchievementsResponse {
    pub achievements: Vec<Achievement>,
}

/// Progress read model.
#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub overall_retention: f64,
    pub total_reviews: i64,
    pub memorized_count: i64,
    pub weak_transition_count: i64,
    pub strong_transition_count: i64,
    /// Item counts per checkpoint index 0..=7.
    pub checkpoint_distribution: Vec<i64>,
    pub recommendation: String,
}

/// Textual recommendation from the progress signals.
pub fn recommendation(overall_retention: f64, weak_transitions: i64, memorized_count: i64) -> String {
    if memorized_count == 0 {
        "Begin with your first Sabaq session; the review queue will build itself.".to_string()
    } else if weak_transitions > 5 {
        "Several ayah-to-ayah links are weak; prioritize link repair before adding new material."
            .to_string()
    } else if overall_retention < 0.80 {
        "Retention is slipping; spend the next sessions consolidating before taking new Sabaq."
            .to_string()
    } else {
        "Retention is healthy; keep the daily rhythm of Sabaq, Sabqi and Manzil.".to_string()
    }
}
