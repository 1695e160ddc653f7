//! UTC-day arithmetic and deterministic identifiers.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use uuid::Uuid;

use crate::StepType;

/// Namespace for deterministic step-event ids (UUID v5).
const STEP_EVENT_NAMESPACE: Uuid = Uuid::from_u128(0x8f1d_6a0b_42c3_4b7e_9d5a_1c2e_7f30_a914);

/// The UTC day an instant falls on.
pub fn utc_day(at: DateTime<Utc>) -> NaiveDate {
    at.date_naive()
}

/// Midnight UTC of the given day.
pub fn day_start(day: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN))
}

/// Whole days from `earlier` to `later` (negative when reversed).
pub fn days_between(earlier: NaiveDate, later: NaiveDate) -> i64 {
    (later - earlier).num_days()
}

/// Deterministic client event id for a protocol step submission.
///
/// Retries of the same (session, ayah, step, attempt) synthesize the same id
/// and dedupe at the event store.
pub fn step_event_id(session_id: Uuid, ayah_id: i32, step: StepType, attempt: i32) -> Uuid {
    let name = format!("{session_id}:{ayah_id}:{}:{attempt}", step.as_str());
    Uuid::new_v5(&STEP_EVENT_NAMESPACE, name.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn utc_day_ignores_time_of_day() {
        assert_eq!(
            utc_day(at("2026-02-01T23:59:59Z")),
            NaiveDate::from_ymd_opt(2026, 2, 1).unwrap()
        );
        assert_eq!(
            utc_day(at("2026-02-02T00:00:00Z")),
            NaiveDate::from_ymd_opt(2026, 2, 2).unwrap()
        );
    }

    #[test]
    fn day_start_round_trips() {
        let day = NaiveDate::from_ymd_opt(2026, 2, 11).unwrap();
        assert_eq!(day_start(day), at("2026-02-11T00:00:00Z"));
        assert_eq!(utc_day(day_start(day)), day);
    }

    #[test]
    fn days_between_is_signed() {
        let a = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        let b = NaiveDate::from_ymd_opt(2026, 2, 4).unwrap();
        assert_eq!(days_between(a, b), 3);
        assert_eq!(days_between(b, a), -3);
        assert_eq!(days_between(a, a), 0);
    }

    #[test]
    fn step_event_id_is_stable() {
        let session = Uuid::from_u128(42);
        let a = step_event_id(session, 7, StepType::Blind, 2);
        let b = step_event_id(session, 7, StepType::Blind, 2);
        assert_eq!(a, b);
    }

    #[test]
    fn step_event_id_differs_per_component() {
        let session = Uuid::from_u128(42);
        let base = step_event_id(session, 7, StepType::Blind, 2);
        assert_ne!(base, step_event_id(session, 8, StepType::Blind, 2));
        assert_ne!(base, step_event_id(session, 7, StepType::Link, 2));
        assert_ne!(base, step_event_id(session, 7, StepType::Blind, 3));
        assert_ne!(base, step_event_id(Uuid::from_u128(43), 7, StepType::Blind, 2));
    }
}
