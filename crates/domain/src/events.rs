//! Review-event ingestion types.
//!
//! The wire shape is a discriminated union: one `event_type` field plus the
//! per-variant optional fields, mirroring the nullable columns of the event
//! log. `validate_shape` enforces the variant invariants that the database
//! CHECK constraints also carry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{EventType, ReviewTier, SessionType, StepType};

/// POST /review/event body.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReviewEventRequest {
    pub event_type: EventType,
    pub client_event_id: Option<Uuid>,
    pub session_run_id: Option<Uuid>,
    pub session_type: Option<SessionType>,
    /// Defaults to the server clock when absent.
    pub occurred_at: Option<DateTime<Utc>>,

    // REVIEW_ATTEMPTED fields
    #[validate(range(min = 1, max = 6236))]
    pub item_ayah_id: Option<i32>,
    pub tier: Option<ReviewTier>,
    pub step_type: Option<StepType>,
    #[validate(range(min = 1, max = 3))]
    pub attempt_number: Option<i32>,
    pub scaffolding_used: Option<bool>,
    #[validate(range(min = 1, max = 6236))]
    pub linked_ayah_id: Option<i32>,
    #[validate(range(min = 0))]
    pub errors_count: Option<i32>,
    #[validate(range(min = 1))]
    pub duration_seconds: Option<i32>,
    pub error_tags: Option<Vec<String>>,

    // TRANSITION_ATTEMPTED fields
    #[validate(range(min = 1, max = 6236))]
    pub from_ayah_id: Option<i32>,
    #[validate(range(min = 1, max = 6236))]
    pub to_ayah_id: Option<i32>,

    pub success: bool,
}

impl ReviewEventRequest {
    /// Variant invariants beyond per-field ranges.
    pub fn validate_shape(&self) -> Result<(), String> {
        match self.event_type {
            EventType::ReviewAttempted => {
                if self.item_ayah_id.is_none() {
                    return Err("REVIEW_ATTEMPTED requires item_ayah_id".to_string());
                }
                if self.tier.is_none() {
                    return Err("REVIEW_ATTEMPTED requires tier".to_string());
                }
                if self.errors_count.is_none() {
                    return Err("REVIEW_ATTEMPTED requires errors_count".to_string());
                }
                if self.duration_seconds.is_none() {
                    return Err("REVIEW_ATTEMPTED requires duration_seconds".to_string());
                }
                if self.step_type == Some(StepType::Link) && self.linked_ayah_id.is_none() {
                    return Err("LINK steps require linked_ayah_id".to_string());
                }
                Ok(())
            }
            EventType::TransitionAttempted => {
                if self.from_ayah_id.is_none() || self.to_ayah_id.is_none() {
                    return Err(
                        "TRANSITION_ATTEMPTED requires from_ayah_id and to_ayah_id".to_string()
                    );
                }
                Ok(())
            }
        }
    }
}

/// A fully-resolved event ready for insertion.
#[derive(Debug, Clone)]
pub struct NewReviewEvent {
    pub user_id: Uuid,
    pub session_run_id: Option<Uuid>,
    pub client_event_id: Option<Uuid>,
    pub event_type: EventType,
    pub session_type: Option<SessionType>,
    pub item_ayah_id: Option<i32>,
    pub tier: Option<ReviewTier>,
    pub step_type: Option<StepType>,
    pub attempt_number: Option<i32>,
    pub scaffolding_used: Option<bool>,
    pub linked_ayah_id: Option<i32>,
    pub errors_count: Option<i32>,
    pub duration_seconds: Option<i32>,
    pub error_tags: Option<Vec<String>>,
    pub from_ayah_id: Option<i32>,
    pub to_ayah_id: Option<i32>,
    pub success: bool,
    pub occurred_at: DateTime<Utc>,
}

impl ReviewEventRequest {
    pub fn into_new_event(self, user_id: Uuid, now: DateTime<Utc>) -> NewReviewEvent {
        NewReviewEvent {
            user_id,
            session_run_id: self.session_run_id,
            client_event_id: self.client_event_id,
            event_type: self.event_type,
            session_type: self.session_type,
            item_ayah_id: self.item_ayah_id,
            tier: self.tier,
            step_type: self.step_type,
            attempt_number: self.attempt_number,
            scaffolding_used: self.scaffolding_used,
            linked_ayah_id: self.linked_ayah_id,
            errors_count: self.errors_count,
            duration_seconds: self.duration_seconds,
            error_tags: self.error_tags,
            from_ayah_id: self.from_ayah_id,
            to_ayah_id: self.to_ayah_id,
            success: self.success,
            occurred_at: self.occurred_at.unwrap_or(now),
        }
    }
}

/// Ingest outcome. A duplicate `client_event_id` is success with
/// `deduplicated: true` and no side effects.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct IngestResponse {
    pub deduplicated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review_request() -> ReviewEventRequest {
        ReviewEventRequest {
            event_type: EventType::ReviewAttempted,
            client_event_id: None,
            session_run_id: None,
            session_type: Some(SessionType::Review),
            occurred_at: None,
            item_ayah_id: Some(12),
            tier: Some(ReviewTier::Sabqi),
            step_type: None,
            attempt_number: None,
            scaffolding_used: None,
            linked_ayah_id: None,
            errors_count: Some(0),
            duration_seconds: Some(30),
            error_tags: None,
            from_ayah_id: None,
            to_ayah_id: None,
            success: true,
        }
    }

    #[test]
    fn review_shape_requires_item_fields() {
        assert!(review_request().validate_shape().is_ok());

        let mut missing = review_request();
        missing.item_ayah_id = None;
        assert!(missing.validate_shape().is_err());

        let mut missing = review_request();
        missing.duration_seconds = None;
        assert!(missing.validate_shape().is_err());
    }

    #[test]
    fn link_step_requires_linked_ayah() {
        let mut link = review_request();
        link.step_type = Some(StepType::Link);
        assert!(link.validate_shape().is_err());
        link.linked_ayah_id = Some(13);
        assert!(link.validate_shape().is_ok());
    }

    #[test]
    fn transition_shape_requires_pair() {
        let mut transition = review_request();
        transition.event_type = EventType::TransitionAttempted;
        transition.from_ayah_id = Some(12);
        transition.to_ayah_id = None;
        assert!(transition.validate_shape().is_err());
        transition.to_ayah_id = Some(13);
        assert!(transition.validate_shape().is_ok());
    }

    #[test]
    fn occurred_at_defaults_to_server_clock() {
        let now: DateTime<Utc> = "2026-02-11T12:00:00Z".parse().unwrap();
        let event = review_request().into_new_event(Uuid::from_u128(1), now);
        assert_eq!(event.occurred_at, now);
    }
}
