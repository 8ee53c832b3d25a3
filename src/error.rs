use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::engine::availability::DayAvailability;
use crate::models::{FeedError, ReservationStatus, ServiceId, TimeSlot, VenueId};

/// One violated rule of the date/time/guests step, reported individually.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Violation {
    #[error("no date selected")]
    DateMissing,
    #[error("{date} is in the past")]
    DateInPast { date: NaiveDate },
    #[error("{date} is blocked by the venue")]
    DateBlocked { date: NaiveDate },
    #[error("{date} is fully booked")]
    DateFullyBooked { date: NaiveDate },
    #[error("availability for {date} is unknown, try again")]
    DateUnknown { date: NaiveDate },
    #[error("start and end time are required")]
    TimeWindowMissing,
    #[error("start time {start} must be before end time {end}")]
    StartNotBeforeEnd { start: NaiveTime, end: NaiveTime },
    #[error("venue is open {opening} to {closing}")]
    OutsideOperatingHours { opening: NaiveTime, closing: NaiveTime },
    #[error("{date} {end} has already passed")]
    SlotEnded { date: NaiveDate, end: NaiveTime },
    #[error("requested time overlaps an existing reservation")]
    SlotTaken { free_slots: Vec<TimeSlot> },
    #[error("guest count is required")]
    GuestCountMissing,
    #[error("guest count {guest_count} must be between 1 and {capacity}")]
    GuestCountOutOfRange { guest_count: u32, capacity: u32 },
    #[error("service {service_id} is not offered by this venue")]
    UnknownService { service_id: ServiceId },
}

impl Violation {
    /// Violations caused by someone else holding the slot, as opposed to bad input.
    pub fn is_availability(&self) -> bool {
        matches!(
            self,
            Violation::DateBlocked { .. }
                | Violation::DateFullyBooked { .. }
                | Violation::SlotTaken { .. }
        )
    }
}

/// What the caller needs to re-render the date/time step after losing a race.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictDetail {
    pub venue_id: VenueId,
    pub requested: TimeSlot,
    pub day: DayAvailability,
    /// Every clause the draft broke against `day`, input mistakes included.
    pub violations: Vec<Violation>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("cache error: {0}")]
    Cache(#[from] redis::RedisError),
    #[error("malformed record: {0}")]
    Feed(#[from] FeedError),
    #[error("booking store unavailable: {0}")]
    Unavailable(String),
    #[error("invariant violated: {0}")]
    Invariant(String),
}

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("validation failed: {}", join(.0))]
    Validation(Vec<Violation>),
    #[error("requested slot on {} is no longer available", .0.day.date)]
    AvailabilityConflict(ConflictDetail),
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("internal invariant violated: {0}")]
    InternalInvariantViolation(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("cannot move reservation from {from:?} to {to:?}")]
    InvalidTransition {
        from: ReservationStatus,
        to: ReservationStatus,
    },
    #[error("pending reservation {0} has expired")]
    ReservationExpired(i64),
}

fn join(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => BookingError::NotFound { entity, id },
            StoreError::Invariant(msg) => {
                tracing::error!("booking invariant violated in store: {}", msg);
                BookingError::InternalInvariantViolation(msg)
            }
            other => {
                tracing::error!("booking store failure: {:?}", other);
                BookingError::UpstreamUnavailable(other.to_string())
            }
        }
    }
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            BookingError::Validation(violations) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "success": false, "error": "validation_failed", "violations": violations }),
            ),
            BookingError::AvailabilityConflict(detail) => (
                StatusCode::CONFLICT,
                json!({ "success": false, "error": "availability_conflict", "conflict": detail }),
            ),
            BookingError::NotFound { .. } => (
                StatusCode::NOT_FOUND,
                json!({ "success": false, "error": self.to_string() }),
            ),
            BookingError::InvalidTransition { .. } | BookingError::ReservationExpired(_) => (
                StatusCode::CONFLICT,
                json!({ "success": false, "error": self.to_string() }),
            ),
            BookingError::UpstreamUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "success": false, "error": "Temporarily unavailable, try again" }),
            ),
            BookingError::InternalInvariantViolation(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "success": false, "error": "Something went wrong, try again" }),
            ),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn availability_violations_are_told_apart() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        assert!(Violation::DateBlocked { date }.is_availability());
        assert!(Violation::SlotTaken { free_slots: vec![] }.is_availability());
        assert!(!Violation::DateInPast { date }.is_availability());
        assert!(!Violation::GuestCountMissing.is_availability());
        let end = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
        assert!(!Violation::SlotEnded { date, end }.is_availability());
    }

    #[test]
    fn response_codes_follow_error_class() {
        let validation = BookingError::Validation(vec![Violation::DateMissing]).into_response();
        assert_eq!(validation.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let upstream = BookingError::UpstreamUnavailable("db down".into()).into_response();
        assert_eq!(upstream.status(), StatusCode::SERVICE_UNAVAILABLE);

        let internal = BookingError::InternalInvariantViolation("overlap".into()).into_response();
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn store_errors_map_to_taxonomy() {
        let err: BookingError = StoreError::NotFound { entity: "venue", id: 3 }.into();
        assert!(matches!(err, BookingError::NotFound { entity: "venue", id: 3 }));

        let err: BookingError = StoreError::Unavailable("offline".into()).into();
        assert!(matches!(err, BookingError::UpstreamUnavailable(_)));

        let err: BookingError = StoreError::Invariant("overlap".into()).into();
        assert!(matches!(err, BookingError::InternalInvariantViolation(_)));
    }
}
