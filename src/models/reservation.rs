use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::venue::{ServiceId, VenueId};

pub type ReservationId = i64;
pub type BlockId = i64;

/// Half-open interval `[start, end)` within a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeSlot {
    /// `None` when `start >= end`; overnight slots are not supported.
    pub fn new(start: NaiveTime, end: NaiveTime) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, other: &TimeSlot) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Part of `self` that falls inside `window`, if any.
    pub fn clip(&self, window: &TimeSlot) -> Option<TimeSlot> {
        TimeSlot::new(self.start.max(window.start), self.end.min(window.end))
    }

    pub fn minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(ReservationStatus::Pending),
            "confirmed" => Some(ReservationStatus::Confirmed),
            "cancelled" => Some(ReservationStatus::Cancelled),
            _ => None,
        }
    }

    /// Pending and Confirmed reservations hold their interval; Cancelled ones free it.
    pub fn occupies(&self) -> bool {
        !matches!(self, ReservationStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: ReservationStatus) -> bool {
        matches!(
            (self, next),
            (ReservationStatus::Pending, ReservationStatus::Confirmed)
                | (ReservationStatus::Pending, ReservationStatus::Cancelled)
                | (ReservationStatus::Confirmed, ReservationStatus::Cancelled)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub venue_id: VenueId,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: ReservationStatus,
    pub guest_count: u32,
    pub service_ids: Vec<ServiceId>,
    pub special_requests: Option<String>,
    pub total_price: Decimal,
    pub created_at: DateTime<Utc>,
    /// Set while pending; a pending reservation past this instant no longer holds its slot.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Reservation {
    pub fn slot(&self) -> TimeSlot {
        TimeSlot {
            start: self.start_time,
            end: self.end_time,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Pending && self.expires_at.is_some_and(|at| at <= now)
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status.occupies() && !self.is_expired(now)
    }
}

/// Everything the store needs to insert a pending reservation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReservation {
    pub venue_id: VenueId,
    pub date: NaiveDate,
    pub slot: TimeSlot,
    pub guest_count: u32,
    pub service_ids: Vec<ServiceId>,
    pub special_requests: Option<String>,
    pub total_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl NewReservation {
    pub fn into_reservation(self, id: ReservationId) -> Reservation {
        Reservation {
            id,
            venue_id: self.venue_id,
            date: self.date,
            start_time: self.slot.start,
            end_time: self.slot.end,
            status: ReservationStatus::Pending,
            guest_count: self.guest_count,
            service_ids: self.service_ids,
            special_requests: self.special_requests,
            total_price: self.total_price,
            created_at: self.created_at,
            expires_at: Some(self.expires_at),
        }
    }
}

/// Owner-imposed unavailability, inclusive on both ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub venue_id: VenueId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
}

impl Block {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}
