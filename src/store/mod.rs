//! Booking store boundary: the read feeds the engine consumes and the single
//! atomic write it performs.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::engine::availability::{DayAvailability, Occupancy};
use crate::error::StoreError;
use crate::models::{NewReservation, Reservation, ReservationId, ReservationStatus, Venue, VenueId};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryReservationStore;
pub use postgres::PgReservationStore;

/// Result of the atomic check-and-insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(Reservation),
    /// The slot is not free; carries the day as the store sees it right now.
    Conflict(DayAvailability),
}

#[async_trait]
pub trait ReservationStore: Send + Sync {
    async fn venue(&self, venue_id: VenueId) -> Result<Venue, StoreError>;

    /// Pending and confirmed reservations plus blocks touching `[from, to]`.
    /// Lapsed pending holds may still be included; callers filter with `Occupancy::active_at`.
    async fn occupancy(
        &self,
        venue_id: VenueId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Occupancy, StoreError>;

    /// Re-checks availability and inserts a pending reservation as one atomic step.
    /// Concurrent calls for overlapping slots on the same venue admit at most one.
    async fn insert_if_free(
        &self,
        venue: &Venue,
        request: NewReservation,
        now: DateTime<Utc>,
    ) -> Result<InsertOutcome, StoreError>;

    async fn reservation(&self, id: ReservationId) -> Result<Reservation, StoreError>;

    /// Compare-and-set on status. `None` if the status is no longer `expected`
    /// or the reservation is a pending hold that lapsed before `now`.
    async fn update_status(
        &self,
        id: ReservationId,
        expected: ReservationStatus,
        next: ReservationStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Reservation>, StoreError>;

    /// Cancels every pending reservation whose hold lapsed at or before `now`.
    async fn expire_pending(&self, now: DateTime<Utc>) -> Result<Vec<Reservation>, StoreError>;
}
