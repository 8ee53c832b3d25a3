//! Turns a finished draft into a pending reservation.
//!
//! Availability is re-classified against the live store, never against the
//! calendar the wizard loaded, and the final check happens inside the store's
//! atomic insert. A request is reserved exactly as asked or not at all.

use chrono::Duration;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::engine::availability::DayAvailability;
use crate::engine::pricing::PricingCalculator;
use crate::engine::wizard::validate_date_time;
use crate::error::{BookingError, ConflictDetail, Violation};
use crate::models::{
    BookingDraft, NewReservation, Reservation, ReservationId, ReservationStatus,
};
use crate::store::{InsertOutcome, ReservationStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The slot is held by a new pending reservation.
    Confirmed(Reservation),
    Conflict(ConflictDetail),
    Invalid(Vec<Violation>),
}

impl CommitOutcome {
    /// `Ok` for a held reservation, the matching [`BookingError`] otherwise.
    pub fn into_result(self) -> Result<Reservation, BookingError> {
        match self {
            CommitOutcome::Confirmed(reservation) => Ok(reservation),
            CommitOutcome::Conflict(detail) => Err(BookingError::AvailabilityConflict(detail)),
            CommitOutcome::Invalid(violations) => Err(BookingError::Validation(violations)),
        }
    }
}

#[derive(Clone)]
pub struct BookingCommitService {
    store: Arc<dyn ReservationStore>,
    clock: Arc<dyn Clock>,
    pending_ttl: Duration,
}

impl BookingCommitService {
    pub fn new(
        store: Arc<dyn ReservationStore>,
        clock: Arc<dyn Clock>,
        pending_ttl: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            pending_ttl,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub async fn reserve(&self, draft: &BookingDraft) -> Result<CommitOutcome, BookingError> {
        let now = self.clock.now();
        let today = now.date_naive();
        let venue = self.store.venue(draft.venue_id).await?;

        let mut violations: Vec<Violation> = draft
            .service_ids
            .iter()
            .filter(|id| venue.service(**id).is_none())
            .map(|id| Violation::UnknownService { service_id: *id })
            .collect();

        let day = match draft.date {
            Some(date) if date >= today => {
                let occupancy = self
                    .store
                    .occupancy(venue.id, date, date)
                    .await?
                    .active_at(now);
                if let Err(msg) = occupancy.audit() {
                    error!("venue {} on {}: {}", venue.id, date, msg);
                    return Err(BookingError::InternalInvariantViolation(msg));
                }
                occupancy.day(&venue, date, today)
            }
            // past or missing dates fail validation without a store round trip
            Some(date) => DayAvailability::unknown(date),
            None => DayAvailability::unknown(today),
        };
        violations.extend(validate_date_time(draft, &venue, &day, now.naive_utc()));

        let (Some(date), Some(slot), Some(guest_count)) =
            (draft.date, draft.slot(), draft.guest_count)
        else {
            return Ok(CommitOutcome::Invalid(violations));
        };

        if violations.iter().any(Violation::is_availability) {
            warn!("venue {} {} {:?} already taken: {:?}", venue.id, date, slot, violations);
            return Ok(CommitOutcome::Conflict(ConflictDetail {
                venue_id: venue.id,
                requested: slot,
                day,
                violations,
            }));
        }
        if !violations.is_empty() {
            return Ok(CommitOutcome::Invalid(violations));
        }

        let pricing = PricingCalculator::compute(draft, &venue);
        if let Err(msg) = pricing.check() {
            error!("quote for venue {} is unsound: {}", venue.id, msg);
            return Err(BookingError::InternalInvariantViolation(msg));
        }

        let Some(expires_at) = now.checked_add_signed(self.pending_ttl) else {
            let msg = format!("pending hold of {:?} from {} overflows", self.pending_ttl, now);
            error!("{}", msg);
            return Err(BookingError::InternalInvariantViolation(msg));
        };

        let request = NewReservation {
            venue_id: venue.id,
            date,
            slot,
            guest_count,
            service_ids: draft.service_ids.iter().copied().collect(),
            special_requests: draft.special_requests(),
            total_price: pricing.total,
            created_at: now,
            expires_at,
        };

        match self.store.insert_if_free(&venue, request, now).await? {
            InsertOutcome::Inserted(reservation) => {
                if reservation.date != date || reservation.slot() != slot {
                    let msg = format!(
                        "reservation {} stored as {} {:?}, requested {} {:?}",
                        reservation.id,
                        reservation.date,
                        reservation.slot(),
                        date,
                        slot
                    );
                    error!("{}", msg);
                    return Err(BookingError::InternalInvariantViolation(msg));
                }
                info!(
                    "Reservation {} pending for venue {} on {} until {:?}",
                    reservation.id, venue.id, date, reservation.expires_at
                );
                Ok(CommitOutcome::Confirmed(reservation))
            }
            InsertOutcome::Conflict(day) => {
                warn!("venue {} {} {:?} lost at commit", venue.id, date, slot);
                let violations = validate_date_time(draft, &venue, &day, now.naive_utc());
                Ok(CommitOutcome::Conflict(ConflictDetail {
                    venue_id: venue.id,
                    requested: slot,
                    day,
                    violations,
                }))
            }
        }
    }

    pub async fn reservation(&self, id: ReservationId) -> Result<Reservation, BookingError> {
        Ok(self.store.reservation(id).await?)
    }

    /// Promotes a pending hold, e.g. once payment went through.
    pub async fn confirm(&self, id: ReservationId) -> Result<Reservation, BookingError> {
        self.transition(id, ReservationStatus::Confirmed).await
    }

    pub async fn cancel(&self, id: ReservationId) -> Result<Reservation, BookingError> {
        self.transition(id, ReservationStatus::Cancelled).await
    }

    async fn transition(
        &self,
        id: ReservationId,
        next: ReservationStatus,
    ) -> Result<Reservation, BookingError> {
        let now = self.clock.now();
        let current = self.store.reservation(id).await?;
        if !current.status.can_transition_to(next) {
            return Err(BookingError::InvalidTransition {
                from: current.status,
                to: next,
            });
        }
        if next == ReservationStatus::Confirmed && current.is_expired(now) {
            return Err(BookingError::ReservationExpired(id));
        }

        match self.store.update_status(id, current.status, next, now).await? {
            Some(updated) => {
                info!("Reservation {} {:?} -> {:?}", id, current.status, updated.status);
                Ok(updated)
            }
            None => {
                // lost a race with the sweeper or another client
                let latest = self.store.reservation(id).await?;
                if next == ReservationStatus::Confirmed && latest.is_expired(now) {
                    return Err(BookingError::ReservationExpired(id));
                }
                Err(BookingError::InvalidTransition {
                    from: latest.status,
                    to: next,
                })
            }
        }
    }

    /// Frees lapsed pending holds; returns the reservations that were cancelled.
    pub async fn expire_pending(&self) -> Result<Vec<Reservation>, BookingError> {
        let expired = self.store.expire_pending(self.clock.now()).await?;
        Ok(expired)
    }
}
