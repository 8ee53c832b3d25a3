use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use super::{InsertOutcome, ReservationStore};
use crate::engine::availability::Occupancy;
use crate::error::StoreError;
use crate::models::{
    Block, NewReservation, Reservation, ReservationId, ReservationStatus, Venue, VenueId,
};

#[derive(Debug, Default)]
struct VenueLedger {
    reservations: Vec<Reservation>,
    blocks: Vec<Block>,
}

impl VenueLedger {
    fn cancel_lapsed(&mut self, date: Option<NaiveDate>, now: DateTime<Utc>) -> Vec<Reservation> {
        let mut lapsed = Vec::new();
        for reservation in self.reservations.iter_mut() {
            if reservation.is_expired(now) && date.map_or(true, |d| d == reservation.date) {
                reservation.status = ReservationStatus::Cancelled;
                lapsed.push(reservation.clone());
            }
        }
        lapsed
    }
}

/// Process-local store. Each venue has its own lock, so venues never contend.
#[derive(Debug, Default)]
pub struct InMemoryReservationStore {
    venues: DashMap<VenueId, Venue>,
    ledgers: DashMap<VenueId, Arc<Mutex<VenueLedger>>>,
    owners: DashMap<ReservationId, VenueId>,
    next_id: AtomicI64,
    offline: AtomicBool,
}

impl InMemoryReservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_venue(&self, venue: Venue) {
        self.ledgers.entry(venue.id).or_default();
        self.venues.insert(venue.id, venue);
    }

    pub fn add_block(&self, block: Block) {
        self.ledger(block.venue_id).lock().blocks.push(block);
    }

    /// Inserts a reservation as-is, bypassing the availability check. Seeds fixtures.
    pub fn seed_reservation(&self, reservation: Reservation) {
        self.next_id.fetch_max(reservation.id, Ordering::SeqCst);
        self.owners.insert(reservation.id, reservation.venue_id);
        self.ledger(reservation.venue_id).lock().reservations.push(reservation);
    }

    /// Makes every call fail as if the backing database were unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Every reservation ever stored for the venue, including cancelled ones.
    pub fn all_reservations(&self, venue_id: VenueId) -> Vec<Reservation> {
        self.ledger(venue_id).lock().reservations.clone()
    }

    fn ledger(&self, venue_id: VenueId) -> Arc<Mutex<VenueLedger>> {
        self.ledgers.entry(venue_id).or_default().clone()
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store is offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ReservationStore for InMemoryReservationStore {
    async fn venue(&self, venue_id: VenueId) -> Result<Venue, StoreError> {
        self.ensure_online()?;
        self.venues
            .get(&venue_id)
            .map(|v| v.clone())
            .ok_or(StoreError::NotFound {
                entity: "venue",
                id: venue_id,
            })
    }

    async fn occupancy(
        &self,
        venue_id: VenueId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Occupancy, StoreError> {
        self.ensure_online()?;
        let ledger = self.ledger(venue_id);
        let ledger = ledger.lock();
        let reservations = ledger
            .reservations
            .iter()
            .filter(|r| r.status.occupies() && from <= r.date && r.date <= to)
            .cloned()
            .collect();
        let blocks = ledger
            .blocks
            .iter()
            .filter(|b| b.start_date <= to && from <= b.end_date)
            .cloned()
            .collect();
        Ok(Occupancy::new(reservations, blocks))
    }

    async fn insert_if_free(
        &self,
        venue: &Venue,
        request: NewReservation,
        now: DateTime<Utc>,
    ) -> Result<InsertOutcome, StoreError> {
        self.ensure_online()?;
        let ledger = self.ledger(venue.id);
        let mut ledger = ledger.lock();

        let lapsed = ledger.cancel_lapsed(Some(request.date), now);
        if !lapsed.is_empty() {
            debug!(
                "released {} lapsed holds on {} for venue {}",
                lapsed.len(),
                request.date,
                venue.id
            );
        }

        let occupancy =
            Occupancy::new(ledger.reservations.clone(), ledger.blocks.clone()).active_at(now);
        occupancy.audit().map_err(StoreError::Invariant)?;
        if let Err(day) = occupancy.admits(venue, request.date, &request.slot, now.date_naive()) {
            return Ok(InsertOutcome::Conflict(day));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let reservation = request.into_reservation(id);
        ledger.reservations.push(reservation.clone());
        self.owners.insert(id, venue.id);
        info!("reservation {} held for venue {} on {}", id, venue.id, reservation.date);
        Ok(InsertOutcome::Inserted(reservation))
    }

    async fn reservation(&self, id: ReservationId) -> Result<Reservation, StoreError> {
        self.ensure_online()?;
        let not_found = || StoreError::NotFound {
            entity: "reservation",
            id,
        };
        let venue_id = self.owners.get(&id).map(|v| *v).ok_or_else(not_found)?;
        let ledger = self.ledger(venue_id);
        let ledger = ledger.lock();
        ledger
            .reservations
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(not_found)
    }

    async fn update_status(
        &self,
        id: ReservationId,
        expected: ReservationStatus,
        next: ReservationStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Reservation>, StoreError> {
        self.ensure_online()?;
        let Some(venue_id) = self.owners.get(&id).map(|v| *v) else {
            return Err(StoreError::NotFound {
                entity: "reservation",
                id,
            });
        };
        let ledger = self.ledger(venue_id);
        let mut ledger = ledger.lock();
        let Some(reservation) = ledger.reservations.iter_mut().find(|r| r.id == id) else {
            return Err(StoreError::NotFound {
                entity: "reservation",
                id,
            });
        };
        let lapsed = next == ReservationStatus::Confirmed && reservation.is_expired(now);
        if reservation.status != expected || lapsed {
            return Ok(None);
        }
        reservation.status = next;
        if next != ReservationStatus::Pending {
            reservation.expires_at = None;
        }
        Ok(Some(reservation.clone()))
    }

    async fn expire_pending(&self, now: DateTime<Utc>) -> Result<Vec<Reservation>, StoreError> {
        self.ensure_online()?;
        let ledgers: Vec<Arc<Mutex<VenueLedger>>> =
            self.ledgers.iter().map(|entry| entry.value().clone()).collect();
        let mut expired = Vec::new();
        for ledger in ledgers {
            expired.extend(ledger.lock().cancel_lapsed(None, now));
        }
        Ok(expired)
    }
}
