//! Per-day availability derived from reservations and owner blocks.
//!
//! Nothing here touches the store: a calendar month is recomputed from the
//! already-fetched facts on every call, so it can never go stale relative to them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::error;

use crate::models::{Block, Reservation, ReservationId, TimeSlot, Venue, VenueId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    Past,
    Available,
    PartiallyBooked,
    FullyBooked,
    Blocked,
    /// Reservations or blocks for the day could not be fetched.
    Unknown,
}

impl DayStatus {
    pub fn is_selectable(&self) -> bool {
        matches!(self, DayStatus::Available | DayStatus::PartiallyBooked)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub status: DayStatus,
    /// Gaps of the operating window still open for booking. Empty unless selectable.
    pub free_slots: Vec<TimeSlot>,
}

impl DayAvailability {
    pub fn unknown(date: NaiveDate) -> Self {
        Self {
            date,
            status: DayStatus::Unknown,
            free_slots: Vec::new(),
        }
    }

    /// `true` when `slot` fits entirely inside one free gap.
    pub fn admits(&self, slot: &TimeSlot) -> bool {
        self.status.is_selectable() && self.free_slots.iter().any(|free| free.contains(slot))
    }
}

/// Status of a single day; see [`day_availability`] for the rules.
pub fn classify(
    venue: &Venue,
    date: NaiveDate,
    reservations: &[Reservation],
    blocks: &[Block],
    today: NaiveDate,
) -> DayStatus {
    day_availability(venue, date, reservations, blocks, today).status
}

/// Rules in priority order: past, blocked, fully booked, partially booked, available.
pub fn day_availability(
    venue: &Venue,
    date: NaiveDate,
    reservations: &[Reservation],
    blocks: &[Block],
    today: NaiveDate,
) -> DayAvailability {
    let closed = |status| DayAvailability {
        date,
        status,
        free_slots: Vec::new(),
    };

    if date < today {
        return closed(DayStatus::Past);
    }
    if blocks.iter().any(|b| b.venue_id == venue.id && b.covers(date)) {
        return closed(DayStatus::Blocked);
    }

    let window = venue.operating_window();
    let occupied: Vec<TimeSlot> = reservations
        .iter()
        .filter(|r| r.venue_id == venue.id && r.date == date && r.status.occupies())
        .filter_map(|r| r.slot().clip(&window))
        .collect();

    let free_slots = free_slots(&window, occupied.iter().copied());
    let status = if free_slots.is_empty() {
        DayStatus::FullyBooked
    } else if occupied.is_empty() {
        DayStatus::Available
    } else {
        DayStatus::PartiallyBooked
    };

    DayAvailability {
        date,
        status,
        free_slots,
    }
}

/// Gaps of `window` not covered by any of `occupied`, in time order.
pub fn free_slots(
    window: &TimeSlot,
    occupied: impl IntoIterator<Item = TimeSlot>,
) -> Vec<TimeSlot> {
    let mut taken: Vec<TimeSlot> = occupied
        .into_iter()
        .filter_map(|slot| slot.clip(window))
        .collect();
    taken.sort();

    let mut gaps = Vec::new();
    let mut cursor = window.start;
    for slot in taken {
        if slot.start > cursor {
            gaps.push(TimeSlot {
                start: cursor,
                end: slot.start,
            });
        }
        cursor = cursor.max(slot.end);
    }
    if cursor < window.end {
        gaps.push(TimeSlot {
            start: cursor,
            end: window.end,
        });
    }
    gaps
}

/// One `Unknown` entry per day of `[from, to]`; what callers show when the feed failed.
pub fn unknown_range(from: NaiveDate, to: NaiveDate) -> Vec<DayAvailability> {
    from.iter_days()
        .take_while(|d| *d <= to)
        .map(DayAvailability::unknown)
        .collect()
}

/// Calendar for one venue over `[from, to]` as served to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailabilityCalendar {
    pub venue_id: VenueId,
    /// `false` when the feed failed and every day is reported as `Unknown`.
    pub complete: bool,
    pub days: Vec<DayAvailability>,
}

impl AvailabilityCalendar {
    /// Classifies every day of `[from, to]`, or marks them all `Unknown` if the venue or
    /// occupancy feed failed or the occupancy fails its overlap audit.
    pub fn resolve<E: fmt::Debug>(
        venue_id: VenueId,
        feed: Result<(Venue, Occupancy), E>,
        from: NaiveDate,
        to: NaiveDate,
        now: DateTime<Utc>,
    ) -> Self {
        let unknown = || AvailabilityCalendar {
            venue_id,
            complete: false,
            days: unknown_range(from, to),
        };

        let (venue, occupancy) = match feed {
            Ok(feed) => feed,
            Err(e) => {
                error!("availability feed for venue {} failed: {:?}", venue_id, e);
                return unknown();
            }
        };
        let occupancy = occupancy.active_at(now);
        if let Err(msg) = occupancy.audit() {
            error!("availability for venue {}: {}", venue_id, msg);
            return unknown();
        }

        AvailabilityCalendar {
            venue_id,
            complete: true,
            days: occupancy.calendar(&venue, from, to, now.date_naive()),
        }
    }
}

/// Reservations and blocks fetched for one venue over a date range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupancy {
    pub reservations: Vec<Reservation>,
    pub blocks: Vec<Block>,
}

impl Occupancy {
    pub fn new(reservations: Vec<Reservation>, blocks: Vec<Block>) -> Self {
        Self {
            reservations,
            blocks,
        }
    }

    /// Drops cancelled reservations and pending ones whose hold has lapsed.
    pub fn active_at(mut self, now: DateTime<Utc>) -> Self {
        self.reservations.retain(|r| r.is_active(now));
        self
    }

    pub fn day(&self, venue: &Venue, date: NaiveDate, today: NaiveDate) -> DayAvailability {
        day_availability(venue, date, &self.reservations, &self.blocks, today)
    }

    pub fn calendar(
        &self,
        venue: &Venue,
        from: NaiveDate,
        to: NaiveDate,
        today: NaiveDate,
    ) -> Vec<DayAvailability> {
        from.iter_days()
            .take_while(|d| *d <= to)
            .map(|date| self.day(venue, date, today))
            .collect()
    }

    /// `Ok` if `slot` on `date` can be taken; otherwise the day as it currently stands.
    pub fn admits(
        &self,
        venue: &Venue,
        date: NaiveDate,
        slot: &TimeSlot,
        today: NaiveDate,
    ) -> Result<(), DayAvailability> {
        let day = self.day(venue, date, today);
        let overlaps = self.reservations.iter().any(|r| {
            r.venue_id == venue.id
                && r.date == date
                && r.status.occupies()
                && r.slot().overlaps(slot)
        });
        if overlaps || !day.admits(slot) {
            return Err(day);
        }
        Ok(())
    }

    /// Pairs of occupying reservations that share a point in time.
    pub fn overlapping_pairs(&self) -> Vec<(ReservationId, ReservationId)> {
        let mut by_day: BTreeMap<(VenueId, NaiveDate), Vec<&Reservation>> = BTreeMap::new();
        for reservation in self.reservations.iter().filter(|r| r.status.occupies()) {
            by_day
                .entry((reservation.venue_id, reservation.date))
                .or_default()
                .push(reservation);
        }

        let mut pairs = Vec::new();
        for day in by_day.values_mut() {
            day.sort_by_key(|r| (r.start_time, r.end_time));
            let mut widest: Option<&Reservation> = None;
            for reservation in day.iter().copied() {
                if let Some(prev) = widest {
                    if reservation.start_time < prev.end_time {
                        pairs.push((prev.id, reservation.id));
                    }
                }
                if widest.map_or(true, |prev| reservation.end_time > prev.end_time) {
                    widest = Some(reservation);
                }
            }
        }
        pairs
    }

    /// Fails if two occupying reservations overlap; that means the store itself is corrupt.
    pub fn audit(&self) -> Result<(), String> {
        match self.overlapping_pairs().as_slice() {
            [] => Ok(()),
            pairs => Err(format!("overlapping active reservations: {:?}", pairs)),
        }
    }
}
