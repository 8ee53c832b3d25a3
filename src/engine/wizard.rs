//! Booking wizard: date/time/guests → services → review → committed.
//!
//! The draft lives inside the state it belongs to, so a committed or abandoned
//! wizard has no draft left to mutate and an unreachable step cannot be entered
//! by index arithmetic.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::availability::{DayAvailability, DayStatus};
use super::pricing::{PricingBreakdown, PricingCalculator};
use crate::error::{BookingError, ConflictDetail, Violation};
use crate::models::{BookingDraft, Reservation, ServiceId, Venue};
use crate::services::commit::{BookingCommitService, CommitOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    DateTime,
    Services,
    Review,
    Committed,
    Abandoned,
}

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("step blocked: {violations:?}")]
    Invalid { violations: Vec<Violation> },
    #[error("{field} cannot be edited during {step:?}")]
    NotEditable {
        field: &'static str,
        step: WizardStep,
    },
    #[error("service {0} is not offered by this venue")]
    UnknownService(ServiceId),
    #[error("cannot {action} from {step:?}")]
    IllegalTransition {
        action: &'static str,
        step: WizardStep,
    },
    #[error("slot was taken before commit")]
    Conflict(ConflictDetail),
    #[error(transparent)]
    Commit(#[from] BookingError),
}

#[derive(Debug, Clone)]
enum WizardState {
    DateTime(BookingDraft),
    Services(BookingDraft),
    Review {
        draft: BookingDraft,
        pricing: PricingBreakdown,
    },
    Committed(Reservation),
    Abandoned,
}

impl WizardState {
    fn step(&self) -> WizardStep {
        match self {
            WizardState::DateTime(_) => WizardStep::DateTime,
            WizardState::Services(_) => WizardStep::Services,
            WizardState::Review { .. } => WizardStep::Review,
            WizardState::Committed(_) => WizardStep::Committed,
            WizardState::Abandoned => WizardStep::Abandoned,
        }
    }
}

/// Gate for leaving the date/time/guests step. Returns every violated clause.
///
/// `now` is UTC wall-clock time; its date is "today".
pub fn validate_date_time(
    draft: &BookingDraft,
    venue: &Venue,
    day: &DayAvailability,
    now: NaiveDateTime,
) -> Vec<Violation> {
    let today = now.date();
    let mut violations = Vec::new();

    let status = match draft.date {
        None => {
            violations.push(Violation::DateMissing);
            None
        }
        Some(date) if date < today => {
            violations.push(Violation::DateInPast { date });
            None
        }
        // availability for some other date says nothing about this one
        Some(date) if day.date != date => {
            violations.push(Violation::DateUnknown { date });
            None
        }
        Some(date) => {
            match day.status {
                DayStatus::Past => violations.push(Violation::DateInPast { date }),
                DayStatus::Blocked => violations.push(Violation::DateBlocked { date }),
                DayStatus::FullyBooked => violations.push(Violation::DateFullyBooked { date }),
                DayStatus::Unknown => violations.push(Violation::DateUnknown { date }),
                DayStatus::Available | DayStatus::PartiallyBooked => {}
            }
            Some(day.status)
        }
    };

    match (draft.start_time, draft.end_time) {
        (Some(start), Some(end)) if start >= end => {
            violations.push(Violation::StartNotBeforeEnd { start, end });
        }
        (Some(_), Some(_)) => {
            if let Some(slot) = draft.slot() {
                if !venue.operating_window().contains(&slot) {
                    violations.push(Violation::OutsideOperatingHours {
                        opening: venue.opening_time,
                        closing: venue.closing_time,
                    });
                } else if draft.date == Some(today) && slot.end <= now.time() {
                    violations.push(Violation::SlotEnded {
                        date: today,
                        end: slot.end,
                    });
                } else if status.is_some_and(|s| s.is_selectable()) && !day.admits(&slot) {
                    violations.push(Violation::SlotTaken {
                        free_slots: day.free_slots.clone(),
                    });
                }
            }
        }
        _ => violations.push(Violation::TimeWindowMissing),
    }

    match draft.guest_count {
        None => violations.push(Violation::GuestCountMissing),
        Some(guest_count) if guest_count == 0 || guest_count > venue.capacity => {
            violations.push(Violation::GuestCountOutOfRange {
                guest_count,
                capacity: venue.capacity,
            });
        }
        Some(_) => {}
    }

    violations
}

/// One user's booking session over a venue and the calendar loaded for it.
#[derive(Debug, Clone)]
pub struct BookingWizard {
    venue: Venue,
    now: NaiveDateTime,
    calendar: BTreeMap<NaiveDate, DayAvailability>,
    state: WizardState,
}

impl BookingWizard {
    /// `now` is the UTC wall-clock time the session runs against.
    pub fn new(venue: Venue, calendar: Vec<DayAvailability>, now: NaiveDateTime) -> Self {
        let draft = BookingDraft::new(venue.id);
        let mut wizard = Self {
            venue,
            now,
            calendar: BTreeMap::new(),
            state: WizardState::DateTime(draft),
        };
        wizard.replace_calendar(calendar);
        wizard
    }

    pub fn step(&self) -> WizardStep {
        self.state.step()
    }

    pub fn venue(&self) -> &Venue {
        &self.venue
    }

    pub fn draft(&self) -> Option<&BookingDraft> {
        match &self.state {
            WizardState::DateTime(draft) | WizardState::Services(draft) => Some(draft),
            WizardState::Review { draft, .. } => Some(draft),
            WizardState::Committed(_) | WizardState::Abandoned => None,
        }
    }

    pub fn reservation(&self) -> Option<&Reservation> {
        match &self.state {
            WizardState::Committed(reservation) => Some(reservation),
            _ => None,
        }
    }

    /// Days not in the loaded calendar are `Unknown` and cannot be selected.
    pub fn day(&self, date: NaiveDate) -> DayAvailability {
        self.calendar
            .get(&date)
            .cloned()
            .unwrap_or_else(|| DayAvailability::unknown(date))
    }

    pub fn calendar(&self) -> impl Iterator<Item = &DayAvailability> {
        self.calendar.values()
    }

    pub fn replace_calendar(&mut self, days: Vec<DayAvailability>) {
        self.calendar = days.into_iter().map(|day| (day.date, day)).collect();
    }

    pub fn update_day(&mut self, day: DayAvailability) {
        self.calendar.insert(day.date, day);
    }

    /// Live quote for the current draft; zero once the draft is gone.
    pub fn pricing(&self) -> PricingBreakdown {
        self.draft()
            .map(|draft| PricingCalculator::compute(draft, &self.venue))
            .unwrap_or_default()
    }

    /// Violations the date/time step would report right now.
    pub fn date_time_violations(&self) -> Vec<Violation> {
        match self.draft() {
            Some(draft) => self.validate(draft),
            None => Vec::new(),
        }
    }

    fn validate(&self, draft: &BookingDraft) -> Vec<Violation> {
        let day = match draft.date {
            Some(date) => self.day(date),
            None => DayAvailability::unknown(self.now.date()),
        };
        validate_date_time(draft, &self.venue, &day, self.now)
    }

    fn editable(
        &mut self,
        field: &'static str,
        allowed: WizardStep,
    ) -> Result<&mut BookingDraft, WizardError> {
        let step = self.state.step();
        match &mut self.state {
            WizardState::DateTime(draft) if allowed == WizardStep::DateTime => Ok(draft),
            WizardState::Services(draft) if allowed == WizardStep::Services => Ok(draft),
            _ => Err(WizardError::NotEditable { field, step }),
        }
    }

    pub fn select_date(&mut self, date: NaiveDate) -> Result<(), WizardError> {
        self.editable("date", WizardStep::DateTime)?.date = Some(date);
        Ok(())
    }

    pub fn set_time_window(&mut self, start: NaiveTime, end: NaiveTime) -> Result<(), WizardError> {
        let draft = self.editable("time window", WizardStep::DateTime)?;
        draft.start_time = Some(start);
        draft.end_time = Some(end);
        Ok(())
    }

    pub fn set_guest_count(&mut self, guest_count: u32) -> Result<(), WizardError> {
        self.editable("guest count", WizardStep::DateTime)?.guest_count = Some(guest_count);
        Ok(())
    }

    /// Adds the service if absent, removes it otherwise. Returns whether it is now selected.
    pub fn toggle_service(&mut self, service_id: ServiceId) -> Result<bool, WizardError> {
        if self.venue.service(service_id).is_none() {
            return Err(WizardError::UnknownService(service_id));
        }
        let draft = self.editable("services", WizardStep::Services)?;
        if draft.service_ids.remove(&service_id) {
            Ok(false)
        } else {
            draft.service_ids.insert(service_id);
            Ok(true)
        }
    }

    pub fn set_special_requests(&mut self, text: impl Into<String>) -> Result<(), WizardError> {
        self.editable("special requests", WizardStep::Services)?.special_requests = text.into();
        Ok(())
    }

    /// Forward transition. DateTime → Services is gated; Services → Review always succeeds.
    pub fn next(&mut self) -> Result<WizardStep, WizardError> {
        let state = std::mem::replace(&mut self.state, WizardState::Abandoned);
        let (state, result) = match state {
            WizardState::DateTime(draft) => {
                let violations = self.validate(&draft);
                if violations.is_empty() {
                    (WizardState::Services(draft), Ok(WizardStep::Services))
                } else {
                    debug!("date/time step blocked: {:?}", violations);
                    (WizardState::DateTime(draft), Err(WizardError::Invalid { violations }))
                }
            }
            WizardState::Services(draft) => {
                let pricing = PricingCalculator::compute(&draft, &self.venue);
                (WizardState::Review { draft, pricing }, Ok(WizardStep::Review))
            }
            other => {
                let step = other.step();
                (other, Err(WizardError::IllegalTransition { action: "advance", step }))
            }
        };
        self.state = state;
        result
    }

    /// Backward transition; keeps everything already entered.
    pub fn back(&mut self) -> Result<WizardStep, WizardError> {
        let state = std::mem::replace(&mut self.state, WizardState::Abandoned);
        let (state, result) = match state {
            WizardState::Services(draft) => {
                (WizardState::DateTime(draft), Ok(WizardStep::DateTime))
            }
            WizardState::Review { draft, .. } => {
                (WizardState::Services(draft), Ok(WizardStep::Services))
            }
            other => {
                let step = other.step();
                (other, Err(WizardError::IllegalTransition { action: "go back", step }))
            }
        };
        self.state = state;
        result
    }

    /// Drops the draft. No reservation is touched.
    pub fn abandon(&mut self) -> Result<(), WizardError> {
        if matches!(self.state, WizardState::Committed(_) | WizardState::Abandoned) {
            return Err(WizardError::IllegalTransition {
                action: "abandon",
                step: self.step(),
            });
        }
        self.state = WizardState::Abandoned;
        Ok(())
    }

    /// Quote shown on the review step, computed when the step was entered.
    pub fn review_pricing(&self) -> Option<&PricingBreakdown> {
        match &self.state {
            WizardState::Review { pricing, .. } => Some(pricing),
            _ => None,
        }
    }

    /// Re-validates the draft, then asks the commit service to reserve the slot.
    ///
    /// Invalid drafts and lost races send the wizard back to the date/time step with
    /// the draft intact; upstream failures leave it on review so the user can retry.
    pub async fn commit(
        &mut self,
        service: &BookingCommitService,
    ) -> Result<Reservation, WizardError> {
        let draft = match &self.state {
            WizardState::Review { draft, .. } => draft.clone(),
            other => {
                return Err(WizardError::IllegalTransition {
                    action: "commit",
                    step: other.step(),
                })
            }
        };

        let violations = self.validate(&draft);
        if !violations.is_empty() {
            self.state = WizardState::DateTime(draft);
            return Err(WizardError::Invalid { violations });
        }

        match service.reserve(&draft).await? {
            CommitOutcome::Confirmed(reservation) => {
                info!(
                    "wizard committed reservation {} for venue {}",
                    reservation.id, reservation.venue_id
                );
                self.state = WizardState::Committed(reservation.clone());
                Ok(reservation)
            }
            CommitOutcome::Conflict(detail) => {
                warn!(
                    "wizard lost slot {:?} on {} for venue {}",
                    detail.requested, detail.day.date, detail.venue_id
                );
                self.update_day(detail.day.clone());
                self.state = WizardState::DateTime(draft);
                Err(WizardError::Conflict(detail))
            }
            CommitOutcome::Invalid(violations) => {
                self.state = WizardState::DateTime(draft);
                Err(WizardError::Invalid { violations })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PricingUnit, Service};
    use rust_decimal_macros::dec;

    fn t(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 7, day).unwrap()
    }

    fn venue() -> Venue {
        Venue {
            id: 3,
            name: "Rooftop".to_string(),
            capacity: 60,
            base_price_per_hour: dec!(150),
            minimum_hours: 4,
            cleaning_fee: dec!(200),
            security_deposit: dec!(500),
            tax_rate: dec!(0.10),
            opening_time: t(8),
            closing_time: t(23),
            services: vec![Service {
                id: 11,
                name: "Catering".to_string(),
                unit_price: dec!(25),
                pricing_unit: PricingUnit::PerPerson,
            }],
        }
    }

    fn open_day(date: NaiveDate) -> DayAvailability {
        DayAvailability {
            date,
            status: DayStatus::Available,
            free_slots: vec![venue().operating_window()],
        }
    }

    fn wizard() -> BookingWizard {
        wizard_at(d(1).and_hms_opt(9, 0, 0).unwrap())
    }

    fn wizard_at(now: NaiveDateTime) -> BookingWizard {
        BookingWizard::new(
            venue(),
            vec![
                open_day(d(10)),
                DayAvailability {
                    date: d(11),
                    status: DayStatus::Blocked,
                    free_slots: vec![],
                },
                DayAvailability {
                    date: d(12),
                    status: DayStatus::PartiallyBooked,
                    free_slots: vec![crate::models::TimeSlot { start: t(8), end: t(12) }],
                },
            ],
            now,
        )
    }

    #[test]
    fn empty_draft_reports_each_missing_clause() {
        let mut w = wizard();
        let err = w.next().unwrap_err();
        let WizardError::Invalid { violations } = err else {
            panic!("expected validation error");
        };
        assert_eq!(
            violations,
            vec![Violation::DateMissing, Violation::TimeWindowMissing, Violation::GuestCountMissing]
        );
        assert_eq!(w.step(), WizardStep::DateTime);
    }

    #[test]
    fn specific_clause_is_surfaced() {
        let mut w = wizard();
        w.select_date(d(10)).unwrap();
        w.set_time_window(t(16), t(14)).unwrap();
        w.set_guest_count(61).unwrap();
        assert_eq!(
            w.date_time_violations(),
            vec![
                Violation::StartNotBeforeEnd { start: t(16), end: t(14) },
                Violation::GuestCountOutOfRange { guest_count: 61, capacity: 60 },
            ]
        );
    }

    #[test]
    fn blocked_and_unloaded_dates_are_rejected() {
        let mut w = wizard();
        w.set_time_window(t(14), t(16)).unwrap();
        w.set_guest_count(10).unwrap();

        w.select_date(d(11)).unwrap();
        assert_eq!(w.date_time_violations(), vec![Violation::DateBlocked { date: d(11) }]);

        w.select_date(d(20)).unwrap();
        assert_eq!(w.date_time_violations(), vec![Violation::DateUnknown { date: d(20) }]);
    }

    #[test]
    fn partially_booked_day_rejects_taken_time() {
        let mut w = wizard();
        w.select_date(d(12)).unwrap();
        w.set_guest_count(10).unwrap();
        w.set_time_window(t(11), t(13)).unwrap();
        assert!(matches!(
            w.date_time_violations().as_slice(),
            [Violation::SlotTaken { .. }]
        ));
        w.set_time_window(t(9), t(12)).unwrap();
        assert!(w.date_time_violations().is_empty());
    }

    #[test]
    fn forward_and_back_keep_entered_data() {
        let mut w = wizard();
        w.select_date(d(10)).unwrap();
        w.set_time_window(t(14), t(16)).unwrap();
        w.set_guest_count(50).unwrap();
        assert_eq!(w.next().unwrap(), WizardStep::Services);

        assert!(w.set_guest_count(20).is_err());
        assert!(w.toggle_service(11).unwrap());
        w.set_special_requests("vegan options").unwrap();
        assert_eq!(w.next().unwrap(), WizardStep::Review);
        assert_eq!(w.review_pricing().unwrap().total, dec!(2735));

        assert_eq!(w.back().unwrap(), WizardStep::Services);
        assert_eq!(w.back().unwrap(), WizardStep::DateTime);
        let draft = w.draft().unwrap();
        assert_eq!(draft.guest_count, Some(50));
        assert!(draft.service_ids.contains(&11));
        assert_eq!(draft.special_requests, "vegan options");
        assert!(w.back().is_err());
    }

    #[test]
    fn review_cannot_advance_without_commit() {
        let mut w = wizard();
        w.select_date(d(10)).unwrap();
        w.set_time_window(t(14), t(16)).unwrap();
        w.set_guest_count(5).unwrap();
        w.next().unwrap();
        w.next().unwrap();
        assert!(matches!(
            w.next(),
            Err(WizardError::IllegalTransition { step: WizardStep::Review, .. })
        ));
    }

    #[test]
    fn todays_finished_slots_are_rejected() {
        let mut w = wizard_at(d(10).and_hms_opt(15, 0, 0).unwrap());
        w.select_date(d(10)).unwrap();
        w.set_guest_count(10).unwrap();

        w.set_time_window(t(9), t(12)).unwrap();
        assert_eq!(
            w.date_time_violations(),
            vec![Violation::SlotEnded { date: d(10), end: t(12) }]
        );

        w.set_time_window(t(12), t(15)).unwrap();
        assert!(matches!(w.date_time_violations().as_slice(), [Violation::SlotEnded { .. }]));

        // still running at `now`, so it can be booked
        w.set_time_window(t(14), t(17)).unwrap();
        assert!(w.date_time_violations().is_empty());
    }

    #[test]
    fn unknown_service_is_refused() {
        let mut w = wizard();
        assert!(matches!(w.toggle_service(99), Err(WizardError::UnknownService(99))));
    }

    #[test]
    fn abandon_discards_draft() {
        let mut w = wizard();
        w.select_date(d(10)).unwrap();
        w.abandon().unwrap();
        assert_eq!(w.step(), WizardStep::Abandoned);
        assert!(w.draft().is_none());
        assert_eq!(w.pricing(), PricingBreakdown::default());
        assert!(w.select_date(d(10)).is_err());
        assert!(w.abandon().is_err());
    }
}
