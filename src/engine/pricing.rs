use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::models::{BookingDraft, PricingUnit, TimeSlot, Venue};

/// Price quote for a draft. All-zero while the time window is incomplete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingBreakdown {
    pub hours: Decimal,
    pub base_price: Decimal,
    pub services_total: Decimal,
    pub subtotal: Decimal,
    pub taxes: Decimal,
    pub cleaning_fee: Decimal,
    pub security_deposit: Decimal,
    pub total: Decimal,
}

impl PricingBreakdown {
    /// Every component is non-negative and the parts add up to the total.
    pub fn check(&self) -> Result<(), String> {
        let parts = [
            ("hours", self.hours),
            ("base_price", self.base_price),
            ("services_total", self.services_total),
            ("taxes", self.taxes),
            ("cleaning_fee", self.cleaning_fee),
            ("security_deposit", self.security_deposit),
        ];
        let negative = parts.iter().find(|(_, v)| v.is_sign_negative() && !v.is_zero());
        if let Some((name, value)) = negative {
            return Err(format!("negative {} in quote: {}", name, value));
        }
        if self.subtotal != self.base_price + self.services_total {
            return Err(format!("subtotal {} does not match its parts", self.subtotal));
        }
        if self.total != self.subtotal + self.taxes + self.cleaning_fee + self.security_deposit {
            return Err(format!("total {} does not match its parts", self.total));
        }
        Ok(())
    }
}

fn cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub struct PricingCalculator;

impl PricingCalculator {
    /// Billed hours: actual duration, floored at the venue's minimum.
    pub fn billable_hours(slot: &TimeSlot, minimum_hours: u32) -> Decimal {
        let actual = Decimal::from(slot.minutes()) / Decimal::from(60);
        actual.max(Decimal::from(minimum_hours)).normalize()
    }

    pub fn services_total(draft: &BookingDraft, venue: &Venue) -> Decimal {
        draft
            .service_ids
            .iter()
            .filter_map(|id| venue.service(*id))
            .map(|service| match service.pricing_unit {
                PricingUnit::FlatRate => service.unit_price,
                // no guest count yet, contributes nothing
                PricingUnit::PerPerson => {
                    service.unit_price * Decimal::from(draft.guest_count.unwrap_or(0))
                }
            })
            .sum()
    }

    pub fn compute(draft: &BookingDraft, venue: &Venue) -> PricingBreakdown {
        let Some(slot) = draft.slot() else {
            return PricingBreakdown::default();
        };

        let hours = Self::billable_hours(&slot, venue.minimum_hours);
        let base_price = cents(hours * venue.base_price_per_hour);
        let services_total = cents(Self::services_total(draft, venue));
        let subtotal = base_price + services_total;
        let taxes = cents(subtotal * venue.tax_rate);
        let total = subtotal + taxes + venue.cleaning_fee + venue.security_deposit;

        PricingBreakdown {
            hours,
            base_price,
            services_total,
            subtotal,
            taxes,
            cleaning_fee: venue.cleaning_fee,
            security_deposit: venue.security_deposit,
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Service;
    use chrono::NaiveTime;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn venue() -> Venue {
        Venue {
            id: 1,
            name: "Garden Hall".to_string(),
            capacity: 120,
            base_price_per_hour: dec!(150),
            minimum_hours: 4,
            cleaning_fee: dec!(200),
            security_deposit: dec!(500),
            tax_rate: dec!(0.10),
            opening_time: t(8, 0),
            closing_time: t(23, 0),
            services: vec![
                Service {
                    id: 1,
                    name: "Catering".to_string(),
                    unit_price: dec!(25),
                    pricing_unit: PricingUnit::PerPerson,
                },
                Service {
                    id: 2,
                    name: "Sound system".to_string(),
                    unit_price: dec!(300),
                    pricing_unit: PricingUnit::FlatRate,
                },
            ],
        }
    }

    fn draft(
        start: NaiveTime,
        end: NaiveTime,
        guests: Option<u32>,
        services: &[i64],
    ) -> BookingDraft {
        BookingDraft {
            venue_id: 1,
            date: None,
            start_time: Some(start),
            end_time: Some(end),
            guest_count: guests,
            service_ids: services.iter().copied().collect(),
            special_requests: String::new(),
        }
    }

    #[test]
    fn minimum_hours_floor_and_per_person_catering() {
        let request = draft(t(14, 0), t(16, 0), Some(50), &[1]);
        let quote = PricingCalculator::compute(&request, &venue());
        assert_eq!(quote.hours, dec!(4));
        assert_eq!(quote.base_price, dec!(600));
        assert_eq!(quote.services_total, dec!(1250));
        assert_eq!(quote.subtotal, dec!(1850));
        assert_eq!(quote.taxes, dec!(185));
        assert_eq!(quote.total, dec!(2735));
        assert!(quote.check().is_ok());
    }

    #[test]
    fn long_booking_bills_actual_hours_and_flat_services() {
        let request = draft(t(10, 0), t(16, 30), Some(20), &[2]);
        let quote = PricingCalculator::compute(&request, &venue());
        assert_eq!(quote.hours, dec!(6.5));
        assert_eq!(quote.base_price, dec!(975));
        assert_eq!(quote.services_total, dec!(300));
        assert_eq!(quote.taxes, dec!(127.5));
        assert_eq!(quote.total, dec!(2102.5));
    }

    #[test]
    fn missing_time_window_quotes_zero() {
        let mut incomplete = draft(t(14, 0), t(16, 0), Some(50), &[1, 2]);
        incomplete.end_time = None;
        assert_eq!(PricingCalculator::compute(&incomplete, &venue()), PricingBreakdown::default());
    }

    #[test]
    fn per_person_service_without_guests_adds_nothing() {
        let quote = PricingCalculator::compute(&draft(t(14, 0), t(18, 0), None, &[1]), &venue());
        assert_eq!(quote.services_total, dec!(0));
        assert_eq!(quote.total, dec!(600) + dec!(60) + dec!(700));
    }

    #[test]
    fn unknown_service_ids_are_ignored() {
        let request = draft(t(14, 0), t(18, 0), Some(10), &[99]);
        let quote = PricingCalculator::compute(&request, &venue());
        assert_eq!(quote.services_total, dec!(0));
    }

    #[test]
    fn recomputing_is_identical() {
        let d = draft(t(9, 15), t(13, 40), Some(33), &[1, 2]);
        assert_eq!(
            PricingCalculator::compute(&d, &venue()),
            PricingCalculator::compute(&d, &venue())
        );
    }

    #[test]
    fn check_rejects_negative_components() {
        let quote = PricingBreakdown {
            base_price: dec!(-1),
            subtotal: dec!(-1),
            total: dec!(-1),
            ..Default::default()
        };
        assert!(quote.check().is_err());
    }

    proptest! {
        #[test]
        fn total_grows_with_guests_only_with_per_person_services(
            guests in 1u32..500,
            extra in 0u32..500,
            with_catering in any::<bool>(),
        ) {
            let services: &[i64] = if with_catering { &[1, 2] } else { &[2] };
            let small = draft(t(12, 0), t(17, 0), Some(guests), services);
            let large = draft(t(12, 0), t(17, 0), Some(guests + extra), services);
            let fewer = PricingCalculator::compute(&small, &venue());
            let more = PricingCalculator::compute(&large, &venue());
            if with_catering {
                prop_assert!(more.total >= fewer.total);
            } else {
                prop_assert_eq!(more.total, fewer.total);
            }
        }

        #[test]
        fn quotes_always_add_up(
            start in 8u32..20,
            len_minutes in 15i64..600,
            guests in proptest::option::of(1u32..300),
        ) {
            let start_time = t(start, 0);
            let end_time = start_time + chrono::Duration::minutes(len_minutes);
            prop_assume!(end_time > start_time);
            let request = draft(start_time, end_time, guests, &[1, 2]);
            let quote = PricingCalculator::compute(&request, &venue());
            prop_assert!(quote.check().is_ok());
            prop_assert!(quote.hours >= dec!(4));
        }
    }
}
