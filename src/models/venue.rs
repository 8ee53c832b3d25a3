use chrono::NaiveTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::reservation::TimeSlot;

pub type VenueId = i64;
pub type ServiceId = i64;

/// How a catalog service is billed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingUnit {
    /// `unit_price * guest_count`
    PerPerson,
    /// `unit_price` once per booking
    FlatRate,
}

impl PricingUnit {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "per_person" => Some(PricingUnit::PerPerson),
            "flat_rate" => Some(PricingUnit::FlatRate),
            _ => None,
        }
    }
}

/// À-la-carte item from the venue's service catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: ServiceId,
    pub name: String,
    pub unit_price: Decimal,
    pub pricing_unit: PricingUnit,
}

/// Venue together with its rate card. Built only through
/// [`crate::models::records::VenueRecord`] so every field is already validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Venue {
    pub id: VenueId,
    pub name: String,
    pub capacity: u32,
    pub base_price_per_hour: Decimal,
    pub minimum_hours: u32,
    pub cleaning_fee: Decimal,
    pub security_deposit: Decimal,
    pub tax_rate: Decimal,
    pub opening_time: NaiveTime,
    pub closing_time: NaiveTime,
    pub services: Vec<Service>,
}

impl Venue {
    pub fn service(&self, id: ServiceId) -> Option<&Service> {
        self.services.iter().find(|s| s.id == id)
    }

    /// Open-to-close window that has to be fully reserved for a day to count as fully booked.
    pub fn operating_window(&self) -> TimeSlot {
        TimeSlot {
            start: self.opening_time,
            end: self.closing_time,
        }
    }
}
