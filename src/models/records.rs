//! Raw rows as they arrive from the venue catalog and the booking store.
//!
//! Every external feed goes through exactly one `TryFrom` here; the engine only
//! ever sees the validated types from `models::venue` and `models::reservation`.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use validator::{Validate, ValidationError, ValidationErrors};

use super::reservation::{Block, Reservation, ReservationStatus};
use super::venue::{PricingUnit, Service, Venue};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("{entity} {id}: {source}")]
    Validation {
        entity: &'static str,
        id: i64,
        #[source]
        source: ValidationErrors,
    },
    #[error("{entity} {id}: {reason}")]
    Malformed {
        entity: &'static str,
        id: i64,
        reason: String,
    },
}

fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::new("negative_amount"));
    }
    Ok(())
}

fn fraction(value: &Decimal) -> Result<(), ValidationError> {
    non_negative(value)?;
    if *value >= Decimal::ONE {
        return Err(ValidationError::new("tax_rate_not_below_one"));
    }
    Ok(())
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, Validate)]
pub struct VenueRecord {
    pub id: i64,
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(range(min = 1))]
    pub capacity: i32,
    #[validate(custom(function = "non_negative"))]
    pub base_price_per_hour: Decimal,
    #[validate(range(min = 1))]
    pub minimum_hours: i32,
    #[validate(custom(function = "non_negative"))]
    pub cleaning_fee: Decimal,
    #[validate(custom(function = "non_negative"))]
    pub security_deposit: Decimal,
    #[validate(custom(function = "fraction"))]
    pub tax_rate: Decimal,
    pub opening_time: NaiveTime,
    pub closing_time: NaiveTime,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, Validate)]
pub struct ServiceRecord {
    pub id: i64,
    pub venue_id: i64,
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(custom(function = "non_negative"))]
    pub unit_price: Decimal,
    pub pricing_unit: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, Validate)]
pub struct ReservationRecord {
    pub id: i64,
    pub venue_id: i64,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: String,
    #[validate(range(min = 1))]
    pub guest_count: i32,
    pub service_ids: Vec<i64>,
    pub special_requests: Option<String>,
    #[validate(custom(function = "non_negative"))]
    pub total_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, Validate)]
pub struct BlockRecord {
    pub id: i64,
    pub venue_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
}

impl TryFrom<ServiceRecord> for Service {
    type Error = FeedError;

    fn try_from(record: ServiceRecord) -> Result<Self, Self::Error> {
        record.validate().map_err(|source| FeedError::Validation {
            entity: "service",
            id: record.id,
            source,
        })?;
        let pricing_unit =
            PricingUnit::parse(&record.pricing_unit).ok_or_else(|| FeedError::Malformed {
                entity: "service",
                id: record.id,
                reason: format!("unknown pricing unit {:?}", record.pricing_unit),
            })?;
        Ok(Service {
            id: record.id,
            name: record.name,
            unit_price: record.unit_price,
            pricing_unit,
        })
    }
}

impl VenueRecord {
    /// Assembles a venue and its service catalog, rejecting services that belong elsewhere.
    pub fn into_venue(self, services: Vec<ServiceRecord>) -> Result<Venue, FeedError> {
        self.validate().map_err(|source| FeedError::Validation {
            entity: "venue",
            id: self.id,
            source,
        })?;
        if self.opening_time >= self.closing_time {
            return Err(FeedError::Malformed {
                entity: "venue",
                id: self.id,
                reason: format!(
                    "opening time {} is not before closing time {}",
                    self.opening_time, self.closing_time
                ),
            });
        }

        let mut catalog = Vec::with_capacity(services.len());
        for record in services {
            if record.venue_id != self.id {
                return Err(FeedError::Malformed {
                    entity: "service",
                    id: record.id,
                    reason: format!("belongs to venue {}, not {}", record.venue_id, self.id),
                });
            }
            catalog.push(Service::try_from(record)?);
        }

        Ok(Venue {
            id: self.id,
            name: self.name,
            capacity: self.capacity as u32,
            base_price_per_hour: self.base_price_per_hour,
            minimum_hours: self.minimum_hours as u32,
            cleaning_fee: self.cleaning_fee,
            security_deposit: self.security_deposit,
            tax_rate: self.tax_rate,
            opening_time: self.opening_time,
            closing_time: self.closing_time,
            services: catalog,
        })
    }
}

impl TryFrom<ReservationRecord> for Reservation {
    type Error = FeedError;

    fn try_from(record: ReservationRecord) -> Result<Self, Self::Error> {
        record.validate().map_err(|source| FeedError::Validation {
            entity: "reservation",
            id: record.id,
            source,
        })?;
        let malformed = |reason: String| FeedError::Malformed {
            entity: "reservation",
            id: record.id,
            reason,
        };
        if record.start_time >= record.end_time {
            return Err(malformed(format!(
                "start {} is not before end {}",
                record.start_time, record.end_time
            )));
        }
        let status = ReservationStatus::parse(&record.status)
            .ok_or_else(|| malformed(format!("unknown status {:?}", record.status)))?;

        Ok(Reservation {
            id: record.id,
            venue_id: record.venue_id,
            date: record.date,
            start_time: record.start_time,
            end_time: record.end_time,
            status,
            guest_count: record.guest_count as u32,
            service_ids: record.service_ids,
            special_requests: record.special_requests,
            total_price: record.total_price,
            created_at: record.created_at,
            expires_at: record.expires_at,
        })
    }
}

impl TryFrom<BlockRecord> for Block {
    type Error = FeedError;

    fn try_from(record: BlockRecord) -> Result<Self, Self::Error> {
        if record.start_date > record.end_date {
            return Err(FeedError::Malformed {
                entity: "block",
                id: record.id,
                reason: format!("{} is after {}", record.start_date, record.end_date),
            });
        }
        Ok(Block {
            id: record.id,
            venue_id: record.venue_id,
            start_date: record.start_date,
            end_date: record.end_date,
            reason: record.reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn venue_record() -> VenueRecord {
        VenueRecord {
            id: 7,
            name: "Loft".to_string(),
            capacity: 80,
            base_price_per_hour: dec!(150),
            minimum_hours: 4,
            cleaning_fee: dec!(200),
            security_deposit: dec!(500),
            tax_rate: dec!(0.10),
            opening_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            closing_time: NaiveTime::from_hms_opt(23, 0, 0).unwrap(),
        }
    }

    fn catering(venue_id: i64) -> ServiceRecord {
        ServiceRecord {
            id: 1,
            venue_id,
            name: "Catering".to_string(),
            unit_price: dec!(25),
            pricing_unit: "per_person".to_string(),
        }
    }

    #[test]
    fn accepts_well_formed_venue() {
        let venue = venue_record().into_venue(vec![catering(7)]).unwrap();
        assert_eq!(venue.capacity, 80);
        assert_eq!(venue.services[0].pricing_unit, PricingUnit::PerPerson);
    }

    #[test]
    fn rejects_tax_rate_of_one() {
        let record = VenueRecord {
            tax_rate: dec!(1),
            ..venue_record()
        };
        assert!(matches!(
            record.into_venue(vec![]),
            Err(FeedError::Validation { entity: "venue", .. })
        ));
    }

    #[test]
    fn rejects_zero_capacity_and_negative_fees() {
        let record = VenueRecord {
            capacity: 0,
            ..venue_record()
        };
        assert!(record.into_venue(vec![]).is_err());

        let record = VenueRecord {
            cleaning_fee: dec!(-1),
            ..venue_record()
        };
        assert!(record.into_venue(vec![]).is_err());
    }

    #[test]
    fn rejects_foreign_service() {
        let err = venue_record().into_venue(vec![catering(8)]).unwrap_err();
        assert!(matches!(err, FeedError::Malformed { entity: "service", .. }));
    }

    #[test]
    fn rejects_unknown_pricing_unit() {
        let record = ServiceRecord {
            pricing_unit: "per_hour".to_string(),
            ..catering(7)
        };
        assert!(Service::try_from(record).is_err());
    }

    #[test]
    fn rejects_inverted_reservation() {
        let record = ReservationRecord {
            id: 3,
            venue_id: 7,
            date: NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
            start_time: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            status: "confirmed".to_string(),
            guest_count: 10,
            service_ids: vec![],
            special_requests: None,
            total_price: dec!(100),
            created_at: Utc::now(),
            expires_at: None,
        };
        assert!(Reservation::try_from(record).is_err());
    }
}
