use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{error, info, warn};

use super::{InsertOutcome, ReservationStore};
use crate::engine::availability::Occupancy;
use crate::error::StoreError;
use crate::models::{
    Block, BlockRecord, NewReservation, Reservation, ReservationId, ReservationRecord,
    ReservationStatus, ServiceRecord, Venue, VenueId, VenueRecord,
};

const RESERVATION_COLUMNS: &str = "id, venue_id, date, start_time, end_time, status, guest_count, \
     service_ids, special_requests, total_price, created_at, expires_at";

/// Postgres exclusion constraint violation; see `reservations_no_overlap`.
const EXCLUSION_VIOLATION: &str = "23P01";

#[derive(Clone)]
pub struct PgReservationStore {
    pool: PgPool,
}

impl PgReservationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn convert_reservations(
        records: Vec<ReservationRecord>,
    ) -> Result<Vec<Reservation>, StoreError> {
        records
            .into_iter()
            .map(|r| Reservation::try_from(r).map_err(StoreError::from))
            .collect()
    }

    fn convert_blocks(records: Vec<BlockRecord>) -> Result<Vec<Block>, StoreError> {
        records
            .into_iter()
            .map(|b| Block::try_from(b).map_err(StoreError::from))
            .collect()
    }

    async fn day_occupancy(
        tx: &mut Transaction<'_, Postgres>,
        venue_id: VenueId,
        date: NaiveDate,
    ) -> Result<Occupancy, StoreError> {
        let reservations = sqlx::query_as::<_, ReservationRecord>(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations
             WHERE venue_id = $1 AND date = $2 AND status IN ('pending', 'confirmed')"
        ))
        .bind(venue_id)
        .bind(date)
        .fetch_all(&mut **tx)
        .await?;

        let blocks = sqlx::query_as::<_, BlockRecord>(
            "SELECT id, venue_id, start_date, end_date, reason FROM venue_blocks
             WHERE venue_id = $1 AND start_date <= $2 AND end_date >= $2",
        )
        .bind(venue_id)
        .bind(date)
        .fetch_all(&mut **tx)
        .await?;

        Ok(Occupancy::new(
            Self::convert_reservations(reservations)?,
            Self::convert_blocks(blocks)?,
        ))
    }
}

fn is_exclusion_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some(EXCLUSION_VIOLATION),
        _ => false,
    }
}

#[async_trait]
impl ReservationStore for PgReservationStore {
    async fn venue(&self, venue_id: VenueId) -> Result<Venue, StoreError> {
        let record = sqlx::query_as::<_, VenueRecord>(
            "SELECT id, name, capacity, base_price_per_hour, minimum_hours, cleaning_fee,
                    security_deposit, tax_rate, opening_time, closing_time
             FROM venues WHERE id = $1",
        )
        .bind(venue_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound {
            entity: "venue",
            id: venue_id,
        })?;

        let services = sqlx::query_as::<_, ServiceRecord>(
            "SELECT id, venue_id, name, unit_price, pricing_unit
             FROM venue_services WHERE venue_id = $1 ORDER BY id",
        )
        .bind(venue_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(record.into_venue(services)?)
    }

    async fn occupancy(
        &self,
        venue_id: VenueId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Occupancy, StoreError> {
        let reservations = sqlx::query_as::<_, ReservationRecord>(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations
             WHERE venue_id = $1 AND date BETWEEN $2 AND $3 AND status IN ('pending', 'confirmed')
             ORDER BY date, start_time"
        ))
        .bind(venue_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        let blocks = sqlx::query_as::<_, BlockRecord>(
            "SELECT id, venue_id, start_date, end_date, reason FROM venue_blocks
             WHERE venue_id = $1 AND start_date <= $3 AND end_date >= $2",
        )
        .bind(venue_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(Occupancy::new(
            Self::convert_reservations(reservations)?,
            Self::convert_blocks(blocks)?,
        ))
    }

    async fn insert_if_free(
        &self,
        venue: &Venue,
        request: NewReservation,
        now: DateTime<Utc>,
    ) -> Result<InsertOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Serialises reservations per venue; other venues are untouched.
        let locked: Option<i64> =
            sqlx::query_scalar("SELECT id FROM venues WHERE id = $1 FOR UPDATE")
                .bind(venue.id)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Err(StoreError::NotFound {
                entity: "venue",
                id: venue.id,
            });
        }

        let released = sqlx::query(
            "UPDATE reservations SET status = 'cancelled', updated_at = NOW()
             WHERE venue_id = $1 AND date = $2 AND status = 'pending' AND expires_at <= $3",
        )
        .bind(venue.id)
        .bind(request.date)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if released > 0 {
            info!(
                "⏱ Released {} lapsed holds on {} for venue {}",
                released, request.date, venue.id
            );
        }

        let occupancy = Self::day_occupancy(&mut tx, venue.id, request.date)
            .await?
            .active_at(now);
        occupancy.audit().map_err(StoreError::Invariant)?;
        if let Err(day) = occupancy.admits(venue, request.date, &request.slot, now.date_naive()) {
            let _ = tx.rollback().await;
            return Ok(InsertOutcome::Conflict(day));
        }

        let inserted = sqlx::query_as::<_, ReservationRecord>(&format!(
            "INSERT INTO reservations
                (venue_id, date, start_time, end_time, status, guest_count, service_ids,
                 special_requests, total_price, created_at, expires_at)
             VALUES ($1, $2, $3, $4, 'pending', $5, $6, $7, $8, $9, $10)
             RETURNING {RESERVATION_COLUMNS}"
        ))
        .bind(request.venue_id)
        .bind(request.date)
        .bind(request.slot.start)
        .bind(request.slot.end)
        .bind(request.guest_count as i32)
        .bind(&request.service_ids)
        .bind(&request.special_requests)
        .bind(request.total_price)
        .bind(request.created_at)
        .bind(request.expires_at)
        .fetch_one(&mut *tx)
        .await;

        let record = match inserted {
            Ok(record) => record,
            Err(e) if is_exclusion_violation(&e) => {
                // Row lock should make this unreachable; the constraint is the last line.
                warn!("reservations_no_overlap rejected insert for venue {}: {:?}", venue.id, e);
                let _ = tx.rollback().await;
                let day = occupancy.day(venue, request.date, now.date_naive());
                return Ok(InsertOutcome::Conflict(day));
            }
            Err(e) => {
                error!("insert_if_free sql error: {:?}", e);
                let _ = tx.rollback().await;
                return Err(e.into());
            }
        };

        tx.commit().await?;
        let reservation = Reservation::try_from(record)?;
        info!(
            "🎫 Reservation {} held for venue {} on {} {}-{}",
            reservation.id, venue.id, reservation.date, reservation.start_time, reservation.end_time
        );
        Ok(InsertOutcome::Inserted(reservation))
    }

    async fn reservation(&self, id: ReservationId) -> Result<Reservation, StoreError> {
        let record = sqlx::query_as::<_, ReservationRecord>(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound {
            entity: "reservation",
            id,
        })?;
        Ok(Reservation::try_from(record)?)
    }

    async fn update_status(
        &self,
        id: ReservationId,
        expected: ReservationStatus,
        next: ReservationStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Reservation>, StoreError> {
        let record = sqlx::query_as::<_, ReservationRecord>(&format!(
            "UPDATE reservations
             SET status = $3,
                 expires_at = CASE WHEN $3 = 'pending' THEN expires_at ELSE NULL END,
                 updated_at = NOW()
             WHERE id = $1 AND status = $2
               AND NOT ($3 = 'confirmed' AND expires_at IS NOT NULL AND expires_at <= $4)
             RETURNING {RESERVATION_COLUMNS}"
        ))
        .bind(id)
        .bind(expected.as_str())
        .bind(next.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        match record {
            Some(record) => Ok(Some(Reservation::try_from(record)?)),
            None => {
                // distinguish "gone" from "status moved on"
                let exists: bool =
                    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM reservations WHERE id = $1)")
                        .bind(id)
                        .fetch_one(&self.pool)
                        .await?;
                if exists {
                    Ok(None)
                } else {
                    Err(StoreError::NotFound {
                        entity: "reservation",
                        id,
                    })
                }
            }
        }
    }

    async fn expire_pending(&self, now: DateTime<Utc>) -> Result<Vec<Reservation>, StoreError> {
        let records = sqlx::query_as::<_, ReservationRecord>(&format!(
            "UPDATE reservations SET status = 'cancelled', updated_at = NOW()
             WHERE status = 'pending' AND expires_at <= $1
             RETURNING {RESERVATION_COLUMNS}"
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Self::convert_reservations(records)
    }
}
