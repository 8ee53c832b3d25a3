use chrono::NaiveDate;
use tracing::{info, warn};

use crate::cache::CacheService;
use crate::engine::availability::Occupancy;
use crate::error::StoreError;
use crate::models::VenueId;

fn occupancy_key(venue_id: VenueId, from: NaiveDate, to: NaiveDate) -> String {
    format!("occupancy:{}:{}:{}", venue_id, from, to)
}

impl CacheService {
    /// Reservations and blocks for a calendar range, at most `occupancy_ttl_seconds` old.
    ///
    /// Lapsed pending holds are still in the cached copy; callers apply
    /// `Occupancy::active_at` with the current time after reading.
    pub async fn occupancy(
        &self,
        venue_id: VenueId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Occupancy, StoreError> {
        let key = occupancy_key(venue_id, from, to);

        match self.get_json::<Occupancy>(&key).await {
            Ok(Some(occupancy)) => return Ok(occupancy),
            Ok(None) => {}
            Err(e) => warn!("occupancy cache read failed for {}: {:?}", key, e),
        }

        let occupancy = self.store.occupancy(venue_id, from, to).await?;
        if let Err(e) = self.set_json(&key, &occupancy, self.occupancy_ttl_seconds).await {
            warn!("occupancy cache write failed for {}: {:?}", key, e);
        }
        Ok(occupancy)
    }

    /// Drops every cached range for the venue. Called after each write touching it.
    pub async fn invalidate_occupancy(&self, venue_id: VenueId) {
        match self.delete_matching(&format!("occupancy:{}:*", venue_id)).await {
            Ok(0) => {}
            Ok(n) => info!("Invalidated {} occupancy ranges for venue {}", n, venue_id),
            // entries still expire on their own within the TTL
            Err(e) => warn!("occupancy cache invalidation failed for venue {}: {:?}", venue_id, e),
        }
    }
}
