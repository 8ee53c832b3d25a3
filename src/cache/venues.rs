use tracing::warn;

use crate::cache::CacheService;
use crate::error::StoreError;
use crate::models::{Venue, VenueId};

impl CacheService {
    /// Venue and rate card; the catalog changes rarely, so this is cached for longer.
    pub async fn venue(&self, venue_id: VenueId) -> Result<Venue, StoreError> {
        let key = format!("venue:{}", venue_id);

        // Сначала пробуем кеш
        match self.get_json::<Venue>(&key).await {
            Ok(Some(venue)) => return Ok(venue),
            Ok(None) => {}
            Err(e) => warn!("venue cache read failed for {}: {:?}", venue_id, e),
        }

        // Промах или Redis недоступен - идем в БД
        let venue = self.store.venue(venue_id).await?;
        if let Err(e) = self.set_json(&key, &venue, self.venue_ttl_seconds).await {
            warn!("venue cache write failed for {}: {:?}", venue_id, e);
        }
        Ok(venue)
    }
}
