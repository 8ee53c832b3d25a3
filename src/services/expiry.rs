use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{error, info};

use crate::AppState;

/// Periodic sweep that frees pending holds nobody confirmed in time.
pub struct ExpiryService {
    state: Arc<AppState>,
}

impl ExpiryService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Запускает одну итерацию: отменяет истёкшие брони и сбрасывает кеш затронутых площадок
    pub async fn run_expiry(&self) -> usize {
        let expired = match self.state.commit.expire_pending().await {
            Ok(expired) => expired,
            Err(e) => {
                error!("⏱ Expiry sweep failed: {}", e);
                return 0;
            }
        };

        if expired.is_empty() {
            info!("⏱ No lapsed pending reservations");
            return 0;
        }

        let venues: BTreeSet<i64> = expired.iter().map(|r| r.venue_id).collect();
        for venue_id in &venues {
            self.state.cache.invalidate_occupancy(*venue_id).await;
        }

        for reservation in &expired {
            info!(
                "⏱ Reservation {} for venue {} on {} {}-{} expired",
                reservation.id,
                reservation.venue_id,
                reservation.date,
                reservation.start_time,
                reservation.end_time
            );
        }
        info!("⏱ Released {} holds across {} venues", expired.len(), venues.len());
        expired.len()
    }
}
