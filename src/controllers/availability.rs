use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{Duration, NaiveDate};
use serde::Deserialize;
use std::sync::Arc;

use crate::engine::availability::AvailabilityCalendar;
use crate::error::StoreError;
use crate::models::VenueId;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/venues/{venue_id}/availability", get(get_availability))
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub from: NaiveDate,
    /// Inclusive; defaults to 30 days after `from`.
    pub to: Option<NaiveDate>,
}

// GET /api/venues/{venue_id}/availability?from=YYYY-MM-DD&to=YYYY-MM-DD
async fn get_availability(
    State(state): State<Arc<AppState>>,
    Path(venue_id): Path<VenueId>,
    Query(params): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityCalendar>, (StatusCode, String)> {
    if venue_id <= 0 {
        return Err((StatusCode::BAD_REQUEST, "venue_id must be > 0".to_string()));
    }
    let from = params.from;
    let to = params.to.unwrap_or(from + Duration::days(30));
    if to < from {
        return Err((StatusCode::BAD_REQUEST, "to must not be before from".to_string()));
    }
    let max_days = state.config.booking.max_range_days;
    if (to - from).num_days() >= max_days {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("range must not exceed {} days", max_days),
        ));
    }

    let feed = match state.cache.venue(venue_id).await {
        Ok(venue) => state
            .cache
            .occupancy(venue_id, from, to)
            .await
            .map(|occupancy| (venue, occupancy)),
        Err(StoreError::NotFound { .. }) => {
            return Err((StatusCode::NOT_FOUND, format!("venue {} not found", venue_id)));
        }
        Err(e) => Err(e),
    };

    let now = state.commit.clock().now();
    Ok(Json(AvailabilityCalendar::resolve(venue_id, feed, from, to, now)))
}
