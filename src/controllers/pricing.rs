use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

use crate::engine::pricing::{PricingBreakdown, PricingCalculator};
use crate::error::BookingError;
use crate::models::{BookingDraft, VenueId};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/venues/{venue_id}/quote", post(quote))
}

#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    pub venue_id: VenueId,
    pub pricing: PricingBreakdown,
}

// POST /api/venues/{venue_id}/quote
async fn quote(
    State(state): State<Arc<AppState>>,
    Path(venue_id): Path<VenueId>,
    Json(mut draft): Json<BookingDraft>,
) -> Result<Json<QuoteResponse>, BookingError> {
    draft.venue_id = venue_id;
    let venue = state.cache.venue(venue_id).await?;
    let pricing = PricingCalculator::compute(&draft, &venue);
    Ok(Json(QuoteResponse { venue_id, pricing }))
}
