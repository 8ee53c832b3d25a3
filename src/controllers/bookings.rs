use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::BookingError;
use crate::models::{BookingDraft, ReservationId};
use crate::services::CommitOutcome;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", post(create_booking))
        .route("/bookings/{reservation_id}", get(get_booking))
        .route("/bookings/confirm", patch(confirm_booking))
        .route("/bookings/cancel", patch(cancel_booking))
}

// POST /api/bookings
async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<BookingDraft>,
) -> Result<impl IntoResponse, BookingError> {
    if draft.venue_id <= 0 {
        return Err(BookingError::NotFound {
            entity: "venue",
            id: draft.venue_id,
        });
    }

    let outcome = state.commit.reserve(&draft).await?;
    if matches!(outcome, CommitOutcome::Confirmed(_) | CommitOutcome::Conflict(_)) {
        // either way the cached calendar for this venue is now behind
        state.cache.invalidate_occupancy(draft.venue_id).await;
    }

    let reservation = outcome.into_result()?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

// GET /api/bookings/{reservation_id}
async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(reservation_id): Path<ReservationId>,
) -> Result<impl IntoResponse, BookingError> {
    let reservation = state.commit.reservation(reservation_id).await?;
    Ok((StatusCode::OK, Json(reservation)))
}

#[derive(Debug, Deserialize)]
struct ReservationRequest {
    reservation_id: ReservationId,
}

// PATCH /api/bookings/confirm
async fn confirm_booking(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReservationRequest>,
) -> Result<impl IntoResponse, BookingError> {
    let reservation = state.commit.confirm(req.reservation_id).await?;
    state.cache.invalidate_occupancy(reservation.venue_id).await;
    Ok((StatusCode::OK, Json(reservation)))
}

// PATCH /api/bookings/cancel
async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReservationRequest>,
) -> Result<impl IntoResponse, BookingError> {
    let reservation = state.commit.cancel(req.reservation_id).await?;
    state.cache.invalidate_occupancy(reservation.venue_id).await;
    Ok((StatusCode::OK, Json(reservation)))
}
