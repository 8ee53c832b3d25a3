pub mod availability;
pub mod bookings;
pub mod pricing;

use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(availability::routes())
        .merge(pricing::routes())
        .merge(bookings::routes())
}
