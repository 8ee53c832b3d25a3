pub mod cache;
pub mod clock;
pub mod config;
pub mod controllers;
pub mod database;
pub mod engine;
pub mod error;
pub mod models;
pub mod redis_client;
pub mod services;
pub mod store;

use chrono::Duration;
use std::sync::Arc;
use tracing::info;

use clock::{Clock, SystemClock};
use store::ReservationStore;

// Shared state for every request handler and background task
#[derive(Clone)]
pub struct AppState {
    pub config: config::Config,
    pub cache: cache::CacheService,
    pub commit: services::BookingCommitService,
}

impl AppState {
    /// Connects Postgres and Redis, applies migrations and wires the engine services.
    pub async fn new(config: config::Config) -> anyhow::Result<Arc<Self>> {
        let db = database::Database::connect(&config.database).await?;
        db.run_migrations().await?;

        let redis = redis_client::RedisClient::connect(&config.redis).await?;

        let store: Arc<dyn ReservationStore> = Arc::new(db.reservation_store());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Ok(Arc::new(Self::assemble(config, redis, store, clock)))
    }

    pub fn assemble(
        config: config::Config,
        redis: redis_client::RedisClient,
        store: Arc<dyn ReservationStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache = cache::CacheService::new(
            redis,
            store.clone(),
            config.booking.availability_cache_ttl_seconds,
            config.booking.venue_cache_ttl_seconds,
        );
        let commit = services::BookingCommitService::new(
            store,
            clock,
            Duration::minutes(config.booking.pending_ttl_minutes),
        );
        info!(
            "Booking engine ready: pending holds last {} min, calendar staleness <= {}s",
            config.booking.pending_ttl_minutes, config.booking.availability_cache_ttl_seconds
        );
        Self {
            config,
            cache,
            commit,
        }
    }
}
