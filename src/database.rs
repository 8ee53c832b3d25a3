use sqlx::{postgres::PgPoolOptions, Pool, Postgres};
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::store::PgReservationStore;

/// Connection pool for the booking store.
#[derive(Clone)]
pub struct Database {
    pub pool: Pool<Postgres>,
}

impl Database {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(Duration::from_secs(5))
            .connect(&config.url)
            .await?;
        info!("Booking store pool ready ({} connections max)", config.pool_size);
        Ok(Database { pool })
    }

    /// Applies `src/migrations`, including the reservation overlap constraint.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/migrations").run(&self.pool).await?;
        info!("Booking store migrations applied");
        Ok(())
    }

    pub fn reservation_store(&self) -> PgReservationStore {
        PgReservationStore::new(self.pool.clone())
    }
}
