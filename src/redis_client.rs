use redis::{aio::MultiplexedConnection, Client};
use tracing::info;

use crate::config::RedisConfig;

/// Shared multiplexed connection backing the availability read cache.
#[derive(Clone)]
pub struct RedisClient {
    pub conn: MultiplexedConnection,
}

impl RedisClient {
    pub async fn connect(config: &RedisConfig) -> redis::RedisResult<Self> {
        let client = Client::open(config.url.as_str())?;
        let conn = client.get_multiplexed_tokio_connection().await?;
        info!("Availability cache connected");
        Ok(RedisClient { conn })
    }
}
