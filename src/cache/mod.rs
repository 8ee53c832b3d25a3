use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

use crate::{redis_client::RedisClient, store::ReservationStore};

pub mod occupancy;
pub mod venues;

/// Read-through cache in front of the booking store.
///
/// Only the calendar and quote paths read through here. Commits always go to the
/// store, so a stale entry can at worst show a day as free that the commit then rejects.
#[derive(Clone)]
pub struct CacheService {
    redis: RedisClient,
    store: Arc<dyn ReservationStore>,
    occupancy_ttl_seconds: u64,
    venue_ttl_seconds: u64,
}

impl CacheService {
    pub fn new(
        redis: RedisClient,
        store: Arc<dyn ReservationStore>,
        occupancy_ttl_seconds: u64,
        venue_ttl_seconds: u64,
    ) -> Self {
        Self {
            redis,
            store,
            occupancy_ttl_seconds,
            venue_ttl_seconds,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        let data: Option<String> = conn.get(key).await?;
        match data {
            Some(data) => serde_json::from_str(&data).map(Some).map_err(|_| {
                redis::RedisError::from((redis::ErrorKind::TypeError, "Parse error"))
            }),
            None => Ok(None),
        }
    }

    async fn set_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: u64,
    ) -> Result<(), redis::RedisError> {
        let data = serde_json::to_string(value).map_err(|_| {
            redis::RedisError::from((redis::ErrorKind::TypeError, "Serialize error"))
        })?;
        let mut conn = self.redis.conn.clone();
        conn.set_ex(key, data, ttl_seconds).await
    }

    async fn delete_matching(&self, pattern: &str) -> Result<usize, redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        let keys: Vec<String> = redis::cmd("KEYS").arg(pattern).query_async(&mut conn).await?;
        if keys.is_empty() {
            return Ok(0);
        }
        let _: () = conn.del(&keys).await?;
        Ok(keys.len())
    }
}
