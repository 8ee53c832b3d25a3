use serde::Deserialize;
use std::env;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
}

// Top-level configuration, one section per concern
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub booking: BookingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

// Booking engine knobs
#[derive(Debug, Clone, Deserialize)]
pub struct BookingConfig {
    /// How long a pending reservation holds its slot before the sweeper frees it.
    pub pending_ttl_minutes: i64,
    pub expiry_sweep_seconds: u64,
    /// Upper bound on how stale a cached calendar may be.
    pub availability_cache_ttl_seconds: u64,
    pub venue_cache_ttl_seconds: u64,
    pub max_range_days: i64,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            pending_ttl_minutes: 15,
            expiry_sweep_seconds: 60,
            availability_cache_ttl_seconds: 30,
            venue_cache_ttl_seconds: 3600,
            max_range_days: 93,
        }
    }
}

/// Longest pending hold; anything above this is a misconfiguration.
pub const MAX_PENDING_TTL_MINUTES: i64 = 24 * 60;
pub const MAX_RANGE_DAYS: i64 = 366;

impl BookingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_PENDING_TTL_MINUTES).contains(&self.pending_ttl_minutes) {
            return Err(ConfigError::Invalid {
                key: "PENDING_TTL_MINUTES",
                value: self.pending_ttl_minutes.to_string(),
            });
        }
        // zero would turn the sweep loop into a busy spin
        if self.expiry_sweep_seconds == 0 {
            return Err(ConfigError::Invalid {
                key: "EXPIRY_SWEEP_SECONDS",
                value: self.expiry_sweep_seconds.to_string(),
            });
        }
        if !(1..=MAX_RANGE_DAYS).contains(&self.max_range_days) {
            return Err(ConfigError::Invalid {
                key: "BOOKING_MAX_RANGE_DAYS",
                value: self.max_range_days.to_string(),
            });
        }
        Ok(())
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key))
}

fn or_default<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value.parse().map_err(|_| ConfigError::Invalid { key, value }),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = BookingConfig::default();
        let config = Config {
            app: AppConfig {
                host: or_default("HOST", "0.0.0.0".to_string())?,
                port: or_default("PORT", 8000)?,
                environment: or_default("ENVIRONMENT", "development".to_string())?,
                rust_log: or_default(
                    "RUST_LOG",
                    "venue_booking=debug,tower_http=debug".to_string(),
                )?,
            },
            database: DatabaseConfig {
                url: required("DATABASE_URL")?,
                pool_size: or_default("DB_POOL_SIZE", 20)?,
            },
            redis: RedisConfig {
                url: required("REDIS_URL")?,
            },
            booking: BookingConfig {
                pending_ttl_minutes: or_default(
                    "PENDING_TTL_MINUTES",
                    defaults.pending_ttl_minutes,
                )?,
                expiry_sweep_seconds: or_default(
                    "EXPIRY_SWEEP_SECONDS",
                    defaults.expiry_sweep_seconds,
                )?,
                availability_cache_ttl_seconds: or_default(
                    "AVAILABILITY_CACHE_TTL_SECONDS",
                    defaults.availability_cache_ttl_seconds,
                )?,
                venue_cache_ttl_seconds: or_default(
                    "VENUE_CACHE_TTL_SECONDS",
                    defaults.venue_cache_ttl_seconds,
                )?,
                max_range_days: or_default("BOOKING_MAX_RANGE_DAYS", defaults.max_range_days)?,
            },
        };

        config.booking.validate()?;
        Ok(config)
    }
}
