//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment
//! variables using the `config` and `dotenvy` crates. Configuration is
//! loaded with the `OUTBOX_` prefix and nested values use double
//! underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use outbox_relay::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! let retry_policy = config.outbox.retry_policy();
//! ```

mod database;
mod error;
mod outbox;
mod redis;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use outbox::OutboxConfig;
pub use redis::RedisConfig;

use serde::Deserialize;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration (PostgreSQL record store)
    pub database: DatabaseConfig,

    /// Redis configuration (cluster lock)
    pub redis: RedisConfig,

    /// Outbox behavior (retry policy defaults, retention, cadence)
    #[serde(default)]
    pub outbox: OutboxConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with the `OUTBOX` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `OUTBOX__DATABASE__URL=...` -> `database.url = ...`
    /// - `OUTBOX__OUTBOX__MAX_RETRY_TIMES=3` -> `outbox.max_retry_times = 3`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required environment variables are missing
    /// or values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("OUTBOX")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.database.validate()?;
        self.redis.validate()?;
        self.outbox.validate()?;
        Ok(())
    }
}
