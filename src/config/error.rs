//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Invalid Redis URL format")]
    InvalidRedisUrl,

    #[error("Database pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Backoff multiplier must not be negative")]
    NegativeBackoffMultiplier,

    #[error("Backoff initial interval exceeds the maximum interval")]
    BackoffInitAboveMax,

    #[error("Retention window must be positive")]
    EmptyRetentionWindow,
}
