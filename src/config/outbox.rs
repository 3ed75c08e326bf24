//! Outbox behavior configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::domain::{BackoffSchedule, RetryPolicy};

/// Outbox configuration: default retry policy, retention, and scheduler
/// cadence. The retry values act as per-message defaults; a draft can
/// override them at registration.
#[derive(Debug, Clone, Deserialize)]
pub struct OutboxConfig {
    /// First retry interval in milliseconds
    #[serde(default = "default_backoff_init_interval_ms")]
    pub backoff_init_interval_ms: u64,

    /// Per-retry interval growth factor
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Retry interval ceiling in milliseconds
    #[serde(default = "default_backoff_max_interval_ms")]
    pub backoff_max_interval_ms: u64,

    /// Retry budget per message
    #[serde(default = "default_max_retry_times")]
    pub max_retry_times: u32,

    /// How long delivered records are kept before cleanup, in milliseconds
    #[serde(default = "default_auto_clear_interval_ms")]
    pub auto_clear_interval_ms: u64,

    /// Retry scheduler cadence in seconds
    #[serde(default = "default_retry_poll_interval_secs")]
    pub retry_poll_interval_secs: u64,

    /// Cleanup scheduler cadence in seconds
    #[serde(default = "default_clear_poll_interval_secs")]
    pub clear_poll_interval_secs: u64,
}

impl OutboxConfig {
    /// Default retry policy applied to messages registered without one.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retry_times: self.max_retry_times,
            backoff: BackoffSchedule::new(
                self.backoff_init_interval_ms,
                self.backoff_multiplier,
                self.backoff_max_interval_ms,
            ),
        }
    }

    /// Retention window for delivered records.
    pub fn retention(&self) -> Duration {
        Duration::from_millis(self.auto_clear_interval_ms)
    }

    /// Retry scheduler cadence.
    pub fn retry_poll_interval(&self) -> Duration {
        Duration::from_secs(self.retry_poll_interval_secs)
    }

    /// Cleanup scheduler cadence.
    pub fn clear_poll_interval(&self) -> Duration {
        Duration::from_secs(self.clear_poll_interval_secs)
    }

    /// Validate outbox configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.backoff_multiplier < 0.0 {
            return Err(ValidationError::NegativeBackoffMultiplier);
        }
        if self.backoff_init_interval_ms > self.backoff_max_interval_ms {
            return Err(ValidationError::BackoffInitAboveMax);
        }
        if self.auto_clear_interval_ms == 0 {
            return Err(ValidationError::EmptyRetentionWindow);
        }
        Ok(())
    }
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            backoff_init_interval_ms: default_backoff_init_interval_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            backoff_max_interval_ms: default_backoff_max_interval_ms(),
            max_retry_times: default_max_retry_times(),
            auto_clear_interval_ms: default_auto_clear_interval_ms(),
            retry_poll_interval_secs: default_retry_poll_interval_secs(),
            clear_poll_interval_secs: default_clear_poll_interval_secs(),
        }
    }
}

fn default_backoff_init_interval_ms() -> u64 {
    1_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_backoff_max_interval_ms() -> u64 {
    5_000
}

fn default_max_retry_times() -> u32 {
    5
}

fn default_auto_clear_interval_ms() -> u64 {
    // One week
    7 * 24 * 60 * 60 * 1_000
}

fn default_retry_poll_interval_secs() -> u64 {
    30
}

fn default_clear_poll_interval_secs() -> u64 {
    3_600
}
