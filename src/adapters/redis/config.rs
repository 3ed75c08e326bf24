//! Redis lock tuning.

use std::time::Duration;

use serde::Deserialize;

/// Tuning for the Redis-backed named lock.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LockConfig {
    /// Lease put on the lock key, so a crashed holder cannot block the
    /// cluster forever.
    #[serde(default = "default_lease_ms")]
    pub lease_ms: u64,

    /// Bounded wait for acquisition before giving up.
    #[serde(default = "default_acquire_wait_ms")]
    pub acquire_wait_ms: u64,

    /// Delay between acquisition attempts while the lock is held elsewhere.
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
}

impl LockConfig {
    pub fn lease(&self) -> Duration {
        Duration::from_millis(self.lease_ms)
    }

    pub fn acquire_wait(&self) -> Duration {
        Duration::from_millis(self.acquire_wait_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            lease_ms: default_lease_ms(),
            acquire_wait_ms: default_acquire_wait_ms(),
            retry_interval_ms: default_retry_interval_ms(),
        }
    }
}

fn default_lease_ms() -> u64 {
    30_000
}

fn default_acquire_wait_ms() -> u64 {
    10_000
}

fn default_retry_interval_ms() -> u64 {
    100
}
