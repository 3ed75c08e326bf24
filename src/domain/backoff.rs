//! Retry backoff schedule.

use serde::{Deserialize, Serialize};

use super::Timestamp;

/// Linear-growth backoff schedule with a hard cap.
///
/// The interval at retry count `r` is `init + round(r * multiplier)`
/// milliseconds, capped at `max_interval_ms`. The count used is always the
/// count *after* the attempt being scheduled, so registration (count 0)
/// yields the initial interval and each subsequent failure widens the
/// window until the cap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackoffSchedule {
    pub init_interval_ms: u64,
    pub multiplier: f64,
    pub max_interval_ms: u64,
}

impl BackoffSchedule {
    pub fn new(init_interval_ms: u64, multiplier: f64, max_interval_ms: u64) -> Self {
        Self {
            init_interval_ms,
            multiplier,
            max_interval_ms,
        }
    }

    /// Interval in milliseconds for the given retry count.
    pub fn interval_ms(&self, retry_times: u32) -> u64 {
        let growth = (retry_times as f64 * self.multiplier).round() as u64;
        self.init_interval_ms
            .saturating_add(growth)
            .min(self.max_interval_ms)
    }

    /// Earliest moment the next attempt becomes eligible, measured from
    /// `reference` with the post-increment retry count.
    pub fn next_retry_time(&self, reference: Timestamp, retry_times: u32) -> Timestamp {
        reference.plus_millis(self.interval_ms(retry_times))
    }
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self {
            init_interval_ms: 1_000,
            multiplier: 2.0,
            max_interval_ms: 5_000,
        }
    }
}
