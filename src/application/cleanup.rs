//! CleanupScheduler - periodic job that purges delivered records older
//! than the retention window.
//!
//! A pass runs under the cluster-wide `txMsg:doClear` lock, released on
//! every exit path. Deletion failure is not retried within the pass: it is
//! logged and the next cycle re-selects the same ids. The eligibility
//! query failing is fatal to the pass.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;

use crate::domain::{OutboxError, Timestamp};
use crate::ports::{LockProvider, MessageStore};

/// Cluster lock name guarding cleanup passes.
pub const CLEAR_LOCK_NAME: &str = "txMsg:doClear";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3_600);

/// Summary of one cleanup pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupOutcome {
    /// Delivered records past retention the query found.
    pub queried: usize,
    /// Records actually deleted.
    pub deleted: u64,
}

/// Periodic retention purge over the outbox store.
pub struct CleanupScheduler {
    store: Arc<dyn MessageStore>,
    lock: Arc<dyn LockProvider>,
    retention: Duration,
    poll_interval: Duration,
}

impl CleanupScheduler {
    /// Creates a scheduler deleting `Over` records once their age exceeds
    /// `retention`.
    pub fn new(
        store: Arc<dyn MessageStore>,
        lock: Arc<dyn LockProvider>,
        retention: Duration,
    ) -> Self {
        Self {
            store,
            lock,
            retention,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Sets how often the periodic loop runs a pass.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Runs cleanup passes until the shutdown signal flips.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.poll_interval);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }

                _ = interval.tick() => {
                    if let Err(e) = self.run_once().await {
                        tracing::error!("Outbox cleanup pass failed: {}", e);
                    }
                }
            }
        }
    }

    /// Runs a single lock-guarded cleanup pass.
    pub async fn run_once(&self) -> Result<CleanupOutcome, OutboxError> {
        self.lock.lock(CLEAR_LOCK_NAME).await?;
        let outcome = self.clear_expired().await;
        if let Err(e) = self.lock.unlock(CLEAR_LOCK_NAME).await {
            tracing::warn!("Failed to release lock '{}': {}", CLEAR_LOCK_NAME, e);
        }
        outcome
    }

    async fn clear_expired(&self) -> Result<CleanupOutcome, OutboxError> {
        let now = Timestamp::now();
        let cutoff = now.minus_millis(self.retention.as_millis() as u64);
        let ids = self.store.over_older_than(cutoff).await?;
        let queried = ids.len();

        if ids.is_empty() {
            return Ok(CleanupOutcome { queried, deleted: 0 });
        }

        let deleted = match self.store.delete_batch(&ids).await {
            Ok(deleted) => deleted,
            Err(e) => {
                tracing::warn!(
                    "Outbox cleanup failed to delete {} records, next cycle retries: {}",
                    queried,
                    e
                );
                0
            }
        };

        tracing::debug!(
            "Outbox cleanup pass complete, deleted {}/{} expired messages",
            deleted,
            queried
        );
        Ok(CleanupOutcome { queried, deleted })
    }
}
