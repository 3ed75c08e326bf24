//! RetryScheduler - periodic job that re-sends failed records whose
//! backoff window has elapsed and whose retry budget remains.
//!
//! A pass runs under the cluster-wide `txMsg:doRetry` lock so at most one
//! worker executes it at a time; the lock is released on every exit path.
//! Per record, the bookkeeping (incremented retry count, widened retry
//! window) is persisted together with the `Fail -> Preparing` move *before*
//! the resend, so the backoff window always grows even when the resend
//! itself fails, and the scheduler cannot spin on an immediately-retriable
//! record. One record's resend failure does not abort the rest of the
//! batch; only store or lock breakage is fatal to a pass.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;

use crate::application::SendCoordinator;
use crate::domain::{OutboxError, SendState, Timestamp};
use crate::ports::{LockProvider, MessageStore};

/// Cluster lock name guarding retry passes.
pub const RETRY_LOCK_NAME: &str = "txMsg:doRetry";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Summary of one retry pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryOutcome {
    /// Records the eligibility query returned.
    pub queried: usize,
    /// Records successfully handed to the broker again.
    pub resent: usize,
}

/// Periodic retry job over the outbox store.
pub struct RetryScheduler {
    store: Arc<dyn MessageStore>,
    sender: Arc<SendCoordinator>,
    lock: Arc<dyn LockProvider>,
    poll_interval: Duration,
}

impl RetryScheduler {
    pub fn new(
        store: Arc<dyn MessageStore>,
        sender: Arc<SendCoordinator>,
        lock: Arc<dyn LockProvider>,
    ) -> Self {
        Self {
            store,
            sender,
            lock,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Sets how often the periodic loop runs a pass.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Runs retry passes until the shutdown signal flips.
    ///
    /// Pass failures are logged and the loop keeps going; the operator
    /// sees them through tracing.
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
                        tracing::error!("Outbox retry pass failed: {}", e);
                    }
                }
            }
        }
    }

    /// Runs a single lock-guarded retry pass.
    pub async fn run_once(&self) -> Result<RetryOutcome, OutboxError> {
        self.lock.lock(RETRY_LOCK_NAME).await?;
        let outcome = self.retry_due().await;
        if let Err(e) = self.lock.unlock(RETRY_LOCK_NAME).await {
            tracing::warn!("Failed to release lock '{}': {}", RETRY_LOCK_NAME, e);
        }
        outcome
    }

    async fn retry_due(&self) -> Result<RetryOutcome, OutboxError> {
        let now = Timestamp::now();
        let candidates = self.store.fail_due(now).await?;
        let queried = candidates.len();
        let mut resent = 0;

        for mut message in candidates {
            let new_retry_times = message.curr_retry_times + 1;
            let next_retry_time = message.backoff.next_retry_time(now, new_retry_times);

            // Bookkeeping first: the window advances no matter how the
            // resend goes. The CAS skips records a concurrent callback
            // already moved on.
            let started = self
                .store
                .start_retry(&message.id, new_retry_times, next_retry_time)
                .await?;
            if !started {
                tracing::debug!(
                    "Outbox message {} left fail before retry, skipping",
                    message.id
                );
                continue;
            }

            message.send_state = SendState::Preparing;
            message.curr_retry_times = new_retry_times;
            message.next_retry_time = next_retry_time;

            if self.sender.send(&message).await? {
                resent += 1;
            }
        }

        tracing::debug!(
            "Outbox retry pass complete, resent {}/{} due messages",
            resent,
            queried
        );
        Ok(RetryOutcome { queried, resent })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryLockProvider, InMemoryMessageStore, InMemoryPublisher};
    use crate::domain::{BackoffSchedule, MessageDraft, OutboxMessage, RetryPolicy};

    struct Fixture {
        store: Arc<InMemoryMessageStore>,
        publisher: Arc<InMemoryPublisher>,
        lock: Arc<InMemoryLockProvider>,
        scheduler: RetryScheduler,
    }

    fn fixture() -> Fixture {
        fixture_with_lock(Arc::new(InMemoryLockProvider::new()))
    }

    fn fixture_with_lock(lock: Arc<InMemoryLockProvider>) -> Fixture {
        let store = Arc::new(InMemoryMessageStore::new());
        let publisher = Arc::new(InMemoryPublisher::new());
        let sender = Arc::new(SendCoordinator::new(store.clone(), publisher.clone()));
        let scheduler = RetryScheduler::new(store.clone(), sender, lock.clone());
        Fixture {
            store,
            publisher,
            lock,
            scheduler,
        }
    }

    fn failed_message(id: &str, retries_so_far: u32, due: bool) -> OutboxMessage {
        let now = Timestamp::now();
        let mut msg = OutboxMessage::register(
            MessageDraft::new("orders.exchange", "orders.created", b"p".to_vec())
                .with_id(id)
                .with_retry(RetryPolicy {
                    max_retry_times: 3,
                    backoff: BackoffSchedule::new(1_000, 2.0, 5_000),
                }),
            RetryPolicy::default(),
            now.minus_millis(60_000),
        );
        msg.send_state = SendState::Fail;
        msg.curr_retry_times = retries_so_far;
        msg.cause = Some("earlier failure".to_string());
        msg.next_retry_time = if due {
            now.minus_millis(10)
        } else {
            now.plus_millis(60_000)
        };
        msg
    }

    #[tokio::test]
    async fn due_records_are_resent_with_advanced_bookkeeping() {
        let f = fixture();
        f.store.seed(failed_message("m1", 0, true));

        let outcome = f.scheduler.run_once().await.unwrap();

        assert_eq!(outcome, RetryOutcome { queried: 1, resent: 1 });
        assert_eq!(f.publisher.published_for("m1").len(), 1);

        let record = f.store.message("m1").unwrap();
        assert_eq!(record.send_state, SendState::Preparing);
        assert_eq!(record.curr_retry_times, 1);
        assert!(record.next_retry_time.is_after(&Timestamp::now()));
    }

    #[tokio::test]
    async fn records_not_yet_due_are_left_alone() {
        let f = fixture();
        f.store.seed(failed_message("m1", 0, false));

        let outcome = f.scheduler.run_once().await.unwrap();

        assert_eq!(outcome, RetryOutcome { queried: 0, resent: 0 });
        assert_eq!(f.publisher.publish_count(), 0);
        assert_eq!(f.store.message("m1").unwrap().curr_retry_times, 0);
    }

    #[tokio::test]
    async fn exhausted_records_are_excluded_even_when_due() {
        let f = fixture();
        f.store.seed(failed_message("m1", 3, true));

        let outcome = f.scheduler.run_once().await.unwrap();

        assert_eq!(outcome, RetryOutcome { queried: 0, resent: 0 });
        assert_eq!(f.publisher.publish_count(), 0);
    }

    #[tokio::test]
    async fn bookkeeping_advances_even_when_the_resend_fails() {
        let f = fixture();
        f.store.seed(failed_message("m1", 0, true));
        f.publisher.fail_with("still down");

        let outcome = f.scheduler.run_once().await.unwrap();

        assert_eq!(outcome, RetryOutcome { queried: 1, resent: 0 });
        let record = f.store.message("m1").unwrap();
        // Back at Fail through the coordinator's guarded update, with the
        // widened window and the new cause intact.
        assert_eq!(record.send_state, SendState::Fail);
        assert_eq!(record.curr_retry_times, 1);
        assert!(record.next_retry_time.is_after(&Timestamp::now()));
        assert!(record.cause.as_deref().unwrap().contains("still down"));
    }

    #[tokio::test]
    async fn one_failing_record_does_not_abort_the_batch() {
        let f = fixture();
        f.store.seed(failed_message("m1", 0, true));
        f.store.seed(failed_message("m2", 0, true));
        f.publisher.fail_with("still down");

        let outcome = f.scheduler.run_once().await.unwrap();

        // Both candidates were attempted; both advanced their bookkeeping.
        assert_eq!(outcome, RetryOutcome { queried: 2, resent: 0 });
        assert_eq!(f.store.message("m1").unwrap().curr_retry_times, 1);
        assert_eq!(f.store.message("m2").unwrap().curr_retry_times, 1);
    }

    #[tokio::test]
    async fn pass_fails_fast_when_the_lock_is_held() {
        let lock = Arc::new(InMemoryLockProvider::with_acquire_wait(
            Duration::from_millis(20),
        ));
        let f = fixture_with_lock(lock.clone());
        f.store.seed(failed_message("m1", 0, true));

        lock.lock(RETRY_LOCK_NAME).await.unwrap();
        let err = f.scheduler.run_once().await.unwrap_err();

        assert!(matches!(err, OutboxError::Lock(_)));
        // The guarded pass never touched the store.
        assert_eq!(f.store.message("m1").unwrap().curr_retry_times, 0);
        assert_eq!(f.publisher.publish_count(), 0);
    }

    #[tokio::test]
    async fn lock_is_released_after_a_pass() {
        let f = fixture();
        f.store.seed(failed_message("m1", 0, true));

        f.scheduler.run_once().await.unwrap();

        assert!(!f.lock.is_held(RETRY_LOCK_NAME));
    }

    #[tokio::test]
    async fn run_stops_on_shutdown_signal() {
        let f = fixture();
        f.store.seed(failed_message("m1", 0, true));
        let scheduler = f
            .scheduler
            .with_poll_interval(Duration::from_millis(10));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move { scheduler.run(shutdown_rx).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(f.publisher.published_for("m1").len(), 1);
    }
}
