//! MessageStore port - durable outbox record persistence.
//!
//! The store is the single source of truth for delivery state. It must
//! offer a compare-and-swap conditional update as a first-class operation:
//! every cross-process coordination point (confirm callbacks, return
//! callbacks, retry passes, concurrent send failures) goes through
//! [`MessageStore::transition`] or [`MessageStore::start_retry`], which
//! apply only when the record still holds the expected state. That CAS is
//! what replaces in-process synchronization.

use async_trait::async_trait;

use crate::domain::{OutboxMessage, OutboxError, SendState, Timestamp};

/// Port for the durable outbox record store.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persists a freshly registered record.
    ///
    /// Fails with [`OutboxError::Store`] if the id already exists.
    async fn insert(&self, message: &OutboxMessage) -> Result<(), OutboxError>;

    /// Conditional state update: moves `id` from `expected` to `next`,
    /// recording `cause` when given. Returns `false` (without touching the
    /// record) when the current state no longer matches `expected`.
    async fn transition(
        &self,
        id: &str,
        expected: SendState,
        next: SendState,
        cause: Option<&str>,
    ) -> Result<bool, OutboxError>;

    /// Begins a retry attempt: one atomic conditional update moving `id`
    /// from `Fail` back to `Preparing` while persisting the incremented
    /// retry count and the widened retry window. Returns `false` when the
    /// record already left `Fail`.
    async fn start_retry(
        &self,
        id: &str,
        curr_retry_times: u32,
        next_retry_time: Timestamp,
    ) -> Result<bool, OutboxError>;

    /// Records in `Fail` whose retry budget remains and whose
    /// `next_retry_time` has been reached.
    async fn fail_due(&self, now: Timestamp) -> Result<Vec<OutboxMessage>, OutboxError>;

    /// Ids of `Over` records created at or before `cutoff`.
    async fn over_older_than(&self, cutoff: Timestamp) -> Result<Vec<String>, OutboxError>;

    /// Deletes the given records; returns how many went away.
    async fn delete_batch(&self, ids: &[String]) -> Result<u64, OutboxError>;
}
