//! In-memory message store for testing.
//!
//! # Security Note
//!
//! This adapter is for **testing only** and should not be used in
//! production. It uses `.expect()` on lock operations which will panic if
//! locks are poisoned. Production code should use the Postgres store
//! adapter.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::{OutboxMessage, OutboxError, SendState, Timestamp};
use crate::ports::MessageStore;

/// In-memory implementation of [`MessageStore`].
///
/// Conditional updates are evaluated under a single process-wide lock,
/// which gives the same atomicity the SQL adapter gets from a conditional
/// `UPDATE`.
pub struct InMemoryMessageStore {
    records: RwLock<HashMap<String, OutboxMessage>>,
}

impl InMemoryMessageStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    // === Test Helpers ===

    /// Returns a snapshot of the record with the given id.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn message(&self, id: &str) -> Option<OutboxMessage> {
        self.records
            .read()
            .expect("InMemoryMessageStore: records lock poisoned")
            .get(id)
            .cloned()
    }

    /// Returns the number of stored records.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn len(&self) -> usize {
        self.records
            .read()
            .expect("InMemoryMessageStore: records lock poisoned")
            .len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inserts a record directly, bypassing registration (for seeding
    /// specific states in tests).
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn seed(&self, message: OutboxMessage) {
        self.records
            .write()
            .expect("InMemoryMessageStore: records write lock poisoned")
            .insert(message.id.clone(), message);
    }
}

impl Default for InMemoryMessageStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn insert(&self, message: &OutboxMessage) -> Result<(), OutboxError> {
        let mut records = self
            .records
            .write()
            .expect("InMemoryMessageStore: records write lock poisoned");
        if records.contains_key(&message.id) {
            return Err(OutboxError::store(format!(
                "duplicate outbox message id '{}'",
                message.id
            )));
        }
        records.insert(message.id.clone(), message.clone());
        Ok(())
    }

    async fn transition(
        &self,
        id: &str,
        expected: SendState,
        next: SendState,
        cause: Option<&str>,
    ) -> Result<bool, OutboxError> {
        let mut records = self
            .records
            .write()
            .expect("InMemoryMessageStore: records write lock poisoned");
        match records.get_mut(id) {
            Some(record) if record.send_state == expected => {
                record.send_state = next;
                if let Some(cause) = cause {
                    record.cause = Some(cause.to_string());
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn start_retry(
        &self,
        id: &str,
        curr_retry_times: u32,
        next_retry_time: Timestamp,
    ) -> Result<bool, OutboxError> {
        let mut records = self
            .records
            .write()
            .expect("InMemoryMessageStore: records write lock poisoned");
        match records.get_mut(id) {
            Some(record) if record.send_state == SendState::Fail => {
                record.send_state = SendState::Preparing;
                record.curr_retry_times = curr_retry_times;
                record.next_retry_time = next_retry_time;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn fail_due(&self, now: Timestamp) -> Result<Vec<OutboxMessage>, OutboxError> {
        let records = self
            .records
            .read()
            .expect("InMemoryMessageStore: records lock poisoned");
        let mut due: Vec<_> = records
            .values()
            .filter(|r| {
                r.send_state == SendState::Fail
                    && !r.retries_exhausted()
                    && r.next_retry_time <= now
            })
            .cloned()
            .collect();
        due.sort_by_key(|r| r.next_retry_time);
        Ok(due)
    }

    async fn over_older_than(&self, cutoff: Timestamp) -> Result<Vec<String>, OutboxError> {
        let records = self
            .records
            .read()
            .expect("InMemoryMessageStore: records lock poisoned");
        Ok(records
            .values()
            .filter(|r| r.send_state == SendState::Over && r.create_time <= cutoff)
            .map(|r| r.id.clone())
            .collect())
    }

    async fn delete_batch(&self, ids: &[String]) -> Result<u64, OutboxError> {
        let mut records = self
            .records
            .write()
            .expect("InMemoryMessageStore: records write lock poisoned");
        let mut deleted = 0;
        for id in ids {
            if records.remove(id).is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MessageDraft, RetryPolicy};

    fn preparing(id: &str, now: Timestamp) -> OutboxMessage {
        OutboxMessage::register(
            MessageDraft::new("ex", "rk", b"p".to_vec()).with_id(id),
            RetryPolicy::default(),
            now,
        )
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_ids() {
        let store = InMemoryMessageStore::new();
        let msg = preparing("m1", Timestamp::now());

        store.insert(&msg).await.unwrap();
        assert!(store.insert(&msg).await.is_err());
    }

    #[tokio::test]
    async fn transition_applies_only_from_the_expected_state() {
        let store = InMemoryMessageStore::new();
        store.insert(&preparing("m1", Timestamp::now())).await.unwrap();

        let moved = store
            .transition("m1", SendState::Preparing, SendState::Over, None)
            .await
            .unwrap();
        assert!(moved);

        // Already Over: a second attempt is a no-op.
        let moved_again = store
            .transition("m1", SendState::Preparing, SendState::Fail, Some("late"))
            .await
            .unwrap();
        assert!(!moved_again);
        assert_eq!(store.message("m1").unwrap().send_state, SendState::Over);
        assert_eq!(store.message("m1").unwrap().cause, None);
    }

    #[tokio::test]
    async fn transition_on_missing_id_is_a_no_op() {
        let store = InMemoryMessageStore::new();
        let moved = store
            .transition("ghost", SendState::Preparing, SendState::Over, None)
            .await
            .unwrap();
        assert!(!moved);
    }

    #[tokio::test]
    async fn start_retry_moves_fail_back_to_preparing_with_bookkeeping() {
        let store = InMemoryMessageStore::new();
        let now = Timestamp::from_unix_millis(1_000);
        let mut msg = preparing("m1", now);
        msg.send_state = SendState::Fail;
        store.seed(msg);

        let next = now.plus_millis(1_002);
        assert!(store.start_retry("m1", 1, next).await.unwrap());

        let record = store.message("m1").unwrap();
        assert_eq!(record.send_state, SendState::Preparing);
        assert_eq!(record.curr_retry_times, 1);
        assert_eq!(record.next_retry_time, next);
    }

    #[tokio::test]
    async fn start_retry_skips_records_no_longer_failed() {
        let store = InMemoryMessageStore::new();
        let now = Timestamp::now();
        store.insert(&preparing("m1", now)).await.unwrap();

        assert!(!store.start_retry("m1", 1, now).await.unwrap());
        assert_eq!(store.message("m1").unwrap().curr_retry_times, 0);
    }

    #[tokio::test]
    async fn fail_due_selects_only_due_records_with_budget() {
        let store = InMemoryMessageStore::new();
        let now = Timestamp::from_unix_millis(100_000);

        let mut due = preparing("due", now.minus_millis(10_000));
        due.send_state = SendState::Fail;
        due.next_retry_time = now.minus_millis(1);
        store.seed(due);

        let mut not_due = preparing("not-due", now.minus_millis(10_000));
        not_due.send_state = SendState::Fail;
        not_due.next_retry_time = now.plus_millis(5_000);
        store.seed(not_due);

        let mut exhausted = preparing("exhausted", now.minus_millis(10_000));
        exhausted.send_state = SendState::Fail;
        exhausted.next_retry_time = now.minus_millis(1);
        exhausted.curr_retry_times = exhausted.max_retry_times;
        store.seed(exhausted);

        let mut over = preparing("over", now.minus_millis(10_000));
        over.send_state = SendState::Over;
        over.next_retry_time = now.minus_millis(1);
        store.seed(over);

        let found = store.fail_due(now).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "due");
    }

    #[tokio::test]
    async fn over_older_than_and_delete_batch_purge_completed_records() {
        let store = InMemoryMessageStore::new();
        let now = Timestamp::from_unix_millis(100_000);

        let mut old_over = preparing("old-over", now.minus_millis(60_000));
        old_over.send_state = SendState::Over;
        store.seed(old_over);

        let mut fresh_over = preparing("fresh-over", now.minus_millis(1_000));
        fresh_over.send_state = SendState::Over;
        store.seed(fresh_over);

        let mut old_fail = preparing("old-fail", now.minus_millis(60_000));
        old_fail.send_state = SendState::Fail;
        store.seed(old_fail);

        let cutoff = now.minus_millis(30_000);
        let ids = store.over_older_than(cutoff).await.unwrap();
        assert_eq!(ids, vec!["old-over".to_string()]);

        let deleted = store.delete_batch(&ids).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(store.message("old-over").is_none());
        assert!(store.message("fresh-over").is_some());
        assert!(store.message("old-fail").is_some());
    }
}
