//! SendCoordinator - validates and registers a message before first send,
//! then performs the actual publish.
//!
//! Registration and publishing are deliberately separate operations: a
//! business transaction calls `register` inside its own boundary so the
//! record is durable before any network call, and `send` runs after commit.
//! `deliver` chains the two for callers without an explicit transaction.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::headers::{HEADER_BIZ_KEY, HEADER_BIZ_TYPE, HEADER_MESSAGE_ID};
use crate::domain::{MessageDraft, OutboxMessage, OutboxError, RetryPolicy, SendState, Timestamp};
use crate::ports::{MessagePublisher, MessageStore};

/// Coordinates the first leg of the outbox flow: durable registration at
/// `Preparing`, then publish with correlation headers attached.
pub struct SendCoordinator {
    store: Arc<dyn MessageStore>,
    publisher: Arc<dyn MessagePublisher>,
    default_retry: RetryPolicy,
}

impl SendCoordinator {
    /// Creates a coordinator with the default retry policy.
    pub fn new(store: Arc<dyn MessageStore>, publisher: Arc<dyn MessagePublisher>) -> Self {
        Self {
            store,
            publisher,
            default_retry: RetryPolicy::default(),
        }
    }

    /// Sets the retry policy applied to drafts that carry none.
    pub fn with_default_retry(mut self, retry: RetryPolicy) -> Self {
        self.default_retry = retry;
        self
    }

    /// Validates a draft before registration and fills in a generated id
    /// when the caller left it out.
    ///
    /// Rejects drafts missing `target`, `routing_key` or `payload`;
    /// nothing is persisted for a rejected draft.
    pub fn check_before_send(&self, draft: &mut MessageDraft) -> Result<(), OutboxError> {
        if draft.target.is_empty() {
            return Err(OutboxError::missing("target"));
        }
        if draft.routing_key.is_empty() {
            return Err(OutboxError::missing("routing_key"));
        }
        if draft.payload.is_empty() {
            return Err(OutboxError::missing("payload"));
        }
        if draft.id.as_deref().map_or(true, str::is_empty) {
            draft.id = Some(OutboxMessage::generate_id());
        }
        Ok(())
    }

    /// Validates the draft and persists the record at `Preparing` with a
    /// zeroed retry count and the first retry window measured from now.
    /// Durable write only; no network call happens here.
    pub async fn register(&self, mut draft: MessageDraft) -> Result<OutboxMessage, OutboxError> {
        self.check_before_send(&mut draft)?;
        let message = OutboxMessage::register(draft, self.default_retry, Timestamp::now());
        self.store.insert(&message).await?;
        tracing::debug!(
            "Registered outbox message {} ({}_{})",
            message.id,
            message.biz_type,
            message.biz_key
        );
        Ok(message)
    }

    /// Publishes a registered record, stamping the outbox id and business
    /// tags as headers so the reconciler can correlate the broker outcome.
    ///
    /// Returns `true` when the message was handed to the broker. A
    /// synchronous publish failure is captured, not propagated: the record
    /// moves `Preparing -> Fail` with the error text as cause (guarded, so
    /// a concurrent confirmation that already resolved the record wins)
    /// and `false` comes back. Store failures do propagate.
    pub async fn send(&self, message: &OutboxMessage) -> Result<bool, OutboxError> {
        let mut headers = HashMap::new();
        headers.insert(HEADER_MESSAGE_ID.to_string(), message.id.clone());
        headers.insert(HEADER_BIZ_TYPE.to_string(), message.biz_type.clone());
        headers.insert(HEADER_BIZ_KEY.to_string(), message.biz_key.clone());

        match self
            .publisher
            .publish(&message.target, &message.routing_key, &message.payload, &headers)
            .await
        {
            Ok(_) => {
                tracing::debug!(
                    "Sent outbox message {} ({}_{})",
                    message.id,
                    message.biz_type,
                    message.biz_key
                );
                Ok(true)
            }
            Err(e) => {
                let cause = e.to_string();
                let applied = self
                    .store
                    .transition(
                        &message.id,
                        SendState::Preparing,
                        SendState::Fail,
                        Some(cause.as_str()),
                    )
                    .await?;
                tracing::debug!(
                    "Send failed for outbox message {} (marked fail: {}): {}",
                    message.id,
                    applied,
                    e
                );
                Ok(false)
            }
        }
    }

    /// Registers and immediately sends: the convenience path for callers
    /// outside an explicit transaction boundary.
    pub async fn deliver(&self, draft: MessageDraft) -> Result<OutboxMessage, OutboxError> {
        let message = self.register(draft).await?;
        self.send(&message).await?;
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryMessageStore, InMemoryPublisher};
    use crate::domain::BackoffSchedule;

    fn coordinator() -> (Arc<InMemoryMessageStore>, Arc<InMemoryPublisher>, SendCoordinator) {
        let store = Arc::new(InMemoryMessageStore::new());
        let publisher = Arc::new(InMemoryPublisher::new());
        let sender = SendCoordinator::new(store.clone(), publisher.clone());
        (store, publisher, sender)
    }

    fn draft() -> MessageDraft {
        MessageDraft::new("orders.exchange", "orders.created", b"{\"id\":42}".to_vec())
            .with_biz("order", "order-42")
    }

    #[tokio::test]
    async fn register_rejects_a_draft_missing_target_without_persisting() {
        let (store, _, sender) = coordinator();
        let bad = MessageDraft::new("", "rk", b"p".to_vec());

        let err = sender.register(bad).await.unwrap_err();
        assert!(matches!(err, OutboxError::Validation { field: "target" }));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn register_rejects_missing_routing_key_and_payload() {
        let (_, _, sender) = coordinator();

        let err = sender
            .register(MessageDraft::new("ex", "", b"p".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(err, OutboxError::Validation { field: "routing_key" }));

        let err = sender
            .register(MessageDraft::new("ex", "rk", Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, OutboxError::Validation { field: "payload" }));
    }

    #[tokio::test]
    async fn check_before_send_assigns_an_id_when_absent() {
        let (_, _, sender) = coordinator();
        let mut d = draft();
        assert!(d.id.is_none());

        sender.check_before_send(&mut d).unwrap();
        assert!(d.id.as_deref().is_some_and(|id| !id.is_empty()));

        // A caller-supplied id is kept.
        let mut with_id = draft().with_id("msg-7");
        sender.check_before_send(&mut with_id).unwrap();
        assert_eq!(with_id.id.as_deref(), Some("msg-7"));
    }

    #[tokio::test]
    async fn register_persists_a_preparing_record() {
        let (store, publisher, sender) = coordinator();

        let message = sender.register(draft()).await.unwrap();

        let stored = store.message(&message.id).unwrap();
        assert_eq!(stored.send_state, SendState::Preparing);
        assert_eq!(stored.curr_retry_times, 0);
        // Registration never talks to the broker.
        assert_eq!(publisher.publish_count(), 0);
    }

    #[tokio::test]
    async fn send_attaches_correlation_headers() {
        let (_, publisher, sender) = coordinator();

        let message = sender.register(draft()).await.unwrap();
        let sent = sender.send(&message).await.unwrap();
        assert!(sent);

        let published = publisher.published();
        assert_eq!(published.len(), 1);
        let headers = &published[0].headers;
        assert_eq!(headers.get(HEADER_MESSAGE_ID), Some(&message.id));
        assert_eq!(headers.get(HEADER_BIZ_TYPE), Some(&"order".to_string()));
        assert_eq!(headers.get(HEADER_BIZ_KEY), Some(&"order-42".to_string()));
        assert_eq!(published[0].correlation_id, message.id);
    }

    #[tokio::test]
    async fn send_failure_marks_the_record_fail_with_cause() {
        let (store, publisher, sender) = coordinator();
        publisher.fail_with("connection refused");

        let message = sender.register(draft()).await.unwrap();
        let sent = sender.send(&message).await.unwrap();
        assert!(!sent);

        let stored = store.message(&message.id).unwrap();
        assert_eq!(stored.send_state, SendState::Fail);
        assert!(stored.cause.as_deref().unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn send_failure_never_overwrites_a_resolved_record() {
        let (store, publisher, sender) = coordinator();
        let message = sender.register(draft()).await.unwrap();

        // A concurrent confirmation resolves the record first.
        store
            .transition(&message.id, SendState::Preparing, SendState::Over, None)
            .await
            .unwrap();

        publisher.fail_with("connection refused");
        sender.send(&message).await.unwrap();

        let stored = store.message(&message.id).unwrap();
        assert_eq!(stored.send_state, SendState::Over);
        assert_eq!(stored.cause, None);
    }

    #[tokio::test]
    async fn deliver_registers_then_publishes() {
        let (store, publisher, sender) = coordinator();

        let message = sender.deliver(draft()).await.unwrap();

        assert!(store.message(&message.id).is_some());
        assert_eq!(publisher.published_for(&message.id).len(), 1);
    }

    #[tokio::test]
    async fn default_retry_policy_applies_to_drafts_without_one() {
        let store = Arc::new(InMemoryMessageStore::new());
        let publisher = Arc::new(InMemoryPublisher::new());
        let policy = RetryPolicy {
            max_retry_times: 7,
            backoff: BackoffSchedule::new(500, 1.0, 2_000),
        };
        let sender =
            SendCoordinator::new(store.clone(), publisher).with_default_retry(policy);

        let message = sender.register(draft()).await.unwrap();
        assert_eq!(message.max_retry_times, 7);
        assert_eq!(message.backoff, policy.backoff);
    }
}
