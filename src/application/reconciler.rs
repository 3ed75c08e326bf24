//! ConfirmationReconciler - consumes broker confirm/return callbacks and
//! advances outbox state accordingly.
//!
//! Both handlers are conditional updates against the current state, so
//! duplicate and out-of-order callback delivery degrades to no-ops: a
//! callback arriving after the record already left `Preparing` changes
//! nothing. In particular `Over` is terminal here: a return notification
//! delivered after a late confirm does not resurrect the record.

use std::sync::Arc;

use crate::domain::headers::HEADER_MESSAGE_ID;
use crate::domain::{OutboxError, SendState};
use crate::ports::{Confirmation, MessageStore, ReturnedMessage};

/// Advances outbox records from broker delivery outcomes.
pub struct ConfirmationReconciler {
    store: Arc<dyn MessageStore>,
}

impl ConfirmationReconciler {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }

    /// Handles a broker confirm.
    ///
    /// Ignored when the callback does not carry the outbox id header (the
    /// delivery did not originate here). Ack moves `Preparing -> Over`;
    /// nack moves `Preparing -> Fail` with the broker's cause.
    pub async fn on_confirm(&self, confirmation: &Confirmation) -> Result<(), OutboxError> {
        if confirmation.correlation_id.is_empty()
            || !confirmation.headers.contains_key(HEADER_MESSAGE_ID)
        {
            return Ok(());
        }
        let id = confirmation.correlation_id.as_str();

        if confirmation.ack {
            let applied = self
                .store
                .transition(id, SendState::Preparing, SendState::Over, None)
                .await?;
            tracing::debug!("Outbox message {} confirmed (marked over: {})", id, applied);
        } else {
            let cause = confirmation.cause.as_deref().unwrap_or("broker nack");
            let applied = self
                .store
                .transition(id, SendState::Preparing, SendState::Fail, Some(cause))
                .await?;
            tracing::debug!(
                "Outbox message {} nacked (marked fail: {}): {}",
                id,
                applied,
                cause
            );
        }
        Ok(())
    }

    /// Handles a broker return (message unroutable to any queue).
    ///
    /// Ignored without the outbox id header. Moves `Preparing -> Fail`
    /// with a cause describing the routing failure; guarded like
    /// `on_confirm`, so an already-resolved record stays resolved.
    pub async fn on_returned(&self, returned: &ReturnedMessage) -> Result<(), OutboxError> {
        let Some(id) = returned.headers.get(HEADER_MESSAGE_ID) else {
            return Ok(());
        };

        let cause = format!(
            "Returned message, replyCode:{}, replyText:{}, target:{}, routingKey:{}",
            returned.reply_code, returned.reply_text, returned.target, returned.routing_key
        );
        let applied = self
            .store
            .transition(id, SendState::Preparing, SendState::Fail, Some(cause.as_str()))
            .await?;
        tracing::debug!("Outbox message {} returned (marked fail: {})", id, applied);
        Ok(())
    }
}
