//! MessagePublisher port - the broker transport.
//!
//! Publishing is fire-and-forget at this boundary: the broker reports the
//! real outcome asynchronously through its confirm and return callbacks.
//! The integration owning the broker connection converts those callbacks
//! into [`Confirmation`] / [`ReturnedMessage`] values and hands them to the
//! `ConfirmationReconciler`.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::OutboxError;

/// Port for handing a message to the broker.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Publishes `payload` to `target`/`routing_key` carrying `headers`.
    ///
    /// Returns the correlation id the broker will echo in its confirm
    /// callback. Outbox-originated publishes use the message id as the
    /// correlation id.
    async fn publish(
        &self,
        target: &str,
        routing_key: &str,
        payload: &[u8],
        headers: &HashMap<String, String>,
    ) -> Result<String, OutboxError>;
}

/// Broker acknowledgment for a published message.
///
/// `ack` is `true` when the broker accepted the message, `false` when it
/// explicitly rejected it (`cause` then describes why). Headers are the
/// ones stamped at publish time; a confirmation without the outbox id
/// header did not originate here and is ignored.
#[derive(Debug, Clone)]
pub struct Confirmation {
    pub correlation_id: String,
    pub headers: HashMap<String, String>,
    pub ack: bool,
    pub cause: Option<String>,
}

/// Broker notification that a published message could not be routed to any
/// consumer queue.
#[derive(Debug, Clone)]
pub struct ReturnedMessage {
    pub headers: HashMap<String, String>,
    pub reply_code: i32,
    pub reply_text: String,
    pub target: String,
    pub routing_key: String,
}
