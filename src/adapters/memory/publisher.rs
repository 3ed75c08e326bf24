//! In-memory broker publisher for testing.
//!
//! Records every publish for assertions and can be switched into a failing
//! mode to exercise the send-failure paths. Testing only.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::headers::HEADER_MESSAGE_ID;
use crate::domain::{OutboxError, OutboxMessage};
use crate::ports::MessagePublisher;

/// One recorded publish.
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub target: String,
    pub routing_key: String,
    pub payload: Vec<u8>,
    pub headers: HashMap<String, String>,
    pub correlation_id: String,
}

/// In-memory implementation of [`MessagePublisher`].
pub struct InMemoryPublisher {
    published: RwLock<Vec<PublishedMessage>>,
    failure: RwLock<Option<String>>,
}

impl InMemoryPublisher {
    /// Creates a publisher that accepts every publish.
    pub fn new() -> Self {
        Self {
            published: RwLock::new(Vec::new()),
            failure: RwLock::new(None),
        }
    }

    // === Test Helpers ===

    /// Makes every subsequent publish fail with the given cause.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn fail_with(&self, cause: impl Into<String>) {
        *self
            .failure
            .write()
            .expect("InMemoryPublisher: failure lock poisoned") = Some(cause.into());
    }

    /// Restores successful publishing.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn succeed(&self) {
        *self
            .failure
            .write()
            .expect("InMemoryPublisher: failure lock poisoned") = None;
    }

    /// Returns all recorded publishes.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published
            .read()
            .expect("InMemoryPublisher: published lock poisoned")
            .clone()
    }

    /// Returns the number of recorded publishes.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn publish_count(&self) -> usize {
        self.published
            .read()
            .expect("InMemoryPublisher: published lock poisoned")
            .len()
    }

    /// Returns the publishes recorded for a given outbox message id.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn published_for(&self, message_id: &str) -> Vec<PublishedMessage> {
        self.published()
            .into_iter()
            .filter(|p| p.headers.get(HEADER_MESSAGE_ID).map(String::as_str) == Some(message_id))
            .collect()
    }
}

impl Default for InMemoryPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessagePublisher for InMemoryPublisher {
    async fn publish(
        &self,
        target: &str,
        routing_key: &str,
        payload: &[u8],
        headers: &HashMap<String, String>,
    ) -> Result<String, OutboxError> {
        if let Some(cause) = self
            .failure
            .read()
            .expect("InMemoryPublisher: failure lock poisoned")
            .clone()
        {
            return Err(OutboxError::Publish(cause));
        }

        let correlation_id = headers
            .get(HEADER_MESSAGE_ID)
            .cloned()
            .unwrap_or_else(OutboxMessage::generate_id);

        self.published
            .write()
            .expect("InMemoryPublisher: published write lock poisoned")
            .push(PublishedMessage {
                target: target.to_string(),
                routing_key: routing_key.to_string(),
                payload: payload.to_vec(),
                headers: headers.clone(),
                correlation_id: correlation_id.clone(),
            });

        Ok(correlation_id)
    }
}
