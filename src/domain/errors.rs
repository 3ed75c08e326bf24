//! Error types for the outbox domain.

use thiserror::Error;

/// Errors surfaced by the outbox components.
///
/// Broker nacks and returned messages are not errors: they arrive through
/// the reconciler callbacks and are recorded into the message `cause`
/// field. Only validation failures and collaborator breakage reach the
/// caller as `OutboxError`.
#[derive(Debug, Clone, Error)]
pub enum OutboxError {
    /// A required addressing or payload field is missing before send.
    /// Caller-fatal; nothing is persisted.
    #[error("outbox message is missing required field '{field}'")]
    Validation { field: &'static str },

    /// Transport-level failure while handing a message to the broker.
    /// Captured into the record `cause`; the record moves to `Fail`.
    #[error("broker publish failed: {0}")]
    Publish(String),

    /// The durable store is unavailable or rejected an operation.
    /// Fatal to the scheduler pass that hit it.
    #[error("outbox store error: {0}")]
    Store(String),

    /// The cluster lock provider is unavailable.
    /// Fatal to the scheduler pass that hit it.
    #[error("lock provider error: {0}")]
    Lock(String),
}

impl OutboxError {
    /// Creates a validation error for a missing field.
    pub fn missing(field: &'static str) -> Self {
        OutboxError::Validation { field }
    }

    /// Creates a store error from any displayable source.
    pub fn store(source: impl std::fmt::Display) -> Self {
        OutboxError::Store(source.to_string())
    }

    /// Creates a lock error from any displayable source.
    pub fn lock(source: impl std::fmt::Display) -> Self {
        OutboxError::Lock(source.to_string())
    }
}
