//! Domain layer containing the outbox model and state machine.
//!
//! # Module Organization
//!
//! - `message` - The persisted outbox record and its delivery lifecycle
//! - `backoff` - Retry backoff schedule
//! - `headers` - Broker header keys stamped on outbox-originated messages
//! - `timestamp` - UTC instant value object
//! - `errors` - Domain error taxonomy
//!
//! No I/O lives here; collaborators are reached through the ports layer.

mod backoff;
mod errors;
pub mod headers;
mod message;
mod timestamp;

pub use backoff::BackoffSchedule;
pub use errors::OutboxError;
pub use message::{MessageDraft, OutboxMessage, RetryPolicy, SendState};
pub use timestamp::Timestamp;
