//! Ports - Interfaces for external collaborators.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the outbox core and the outside world. Adapters implement these ports.
//!
//! - `MessageStore` - durable record store with CAS conditional updates
//! - `MessagePublisher` - broker transport, plus the `Confirmation` and
//!   `ReturnedMessage` callback payloads
//! - `LockProvider` - cluster-wide named lock for singleton scheduler passes

mod lock_provider;
mod message_publisher;
mod message_store;

pub use lock_provider::LockProvider;
pub use message_publisher::{Confirmation, MessagePublisher, ReturnedMessage};
pub use message_store::MessageStore;
