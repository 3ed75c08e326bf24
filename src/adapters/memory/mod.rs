//! In-memory adapters.
//!
//! Synchronous, in-process implementations of the three ports for
//! deterministic tests:
//!
//! - `InMemoryMessageStore` - record store with CAS semantics
//! - `InMemoryLockProvider` - process-local named lock
//! - `InMemoryPublisher` - recording broker stand-in with failure injection

mod lock_provider;
mod message_store;
mod publisher;

pub use lock_provider::InMemoryLockProvider;
pub use message_store::InMemoryMessageStore;
pub use publisher::{InMemoryPublisher, PublishedMessage};
