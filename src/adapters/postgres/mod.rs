//! PostgreSQL adapters.
//!
//! `PostgresMessageStore` backs the outbox table; the schema lives in
//! `migrations/`.

mod message_store;

pub use message_store::PostgresMessageStore;
