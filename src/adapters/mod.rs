//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the outbox core to external systems:
//! - `postgres` - durable record store (sqlx)
//! - `redis` - cluster-wide named lock
//! - `memory` - in-process implementations for testing

pub mod memory;
pub mod postgres;
pub mod redis;

pub use memory::{InMemoryLockProvider, InMemoryMessageStore, InMemoryPublisher};
pub use postgres::PostgresMessageStore;
pub use redis::{LockConfig, RedisLockProvider};
