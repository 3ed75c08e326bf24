//! Redis adapters.
//!
//! `RedisLockProvider` implements the cluster-wide named lock guarding
//! scheduler passes across worker processes.

mod config;
mod lock_provider;

pub use config::LockConfig;
pub use lock_provider::RedisLockProvider;
