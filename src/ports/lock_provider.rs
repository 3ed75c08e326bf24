//! LockProvider port - cluster-wide named mutual exclusion.
//!
//! The schedulers acquire a named lock before a pass so at most one worker
//! process runs a given pass at a time. The lock guards only the *start*
//! of a pass; per-record updates stay individually safe through the
//! store's conditional updates.
//!
//! Acquisition blocks with a bounded wait (provider-configured) and every
//! exit path of a pass releases the lock, success or not.

use async_trait::async_trait;

use crate::domain::OutboxError;

/// Port for a cluster-wide named lock.
#[async_trait]
pub trait LockProvider: Send + Sync {
    /// Acquires the named lock, blocking up to the provider's bounded
    /// wait. Fails with [`OutboxError::Lock`] when the wait expires or the
    /// provider is unavailable.
    async fn lock(&self, name: &str) -> Result<(), OutboxError>;

    /// Releases the named lock.
    async fn unlock(&self, name: &str) -> Result<(), OutboxError>;
}
