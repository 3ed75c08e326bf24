//! In-memory lock provider for testing.
//!
//! Single-process stand-in for the Redis lock: the same blocking-acquire
//! contract, scoped to the current process. Testing only.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time;

use crate::domain::OutboxError;
use crate::ports::LockProvider;

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// In-memory implementation of [`LockProvider`].
pub struct InMemoryLockProvider {
    held: Mutex<HashSet<String>>,
    acquire_wait: Duration,
}

impl InMemoryLockProvider {
    /// Creates a provider with a 5 second acquisition wait.
    pub fn new() -> Self {
        Self::with_acquire_wait(Duration::from_secs(5))
    }

    /// Creates a provider with a custom acquisition wait (tests of lock
    /// contention want a short one).
    pub fn with_acquire_wait(acquire_wait: Duration) -> Self {
        Self {
            held: Mutex::new(HashSet::new()),
            acquire_wait,
        }
    }

    /// Whether the named lock is currently held.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn is_held(&self, name: &str) -> bool {
        self.held
            .lock()
            .expect("InMemoryLockProvider: held lock poisoned")
            .contains(name)
    }

    fn try_acquire(&self, name: &str) -> bool {
        self.held
            .lock()
            .expect("InMemoryLockProvider: held lock poisoned")
            .insert(name.to_string())
    }
}

impl Default for InMemoryLockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LockProvider for InMemoryLockProvider {
    async fn lock(&self, name: &str) -> Result<(), OutboxError> {
        let deadline = time::Instant::now() + self.acquire_wait;
        loop {
            if self.try_acquire(name) {
                return Ok(());
            }
            if time::Instant::now() >= deadline {
                return Err(OutboxError::lock(format!(
                    "timed out acquiring lock '{}'",
                    name
                )));
            }
            time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn unlock(&self, name: &str) -> Result<(), OutboxError> {
        self.held
            .lock()
            .expect("InMemoryLockProvider: held lock poisoned")
            .remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn lock_and_unlock_roundtrip() {
        let provider = InMemoryLockProvider::new();

        provider.lock("jobs:retry").await.unwrap();
        assert!(provider.is_held("jobs:retry"));

        provider.unlock("jobs:retry").await.unwrap();
        assert!(!provider.is_held("jobs:retry"));
    }

    #[tokio::test]
    async fn second_acquire_times_out_while_held() {
        let provider = InMemoryLockProvider::with_acquire_wait(Duration::from_millis(20));
        provider.lock("jobs:retry").await.unwrap();

        let err = provider.lock("jobs:retry").await.unwrap_err();
        assert!(matches!(err, OutboxError::Lock(_)));
    }

    #[tokio::test]
    async fn blocked_acquire_proceeds_after_release() {
        let provider = Arc::new(InMemoryLockProvider::new());
        provider.lock("jobs:retry").await.unwrap();

        let contender = {
            let provider = provider.clone();
            tokio::spawn(async move { provider.lock("jobs:retry").await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        provider.unlock("jobs:retry").await.unwrap();

        contender.await.unwrap().unwrap();
        assert!(provider.is_held("jobs:retry"));
    }
}
