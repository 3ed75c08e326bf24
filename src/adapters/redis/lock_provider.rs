//! Redis-backed lock provider for production deployments.
//!
//! Implements the named cluster lock with `SET NX PX`: the lock key
//! carries a lease so a crashed holder cannot block every other worker
//! past the lease. Acquisition polls until the configured bounded wait
//! expires; release deletes the key only when it still holds this
//! provider's token, so an expired-and-reacquired lock is never released
//! from the wrong holder.

use std::collections::HashMap;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Script;
use tokio::sync::Mutex;
use tokio::time;
use uuid::Uuid;

use crate::domain::OutboxError;
use crate::ports::LockProvider;

use super::config::LockConfig;

const LOCK_KEY_PREFIX: &str = "outbox:lock:";

const RELEASE_SCRIPT: &str = r#"
if redis.call('get', KEYS[1]) == ARGV[1] then
    return redis.call('del', KEYS[1])
else
    return 0
end
"#;

/// Redis-backed implementation of [`LockProvider`].
pub struct RedisLockProvider {
    conn: MultiplexedConnection,
    config: LockConfig,
    /// Token per held lock name; proves ownership at release time.
    tokens: Mutex<HashMap<String, String>>,
}

impl RedisLockProvider {
    /// Creates a new Redis lock provider.
    pub fn new(conn: MultiplexedConnection, config: LockConfig) -> Self {
        Self {
            conn,
            config,
            tokens: Mutex::new(HashMap::new()),
        }
    }

    fn key_for(name: &str) -> String {
        format!("{}{}", LOCK_KEY_PREFIX, name)
    }

    async fn try_acquire(&self, key: &str, token: &str) -> Result<bool, OutboxError> {
        let mut conn = self.conn.clone();
        let acquired: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(token)
            .arg("NX")
            .arg("PX")
            .arg(self.config.lease_ms)
            .query_async(&mut conn)
            .await
            .map_err(|e: redis::RedisError| OutboxError::lock(e))?;
        Ok(acquired.is_some())
    }
}

#[async_trait]
impl LockProvider for RedisLockProvider {
    async fn lock(&self, name: &str) -> Result<(), OutboxError> {
        let key = Self::key_for(name);
        let token = Uuid::new_v4().to_string();
        let deadline = time::Instant::now() + self.config.acquire_wait();

        loop {
            if self.try_acquire(&key, &token).await? {
                self.tokens.lock().await.insert(name.to_string(), token);
                return Ok(());
            }
            if time::Instant::now() >= deadline {
                return Err(OutboxError::lock(format!(
                    "timed out acquiring lock '{}'",
                    name
                )));
            }
            time::sleep(self.config.retry_interval()).await;
        }
    }

    async fn unlock(&self, name: &str) -> Result<(), OutboxError> {
        let Some(token) = self.tokens.lock().await.remove(name) else {
            return Ok(());
        };

        let mut conn = self.conn.clone();
        let released: i32 = Script::new(RELEASE_SCRIPT)
            .key(Self::key_for(name))
            .arg(&token)
            .invoke_async(&mut conn)
            .await
            .map_err(|e: redis::RedisError| OutboxError::lock(e))?;

        if released == 0 {
            // Lease expired before release; the next pass is already safe
            // to start, so this is observability only.
            tracing::warn!("Lock '{}' lease expired before release", name);
        }
        Ok(())
    }
}
