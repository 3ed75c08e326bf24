//! PostgreSQL implementation of MessageStore.
//!
//! Provides the durable outbox table using PostgreSQL. The conditional
//! updates rely on `UPDATE ... WHERE id = $1 AND send_state = $2` plus
//! `rows_affected`, which gives the compare-and-swap the reconciliation
//! protocol needs without any row locking on the hot path.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{BackoffSchedule, OutboxMessage, OutboxError, SendState, Timestamp};
use crate::ports::MessageStore;

/// PostgreSQL implementation of the MessageStore port.
///
/// Uses sqlx for type-safe database operations with connection pooling.
pub struct PostgresMessageStore {
    pool: PgPool,
}

impl PostgresMessageStore {
    /// Creates a new PostgresMessageStore with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of an outbox message.
#[derive(Debug, sqlx::FromRow)]
struct OutboxMessageRow {
    id: String,
    target: String,
    routing_key: String,
    payload: Vec<u8>,
    biz_type: String,
    biz_key: String,
    send_state: String,
    curr_retry_times: i32,
    max_retry_times: i32,
    backoff_init_interval: i64,
    backoff_multiplier: f64,
    backoff_max_interval: i64,
    next_retry_time: DateTime<Utc>,
    cause: Option<String>,
    create_time: DateTime<Utc>,
}

impl TryFrom<OutboxMessageRow> for OutboxMessage {
    type Error = OutboxError;

    fn try_from(row: OutboxMessageRow) -> Result<Self, Self::Error> {
        let send_state = parse_state(&row.send_state)?;
        Ok(OutboxMessage {
            id: row.id,
            target: row.target,
            routing_key: row.routing_key,
            payload: row.payload,
            biz_type: row.biz_type,
            biz_key: row.biz_key,
            send_state,
            curr_retry_times: row.curr_retry_times.max(0) as u32,
            max_retry_times: row.max_retry_times.max(0) as u32,
            backoff: BackoffSchedule::new(
                row.backoff_init_interval.max(0) as u64,
                row.backoff_multiplier,
                row.backoff_max_interval.max(0) as u64,
            ),
            next_retry_time: Timestamp::from_datetime(row.next_retry_time),
            cause: row.cause,
            create_time: Timestamp::from_datetime(row.create_time),
        })
    }
}

fn parse_state(s: &str) -> Result<SendState, OutboxError> {
    SendState::parse(s)
        .ok_or_else(|| OutboxError::store(format!("Invalid send_state value: {}", s)))
}

#[async_trait]
impl MessageStore for PostgresMessageStore {
    async fn insert(&self, message: &OutboxMessage) -> Result<(), OutboxError> {
        sqlx::query(
            r#"
            INSERT INTO outbox_messages (
                id, target, routing_key, payload, biz_type, biz_key, send_state,
                curr_retry_times, max_retry_times,
                backoff_init_interval, backoff_multiplier, backoff_max_interval,
                next_retry_time, cause, create_time
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(&message.id)
        .bind(&message.target)
        .bind(&message.routing_key)
        .bind(&message.payload)
        .bind(&message.biz_type)
        .bind(&message.biz_key)
        .bind(message.send_state.as_str())
        .bind(message.curr_retry_times as i32)
        .bind(message.max_retry_times as i32)
        .bind(message.backoff.init_interval_ms as i64)
        .bind(message.backoff.multiplier)
        .bind(message.backoff.max_interval_ms as i64)
        .bind(message.next_retry_time.as_datetime())
        .bind(&message.cause)
        .bind(message.create_time.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some("outbox_messages_pkey") {
                    return OutboxError::store(format!(
                        "duplicate outbox message id '{}'",
                        message.id
                    ));
                }
            }
            OutboxError::store(format!("Failed to insert outbox message: {}", e))
        })?;

        Ok(())
    }

    async fn transition(
        &self,
        id: &str,
        expected: SendState,
        next: SendState,
        cause: Option<&str>,
    ) -> Result<bool, OutboxError> {
        let result = sqlx::query(
            r#"
            UPDATE outbox_messages
            SET send_state = $3,
                cause = COALESCE($4, cause)
            WHERE id = $1 AND send_state = $2
            "#,
        )
        .bind(id)
        .bind(expected.as_str())
        .bind(next.as_str())
        .bind(cause)
        .execute(&self.pool)
        .await
        .map_err(|e| OutboxError::store(format!("Failed to update outbox message: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    async fn start_retry(
        &self,
        id: &str,
        curr_retry_times: u32,
        next_retry_time: Timestamp,
    ) -> Result<bool, OutboxError> {
        let result = sqlx::query(
            r#"
            UPDATE outbox_messages
            SET send_state = $2,
                curr_retry_times = $3,
                next_retry_time = $4
            WHERE id = $1 AND send_state = $5
            "#,
        )
        .bind(id)
        .bind(SendState::Preparing.as_str())
        .bind(curr_retry_times as i32)
        .bind(next_retry_time.as_datetime())
        .bind(SendState::Fail.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| OutboxError::store(format!("Failed to start outbox retry: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    async fn fail_due(&self, now: Timestamp) -> Result<Vec<OutboxMessage>, OutboxError> {
        let rows = sqlx::query_as::<_, OutboxMessageRow>(
            r#"
            SELECT id, target, routing_key, payload, biz_type, biz_key, send_state,
                   curr_retry_times, max_retry_times,
                   backoff_init_interval, backoff_multiplier, backoff_max_interval,
                   next_retry_time, cause, create_time
            FROM outbox_messages
            WHERE send_state = $1
              AND curr_retry_times < max_retry_times
              AND next_retry_time <= $2
            ORDER BY next_retry_time
            "#,
        )
        .bind(SendState::Fail.as_str())
        .bind(now.as_datetime())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| OutboxError::store(format!("Failed to query due outbox messages: {}", e)))?;

        rows.into_iter().map(OutboxMessage::try_from).collect()
    }

    async fn over_older_than(&self, cutoff: Timestamp) -> Result<Vec<String>, OutboxError> {
        let ids: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT id
            FROM outbox_messages
            WHERE send_state = $1 AND create_time <= $2
            "#,
        )
        .bind(SendState::Over.as_str())
        .bind(cutoff.as_datetime())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            OutboxError::store(format!("Failed to query expired outbox messages: {}", e))
        })?;

        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    async fn delete_batch(&self, ids: &[String]) -> Result<u64, OutboxError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            DELETE FROM outbox_messages
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            OutboxError::store(format!("Failed to delete outbox messages: {}", e))
        })?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Note: Postgres integration tests require a running database and are
    // typically run separately from unit tests against a migrated schema.
    // The CAS and query semantics are covered store-agnostically through
    // the in-memory adapter.

    #[test]
    fn row_conversion_maps_every_field() {
        let row = OutboxMessageRow {
            id: "m1".to_string(),
            target: "orders.exchange".to_string(),
            routing_key: "orders.created".to_string(),
            payload: b"{}".to_vec(),
            biz_type: "order".to_string(),
            biz_key: "order-42".to_string(),
            send_state: "fail".to_string(),
            curr_retry_times: 2,
            max_retry_times: 5,
            backoff_init_interval: 1_000,
            backoff_multiplier: 2.0,
            backoff_max_interval: 5_000,
            next_retry_time: Utc::now(),
            cause: Some("broker nack".to_string()),
            create_time: Utc::now(),
        };

        let msg = OutboxMessage::try_from(row).unwrap();
        assert_eq!(msg.id, "m1");
        assert_eq!(msg.send_state, SendState::Fail);
        assert_eq!(msg.curr_retry_times, 2);
        assert_eq!(msg.backoff, BackoffSchedule::new(1_000, 2.0, 5_000));
        assert_eq!(msg.cause.as_deref(), Some("broker nack"));
    }

    #[test]
    fn row_conversion_rejects_unknown_states() {
        let row = OutboxMessageRow {
            id: "m1".to_string(),
            target: "ex".to_string(),
            routing_key: "rk".to_string(),
            payload: Vec::new(),
            biz_type: String::new(),
            biz_key: String::new(),
            send_state: "limbo".to_string(),
            curr_retry_times: 0,
            max_retry_times: 5,
            backoff_init_interval: 1_000,
            backoff_multiplier: 2.0,
            backoff_max_interval: 5_000,
            next_retry_time: Utc::now(),
            cause: None,
            create_time: Utc::now(),
        };

        assert!(OutboxMessage::try_from(row).is_err());
    }
}
