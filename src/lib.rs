//! Outbox Relay - Transactional Outbox for Reliable Message Publication
//!
//! A business transaction records its outgoing message durably before any
//! network send; the relay then publishes it, reconciles the broker's
//! confirm/return callbacks into the record's delivery state, retries
//! failures with bounded backoff, and purges delivered records past a
//! retention window. Delivery is at-least-once; consumers are assumed
//! idempotent.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use outbox_relay::adapters::{InMemoryLockProvider, InMemoryMessageStore, InMemoryPublisher};
//! use outbox_relay::application::{CleanupScheduler, RetryScheduler, SendCoordinator};
//! use outbox_relay::config::OutboxConfig;
//! use outbox_relay::domain::MessageDraft;
//!
//! # async fn run() -> Result<(), outbox_relay::domain::OutboxError> {
//! let config = OutboxConfig::default();
//! let store = Arc::new(InMemoryMessageStore::new());
//! let publisher = Arc::new(InMemoryPublisher::new());
//! let lock = Arc::new(InMemoryLockProvider::new());
//!
//! let sender = Arc::new(
//!     SendCoordinator::new(store.clone(), publisher.clone())
//!         .with_default_retry(config.retry_policy()),
//! );
//! let retry = RetryScheduler::new(store.clone(), sender.clone(), lock.clone())
//!     .with_poll_interval(config.retry_poll_interval());
//! let cleanup = CleanupScheduler::new(store.clone(), lock.clone(), config.retention())
//!     .with_poll_interval(config.clear_poll_interval());
//!
//! let draft = MessageDraft::new("orders.exchange", "orders.created", b"{}".to_vec())
//!     .with_biz("order", "order-42");
//! sender.deliver(draft).await?;
//!
//! let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! tokio::spawn(async move { retry.run(shutdown_rx).await });
//! let _ = shutdown_tx;
//! let _ = cleanup;
//! # Ok(())
//! # }
//! ```
//!
//! In production, back the ports with `PostgresMessageStore` and
//! `RedisLockProvider`, and feed the broker's confirm/return callbacks to
//! a `ConfirmationReconciler`.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
