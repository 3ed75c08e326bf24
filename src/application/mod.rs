//! Application layer - the outbox components.
//!
//! - `SendCoordinator` - validate, register at `Preparing`, publish
//! - `ConfirmationReconciler` - broker confirm/return callbacks to state
//! - `RetryScheduler` - lock-guarded backoff retry of failed records
//! - `CleanupScheduler` - lock-guarded retention purge of delivered records

mod cleanup;
mod reconciler;
mod retry;
mod sender;

pub use cleanup::{CleanupOutcome, CleanupScheduler, CLEAR_LOCK_NAME};
pub use reconciler::ConfirmationReconciler;
pub use retry::{RetryOutcome, RetryScheduler, RETRY_LOCK_NAME};
pub use sender::SendCoordinator;
