//! The outbox message record and its delivery state machine.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{BackoffSchedule, Timestamp};

/// Delivery lifecycle of an outbox record.
///
/// Transitions only along `Preparing -> Over`, `Preparing -> Fail` and
/// `Fail -> Preparing` (when a retry attempt starts). `Over` is terminal.
/// Every cross-process mutation is a compare-and-swap against the current
/// state, so duplicate or out-of-order updates degrade to no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendState {
    /// Recorded durably, broker outcome not yet known.
    Preparing,
    /// Send failed or was nacked/returned; eligible for retry while the
    /// retry budget lasts.
    Fail,
    /// Broker acknowledged delivery. Terminal.
    Over,
}

impl SendState {
    /// Store wire form.
    pub fn as_str(&self) -> &'static str {
        match self {
            SendState::Preparing => "preparing",
            SendState::Fail => "fail",
            SendState::Over => "over",
        }
    }

    /// Parses the store wire form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "preparing" => Some(SendState::Preparing),
            "fail" => Some(SendState::Fail),
            "over" => Some(SendState::Over),
            _ => None,
        }
    }
}

impl std::fmt::Display for SendState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retry budget and backoff parameters, fixed at registration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retry_times: u32,
    pub backoff: BackoffSchedule,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retry_times: 5,
            backoff: BackoffSchedule::default(),
        }
    }
}

/// Caller-facing input for a message about to enter the outbox.
///
/// `id` may be left out; registration assigns a generated one. `retry`
/// overrides the configured default policy for this message only.
#[derive(Debug, Clone)]
pub struct MessageDraft {
    pub id: Option<String>,
    pub target: String,
    pub routing_key: String,
    pub payload: Vec<u8>,
    pub biz_type: String,
    pub biz_key: String,
    pub retry: Option<RetryPolicy>,
}

impl MessageDraft {
    pub fn new(
        target: impl Into<String>,
        routing_key: impl Into<String>,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            id: None,
            target: target.into(),
            routing_key: routing_key.into(),
            payload: payload.into(),
            biz_type: String::new(),
            biz_key: String::new(),
            retry: None,
        }
    }

    /// Sets a caller-supplied message id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the business correlation tags.
    pub fn with_biz(mut self, biz_type: impl Into<String>, biz_key: impl Into<String>) -> Self {
        self.biz_type = biz_type.into();
        self.biz_key = biz_key.into();
        self
    }

    /// Overrides the default retry policy for this message.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }
}

/// The sole persisted entity: one outgoing message and its delivery state.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxMessage {
    pub id: String,
    pub target: String,
    pub routing_key: String,
    pub payload: Vec<u8>,
    pub biz_type: String,
    pub biz_key: String,
    pub send_state: SendState,
    pub curr_retry_times: u32,
    pub max_retry_times: u32,
    pub backoff: BackoffSchedule,
    /// Earliest retry eligibility; meaningful only while `send_state` is
    /// `Fail` and the retry budget is not exhausted.
    pub next_retry_time: Timestamp,
    pub cause: Option<String>,
    pub create_time: Timestamp,
}

impl OutboxMessage {
    /// Builds the record a registration persists: state `Preparing`,
    /// zero retries so far, first retry window measured from `now`. A
    /// draft without an id gets a generated one.
    pub fn register(draft: MessageDraft, default_retry: RetryPolicy, now: Timestamp) -> Self {
        let retry = draft.retry.unwrap_or(default_retry);
        Self {
            id: draft.id.unwrap_or_else(Self::generate_id),
            target: draft.target,
            routing_key: draft.routing_key,
            payload: draft.payload,
            biz_type: draft.biz_type,
            biz_key: draft.biz_key,
            send_state: SendState::Preparing,
            curr_retry_times: 0,
            max_retry_times: retry.max_retry_times,
            backoff: retry.backoff,
            next_retry_time: retry.backoff.next_retry_time(now, 0),
            cause: None,
            create_time: now,
        }
    }

    /// Generates a fresh message id.
    pub fn generate_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Whether the retry budget is exhausted.
    pub fn retries_exhausted(&self) -> bool {
        self.curr_retry_times >= self.max_retry_times
    }
}
