//! Broker header keys carried on every outbox-originated message.
//!
//! The send coordinator stamps these onto each publish; the confirmation
//! reconciler uses them to recognize outbox traffic and correlate the
//! delivery outcome back to the stored record.

/// Header carrying the outbox message id.
pub const HEADER_MESSAGE_ID: &str = "TX_MSG_ID";

/// Header carrying the business type tag.
pub const HEADER_BIZ_TYPE: &str = "TX_MSG_BIZ_TYPE";

/// Header carrying the business key tag.
pub const HEADER_BIZ_KEY: &str = "TX_MSG_BIZ_KEY";
