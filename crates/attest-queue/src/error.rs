use thiserror::Error;

use attest_core::AttemptId;

/// Queue errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("failed to encode task payload: {0}")]
    Encode(String),

    #[error("failed to decode task payload: {0}")]
    Decode(String),

    /// The delivery was already acked, nacked, or reaped and redelivered.
    #[error("no in-flight delivery for {0}")]
    UnknownDelivery(AttemptId),

    #[error("invalid queue configuration: {0}")]
    Config(String),

    #[error("queue backend error: {0}")]
    Backend(String),
}
