//! Error types for the event pipeline.

use std::time::Duration;

use thiserror::Error;

/// Transport-level broker failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BrokerError {
    #[error("broker connection error: {0}")]
    Connection(String),

    #[error("broker channel error: {0}")]
    Channel(String),

    #[error("exchange not found: {0}")]
    ExchangeNotFound(String),

    #[error("queue not found: {0}")]
    QueueNotFound(String),

    #[error("unknown delivery tag {0}")]
    UnknownDeliveryTag(u64),

    #[error("broker rejected publish: {0}")]
    Nacked(String),
}

/// Failure to hand a domain event to the broker.
///
/// Surfaced to the caller of the operation that produced the event; never swallowed.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to serialize event {event_type}: {source}")]
    Serialization {
        event_type: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("broker unavailable: {0}")]
    Broker(#[from] BrokerError),

    #[error("publish timed out after {0:?}")]
    Timeout(Duration),
}

/// A message body that does not match the event schema.
///
/// Not retryable: redelivering the same bytes cannot fix it.
#[derive(Debug, Error)]
#[error("failed to decode {event_type}: {source}")]
pub struct MessageDecodeError {
    pub event_type: &'static str,
    #[source]
    pub source: serde_json::Error,
}
