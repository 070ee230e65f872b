//! Maps the outcome of handling one message to an acknowledgment.
//!
//! | Outcome            | Decision                          |
//! |--------------------|-----------------------------------|
//! | `Processed`        | ack                               |
//! | `DecodeFailed`     | reject, no requeue (poison)       |
//! | `ProcessingFailed` | reject, requeue (until the cap)   |
//!
//! Without a cap a persistently failing message is redelivered indefinitely.

use std::num::NonZeroU32;

use crate::broker::DeliveryMeta;

/// What happened to a single delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Processed,
    /// Body could not be decoded into the event type.
    DecodeFailed,
    /// Decoded, but the side effect failed.
    ProcessingFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckDecision {
    Ack,
    Reject { requeue: bool },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AckPolicy {
    max_attempts: Option<NonZeroU32>,
}

impl AckPolicy {
    /// Requeue failures indefinitely.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Stop requeueing once a delivery has been attempted `max` times.
    ///
    /// Only effective when the broker reports an attempt number.
    pub fn with_max_attempts(max: NonZeroU32) -> Self {
        Self {
            max_attempts: Some(max),
        }
    }

    pub fn max_attempts(&self) -> Option<NonZeroU32> {
        self.max_attempts
    }

    pub fn decide(&self, outcome: Outcome, meta: &DeliveryMeta) -> AckDecision {
        match outcome {
            Outcome::Processed => AckDecision::Ack,
            Outcome::DecodeFailed => AckDecision::Reject { requeue: false },
            Outcome::ProcessingFailed => {
                let exhausted = match (self.max_attempts, meta.attempt) {
                    (Some(max), Some(attempt)) => attempt >= max.get(),
                    _ => false,
                };
                AckDecision::Reject { requeue: !exhausted }
            }
        }
    }
}
