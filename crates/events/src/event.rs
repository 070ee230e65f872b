use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{MessageDecodeError, PublishError};

/// An integration event carried over the broker.
///
/// Events are:
/// - **immutable** (treat them as facts)
/// - encoded as JSON; field names are part of the wire contract
/// - routed by a fixed routing key
pub trait Event: Serialize + DeserializeOwned + Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name (used in logs).
    const EVENT_TYPE: &'static str;

    /// Routing key the publisher uses on the topic exchange.
    const ROUTING_KEY: &'static str;

    fn encode(&self) -> Result<Vec<u8>, PublishError> {
        serde_json::to_vec(self).map_err(|source| PublishError::Serialization {
            event_type: Self::EVENT_TYPE,
            source,
        })
    }

    fn decode(body: &[u8]) -> Result<Self, MessageDecodeError> {
        serde_json::from_slice(body).map_err(|source| MessageDecodeError {
            event_type: Self::EVENT_TYPE,
            source,
        })
    }
}
