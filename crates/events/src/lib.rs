//! Domain events and the broker plumbing that carries them between services.
//!
//! - `publisher`: serialize + publish on the user-creation path
//! - `consumer`: the receive loop that drives a handler and acknowledges each message
//! - `ack`: outcome → ack / reject / requeue decision
//! - `broker`: transport-agnostic publish/consume contracts (AMQP lives in infra)

pub mod ack;
pub mod broker;
pub mod consumer;
pub mod error;
pub mod event;
pub mod in_memory_broker;
pub mod publisher;
pub mod topology;
pub mod user_created;

pub use ack::{AckDecision, AckPolicy, Outcome};
pub use broker::{Acknowledge, Delivery, DeliveryMeta, DeliveryStream, MessagePublisher, OutboundMessage, TopologyDeclarer};
pub use consumer::{
    ConsumerExit, ConsumerHandle, ConsumerStats, EventConsumer, EventHandler, MessageState,
    StopReason,
};
pub use error::{BrokerError, MessageDecodeError, PublishError};
pub use event::Event;
pub use in_memory_broker::InMemoryBroker;
pub use publisher::EventPublisher;
pub use topology::{ExchangeKind, QueueSpec, QueueType, Topology, topic_matches};
pub use user_created::UserCreated;
