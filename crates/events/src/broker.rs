//! Broker abstraction (mechanics only).
//!
//! The event pipeline talks to the message broker through these contracts so
//! the publish path, the consume loop and the acknowledgment policy can be
//! exercised against [`crate::InMemoryBroker`] and run against AMQP in
//! production (`userhub-infra`, `amqp` feature).
//!
//! ## Delivery model
//!
//! - **Topic routing**: publishers name an exchange and a routing key; the
//!   broker copies the message to every queue whose binding key matches.
//!   Unroutable messages are dropped (non-mandatory publish).
//! - **Manual acknowledgment**: each [`Delivery`] must be acked or rejected
//!   exactly once by its consumer. A rejected message is either requeued for
//!   redelivery or discarded.
//! - **At-least-once**: a message may be delivered more than once, and a
//!   requeued message may arrive after newer ones. Handlers must tolerate both.

use std::sync::Arc;

use async_trait::async_trait;

use crate::BrokerError;
use crate::topology::Topology;

/// A message on its way to the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub body: Vec<u8>,
    pub content_type: &'static str,
    /// Survive a broker restart once queued.
    pub persistent: bool,
}

impl OutboundMessage {
    pub fn json(body: Vec<u8>) -> Self {
        Self {
            body,
            content_type: "application/json",
            persistent: true,
        }
    }
}

/// Publishing side of the broker.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        message: OutboundMessage,
    ) -> Result<(), BrokerError>;
}

#[async_trait]
impl<P> MessagePublisher for Arc<P>
where
    P: MessagePublisher + ?Sized,
{
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        message: OutboundMessage,
    ) -> Result<(), BrokerError> {
        (**self).publish(exchange, routing_key, message).await
    }
}

/// Declares exchanges, queues and bindings.
///
/// Call once at startup, before publishing or consuming.
#[async_trait]
pub trait TopologyDeclarer: Send + Sync {
    async fn declare(&self, topology: &Topology) -> Result<(), BrokerError>;
}

/// Settles a single delivery with the broker.
#[async_trait]
pub trait Acknowledge: Send + Sync {
    /// Positive acknowledgment of this delivery only (never multiple).
    async fn ack(&self) -> Result<(), BrokerError>;

    /// Negative acknowledgment; `requeue = false` removes the message for good
    /// (or dead-letters it, if the broker is configured to).
    async fn reject(&self, requeue: bool) -> Result<(), BrokerError>;
}

/// Broker metadata attached to a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryMeta {
    pub delivery_tag: u64,
    /// Set when the broker has delivered this message before.
    pub redelivered: bool,
    /// 1-based attempt number, when the broker tracks it.
    pub attempt: Option<u32>,
    pub routing_key: String,
}

/// A message received from a queue, plus the handle to settle it.
pub struct Delivery {
    pub meta: DeliveryMeta,
    pub body: Vec<u8>,
    acker: Box<dyn Acknowledge>,
}

impl Delivery {
    pub fn new(meta: DeliveryMeta, body: Vec<u8>, acker: Box<dyn Acknowledge>) -> Self {
        Self { meta, body, acker }
    }

    pub async fn ack(&self) -> Result<(), BrokerError> {
        self.acker.ack().await
    }

    pub async fn reject(&self, requeue: bool) -> Result<(), BrokerError> {
        self.acker.reject(requeue).await
    }
}

impl core::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Delivery")
            .field("meta", &self.meta)
            .field("body_len", &self.body.len())
            .finish_non_exhaustive()
    }
}

/// Source of deliveries for one consumer.
///
/// Returns `None` once the underlying subscription is closed.
#[async_trait]
pub trait DeliveryStream: Send {
    async fn next_delivery(&mut self) -> Option<Result<Delivery, BrokerError>>;
}
