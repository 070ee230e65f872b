//! Message broker adapters.
//!
//! Tests and local runs use `userhub_events::InMemoryBroker`; production runs
//! against RabbitMQ through [`amqp::AmqpBroker`].

#[cfg(feature = "amqp")]
pub mod amqp;

#[cfg(feature = "amqp")]
pub use amqp::{AmqpBroker, AmqpDeliveryStream};
