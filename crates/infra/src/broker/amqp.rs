//! RabbitMQ adapter built on `lapin`.
//!
//! - publishes with publisher confirms, so `publish` returns once the broker
//!   has taken responsibility for the message
//! - consumes with manual acknowledgment on a dedicated channel with prefetch 1

use async_trait::async_trait;
use lapin::acker::Acker;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
    BasicRejectOptions, ConfirmSelectOptions, ExchangeDeclareOptions, QueueBindOptions,
    QueueDeclareOptions,
};
use lapin::publisher_confirm::Confirmation;
use lapin::types::{AMQPValue, FieldTable, LongString, ShortString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer};
use tokio_stream::StreamExt;
use tracing::{debug, info, instrument};

use userhub_events::{
    Acknowledge, BrokerError, Delivery, DeliveryMeta, DeliveryStream, ExchangeKind,
    MessagePublisher, OutboundMessage, QueueSpec, Topology, TopologyDeclarer,
};

/// Header RabbitMQ quorum queues set on redelivered messages.
const DELIVERY_COUNT_HEADER: &str = "x-delivery-count";

const QUEUE_TYPE_ARGUMENT: &str = "x-queue-type";

const PERSISTENT: u8 = 2;

/// One AMQP connection plus a confirm-mode channel for publishing.
pub struct AmqpBroker {
    connection: Connection,
    channel: Channel,
}

impl AmqpBroker {
    #[instrument(skip(url), err)]
    pub async fn connect(url: &str) -> Result<Self, BrokerError> {
        let connection = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(connection_error)?;
        let channel = connection.create_channel().await.map_err(channel_error)?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(channel_error)?;

        info!("connected to broker");
        Ok(Self { connection, channel })
    }

    /// Open a consumer on its own channel.
    pub async fn consume(
        &self,
        queue: &str,
        consumer_tag: &str,
        prefetch: u16,
    ) -> Result<AmqpDeliveryStream, BrokerError> {
        let channel = self.connection.create_channel().await.map_err(channel_error)?;
        channel
            .basic_qos(prefetch, BasicQosOptions::default())
            .await
            .map_err(channel_error)?;

        let consumer = channel
            .basic_consume(
                queue,
                consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(channel_error)?;

        info!(queue, consumer_tag, prefetch, "consumer registered");
        Ok(AmqpDeliveryStream { consumer })
    }

    pub async fn close(&self) -> Result<(), BrokerError> {
        self.connection
            .close(200, "shutdown")
            .await
            .map_err(connection_error)
    }
}

fn connection_error(err: lapin::Error) -> BrokerError {
    BrokerError::Connection(err.to_string())
}

fn channel_error(err: lapin::Error) -> BrokerError {
    BrokerError::Channel(err.to_string())
}

fn lapin_kind(kind: ExchangeKind) -> lapin::ExchangeKind {
    match kind {
        ExchangeKind::Topic => lapin::ExchangeKind::Topic,
        ExchangeKind::Direct => lapin::ExchangeKind::Direct,
        ExchangeKind::Fanout => lapin::ExchangeKind::Fanout,
    }
}

#[async_trait]
impl TopologyDeclarer for AmqpBroker {
    #[instrument(skip(self, topology), fields(exchange = %topology.exchange.name), err)]
    async fn declare(&self, topology: &Topology) -> Result<(), BrokerError> {
        let exchange = &topology.exchange;
        self.channel
            .exchange_declare(
                &exchange.name,
                lapin_kind(exchange.kind),
                ExchangeDeclareOptions {
                    durable: exchange.durable,
                    ..ExchangeDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(channel_error)?;

        for queue in &topology.queues {
            self.channel
                .queue_declare(
                    &queue.name,
                    QueueDeclareOptions {
                        durable: queue.durable,
                        ..QueueDeclareOptions::default()
                    },
                    queue_arguments(queue),
                )
                .await
                .map_err(channel_error)?;

            self.channel
                .queue_bind(
                    &queue.name,
                    &exchange.name,
                    &queue.binding_key,
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await
                .map_err(channel_error)?;

            debug!(queue = %queue.name, binding_key = %queue.binding_key, "queue bound");
        }
        Ok(())
    }
}

#[async_trait]
impl MessagePublisher for AmqpBroker {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        message: OutboundMessage,
    ) -> Result<(), BrokerError> {
        let mut properties = BasicProperties::default().with_content_type(message.content_type.into());
        if message.persistent {
            properties = properties.with_delivery_mode(PERSISTENT);
        }

        let confirm = self
            .channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                &message.body,
                properties,
            )
            .await
            .map_err(channel_error)?;

        match confirm.await.map_err(channel_error)? {
            Confirmation::Nack(_) => Err(BrokerError::Nacked(format!(
                "{exchange}/{routing_key}"
            ))),
            _ => Ok(()),
        }
    }
}

fn queue_arguments(queue: &QueueSpec) -> FieldTable {
    let mut arguments = FieldTable::default();
    arguments.insert(
        ShortString::from(QUEUE_TYPE_ARGUMENT),
        AMQPValue::LongString(LongString::from(queue.queue_type.as_str())),
    );
    arguments
}

/// Deliveries from one `basic_consume` subscription.
pub struct AmqpDeliveryStream {
    consumer: Consumer,
}

#[async_trait]
impl DeliveryStream for AmqpDeliveryStream {
    async fn next_delivery(&mut self) -> Option<Result<Delivery, BrokerError>> {
        let delivery = match self.consumer.next().await? {
            Ok(delivery) => delivery,
            Err(err) => return Some(Err(channel_error(err))),
        };

        let meta = DeliveryMeta {
            delivery_tag: delivery.delivery_tag,
            redelivered: delivery.redelivered,
            attempt: attempt_number(delivery.redelivered, delivery.properties.headers().as_ref()),
            routing_key: delivery.routing_key.as_str().to_string(),
        };
        let acker = AmqpAcker {
            acker: delivery.acker,
        };
        Some(Ok(Delivery::new(meta, delivery.data, Box::new(acker))))
    }
}

/// 1-based attempt number, if the broker lets us know it.
///
/// Quorum queues count previous deliveries in `x-delivery-count`; classic
/// queues only flag redelivery, which leaves the count unknown.
fn attempt_number(redelivered: bool, headers: Option<&FieldTable>) -> Option<u32> {
    let previous = headers.and_then(|table| {
        table
            .inner()
            .iter()
            .find(|(key, _)| key.as_str() == DELIVERY_COUNT_HEADER)
            .and_then(|(_, value)| as_count(value))
    });

    match previous {
        Some(count) => Some(count.saturating_add(1)),
        None if !redelivered => Some(1),
        None => None,
    }
}

fn as_count(value: &AMQPValue) -> Option<u32> {
    let count: i64 = match value {
        AMQPValue::ShortShortInt(v) => (*v).into(),
        AMQPValue::ShortShortUInt(v) => (*v).into(),
        AMQPValue::ShortInt(v) => (*v).into(),
        AMQPValue::ShortUInt(v) => (*v).into(),
        AMQPValue::LongInt(v) => (*v).into(),
        AMQPValue::LongUInt(v) => (*v).into(),
        AMQPValue::LongLongInt(v) => *v,
        _ => return None,
    };
    u32::try_from(count).ok()
}

struct AmqpAcker {
    acker: Acker,
}

#[async_trait]
impl Acknowledge for AmqpAcker {
    async fn ack(&self) -> Result<(), BrokerError> {
        self.acker
            .ack(BasicAckOptions::default())
            .await
            .map_err(channel_error)
    }

    async fn reject(&self, requeue: bool) -> Result<(), BrokerError> {
        self.acker
            .reject(BasicRejectOptions { requeue })
            .await
            .map_err(channel_error)
    }
}
