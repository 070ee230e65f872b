use std::time::Duration;

use tracing::{debug, instrument};

use crate::broker::{MessagePublisher, OutboundMessage};
use crate::topology::USER_EVENTS_EXCHANGE;
use crate::{Event, PublishError};

/// Default bound on a single publish, broker confirm included.
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// Serializes events and publishes them persistently to one exchange.
#[derive(Debug, Clone)]
pub struct EventPublisher<P> {
    broker: P,
    exchange: String,
    timeout: Duration,
}

impl<P> EventPublisher<P>
where
    P: MessagePublisher,
{
    /// Publisher for the `user_events` exchange.
    pub fn new(broker: P) -> Self {
        Self::for_exchange(broker, USER_EVENTS_EXCHANGE)
    }

    pub fn for_exchange(broker: P, exchange: impl Into<String>) -> Self {
        Self {
            broker,
            exchange: exchange.into(),
            timeout: DEFAULT_PUBLISH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// Publish `event` under its routing key.
    ///
    /// Returns once the broker has accepted the message. Nothing is retried here.
    #[instrument(
        skip(self, event),
        fields(exchange = %self.exchange, event_type = E::EVENT_TYPE, routing_key = E::ROUTING_KEY),
        err
    )]
    pub async fn publish<E: Event>(&self, event: &E) -> Result<(), PublishError> {
        let body = event.encode()?;
        let send = self
            .broker
            .publish(&self.exchange, E::ROUTING_KEY, OutboundMessage::json(body));

        tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| PublishError::Timeout(self.timeout))??;

        debug!("event published");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use userhub_core::UserId;

    use super::*;
    use crate::topology::{Topology, WELCOME_EMAIL_QUEUE};
    use crate::{BrokerError, InMemoryBroker, TopologyDeclarer, UserCreated};

    fn ada() -> UserCreated {
        UserCreated {
            id: UserId::new(42),
            name: "Ada".to_string(),
            email: "ada@x.com".to_string(),
        }
    }

    #[tokio::test]
    async fn publishes_persistent_json_under_routing_key() {
        let broker = InMemoryBroker::new();
        broker.declare(&Topology::welcome_email()).await.unwrap();
        let publisher = EventPublisher::new(broker.clone());

        publisher.publish(&ada()).await.unwrap();

        let published = broker.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].exchange, "user_events");
        assert_eq!(published[0].routing_key, "user.created");
        assert_eq!(published[0].message.content_type, "application/json");
        assert!(published[0].message.persistent);
        assert_eq!(UserCreated::decode(&published[0].message.body).unwrap(), ada());
        assert_eq!(broker.ready_len(WELCOME_EMAIL_QUEUE), 1);
    }

    #[tokio::test]
    async fn missing_exchange_surfaces_as_broker_error() {
        let publisher = EventPublisher::new(InMemoryBroker::new());
        let err = publisher.publish(&ada()).await.unwrap_err();
        assert!(matches!(
            err,
            PublishError::Broker(BrokerError::ExchangeNotFound(_))
        ));
    }

    struct Stalled;

    #[async_trait]
    impl MessagePublisher for Stalled {
        async fn publish(&self, _: &str, _: &str, _: OutboundMessage) -> Result<(), BrokerError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_broker_times_out() {
        let publisher = EventPublisher::new(Stalled).with_timeout(Duration::from_millis(50));
        let err = publisher.publish(&ada()).await.unwrap_err();
        assert!(matches!(err, PublishError::Timeout(d) if d == Duration::from_millis(50)));
    }
}
