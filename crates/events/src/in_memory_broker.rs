//! In-memory broker for tests/dev.
//!
//! Mirrors the parts of AMQP the pipeline relies on: durable topic exchanges,
//! queues bound by key, manual ack/reject with requeue, and redelivery flags.
//! Nothing survives the process.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::BrokerError;
use crate::broker::{
    Acknowledge, Delivery, DeliveryMeta, DeliveryStream, MessagePublisher, OutboundMessage,
    TopologyDeclarer,
};
use crate::topology::{ExchangeKind, Topology, topic_matches};

/// A message as it was handed to [`InMemoryBroker::publish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub exchange: String,
    pub routing_key: String,
    pub message: OutboundMessage,
}

#[derive(Debug, Clone)]
struct Queued {
    body: Vec<u8>,
    routing_key: String,
    redelivered: bool,
    attempt: u32,
}

#[derive(Debug)]
struct ExchangeState {
    kind: ExchangeKind,
    bindings: Vec<(String, String)>,
}

#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<Queued>,
    unacked: HashMap<u64, Queued>,
    discarded: Vec<Vec<u8>>,
    closed: bool,
    notify: Arc<Notify>,
}

#[derive(Debug, Default)]
struct State {
    exchanges: HashMap<String, ExchangeState>,
    queues: HashMap<String, QueueState>,
    published: Vec<PublishedMessage>,
    next_tag: u64,
    unavailable: bool,
}

#[derive(Debug, Default)]
struct Inner {
    state: Mutex<State>,
}

impl Inner {
    fn lock(&self) -> Result<MutexGuard<'_, State>, BrokerError> {
        self.state
            .lock()
            .map_err(|_| BrokerError::Channel("in-memory broker lock poisoned".to_string()))
    }
}

/// Shared handle; clones see the same exchanges and queues.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBroker {
    inner: Arc<Inner>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent publish fail with a connection error (or stop doing so).
    pub fn set_unavailable(&self, unavailable: bool) {
        if let Ok(mut state) = self.inner.lock() {
            state.unavailable = unavailable;
        }
    }

    /// Start consuming from a declared queue.
    pub fn consume(&self, queue: &str) -> Result<InMemoryDeliveryStream, BrokerError> {
        let state = self.inner.lock()?;
        let notify = state
            .queues
            .get(queue)
            .map(|q| Arc::clone(&q.notify))
            .ok_or_else(|| BrokerError::QueueNotFound(queue.to_string()))?;

        Ok(InMemoryDeliveryStream {
            inner: Arc::clone(&self.inner),
            queue: queue.to_string(),
            notify,
        })
    }

    /// Close every queue: streams drain what is ready, then end.
    pub fn close(&self) {
        if let Ok(mut state) = self.inner.lock() {
            for queue in state.queues.values_mut() {
                queue.closed = true;
                queue.notify.notify_one();
            }
        }
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        match self.inner.lock() {
            Ok(state) => state.published.clone(),
            Err(_) => Vec::new(),
        }
    }

    pub fn ready_len(&self, queue: &str) -> usize {
        self.with_queue(queue, |q| q.ready.len())
    }

    pub fn unacked_len(&self, queue: &str) -> usize {
        self.with_queue(queue, |q| q.unacked.len())
    }

    /// Bodies rejected without requeue.
    pub fn discarded(&self, queue: &str) -> Vec<Vec<u8>> {
        self.with_queue(queue, |q| q.discarded.clone())
    }

    /// Enqueue a raw body directly, bypassing exchange routing.
    pub fn inject(&self, queue: &str, routing_key: &str, body: Vec<u8>) -> Result<(), BrokerError> {
        let mut state = self.inner.lock()?;
        let q = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| BrokerError::QueueNotFound(queue.to_string()))?;
        q.ready.push_back(Queued {
            body,
            routing_key: routing_key.to_string(),
            redelivered: false,
            attempt: 1,
        });
        q.notify.notify_one();
        Ok(())
    }

    fn with_queue<T: Default>(&self, queue: &str, f: impl FnOnce(&QueueState) -> T) -> T {
        let Ok(state) = self.inner.lock() else {
            return T::default();
        };
        let value = state.queues.get(queue).map(f).unwrap_or_default();
        value
    }
}

fn routes(kind: ExchangeKind, binding_key: &str, routing_key: &str) -> bool {
    match kind {
        ExchangeKind::Topic => topic_matches(binding_key, routing_key),
        ExchangeKind::Direct => binding_key == routing_key,
        ExchangeKind::Fanout => true,
    }
}

#[async_trait]
impl MessagePublisher for InMemoryBroker {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        message: OutboundMessage,
    ) -> Result<(), BrokerError> {
        let mut state = self.inner.lock()?;
        if state.unavailable {
            return Err(BrokerError::Connection("broker unavailable".to_string()));
        }

        let targets: Vec<String> = {
            let ex = state
                .exchanges
                .get(exchange)
                .ok_or_else(|| BrokerError::ExchangeNotFound(exchange.to_string()))?;
            ex.bindings
                .iter()
                .filter(|(_, key)| routes(ex.kind, key, routing_key))
                .map(|(queue, _)| queue.clone())
                .collect()
        };

        for name in targets {
            if let Some(queue) = state.queues.get_mut(&name) {
                queue.ready.push_back(Queued {
                    body: message.body.clone(),
                    routing_key: routing_key.to_string(),
                    redelivered: false,
                    attempt: 1,
                });
                queue.notify.notify_one();
            }
        }

        state.published.push(PublishedMessage {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            message,
        });
        Ok(())
    }
}

#[async_trait]
impl TopologyDeclarer for InMemoryBroker {
    async fn declare(&self, topology: &Topology) -> Result<(), BrokerError> {
        let mut state = self.inner.lock()?;
        let wanted = &topology.exchange;

        if let Some(existing) = state.exchanges.get(&wanted.name) {
            if existing.kind != wanted.kind {
                return Err(BrokerError::Channel(format!(
                    "exchange {} redeclared with a different kind",
                    wanted.name
                )));
            }
        } else {
            state.exchanges.insert(
                wanted.name.clone(),
                ExchangeState {
                    kind: wanted.kind,
                    bindings: Vec::new(),
                },
            );
        }

        for queue in &topology.queues {
            state.queues.entry(queue.name.clone()).or_default();

            if let Some(ex) = state.exchanges.get_mut(&wanted.name) {
                let binding = (queue.name.clone(), queue.binding_key.clone());
                if !ex.bindings.contains(&binding) {
                    ex.bindings.push(binding);
                }
            }
        }
        Ok(())
    }
}

/// Deliveries from one in-memory queue.
pub struct InMemoryDeliveryStream {
    inner: Arc<Inner>,
    queue: String,
    notify: Arc<Notify>,
}

#[async_trait]
impl DeliveryStream for InMemoryDeliveryStream {
    async fn next_delivery(&mut self) -> Option<Result<Delivery, BrokerError>> {
        loop {
            {
                let mut state = match self.inner.lock() {
                    Ok(state) => state,
                    Err(err) => return Some(Err(err)),
                };
                state.next_tag += 1;
                let tag = state.next_tag;

                let queue = match state.queues.get_mut(&self.queue) {
                    Some(queue) => queue,
                    None => return Some(Err(BrokerError::QueueNotFound(self.queue.clone()))),
                };

                if let Some(message) = queue.ready.pop_front() {
                    let meta = DeliveryMeta {
                        delivery_tag: tag,
                        redelivered: message.redelivered,
                        attempt: Some(message.attempt),
                        routing_key: message.routing_key.clone(),
                    };
                    let body = message.body.clone();
                    queue.unacked.insert(tag, message);

                    let acker = InMemoryAcker {
                        inner: Arc::clone(&self.inner),
                        queue: self.queue.clone(),
                        tag,
                    };
                    return Some(Ok(Delivery::new(meta, body, Box::new(acker))));
                }

                if queue.closed {
                    return None;
                }
            }

            // `notify_one` stores a permit, so a publish between the check and here is not lost.
            self.notify.notified().await;
        }
    }
}

struct InMemoryAcker {
    inner: Arc<Inner>,
    queue: String,
    tag: u64,
}

impl InMemoryAcker {
    fn settle(&self, requeue: Option<bool>) -> Result<(), BrokerError> {
        let mut state = self.inner.lock()?;
        let queue = state
            .queues
            .get_mut(&self.queue)
            .ok_or_else(|| BrokerError::QueueNotFound(self.queue.clone()))?;
        let mut message = queue
            .unacked
            .remove(&self.tag)
            .ok_or(BrokerError::UnknownDeliveryTag(self.tag))?;

        match requeue {
            None => {}
            Some(true) => {
                message.redelivered = true;
                message.attempt = message.attempt.saturating_add(1);
                queue.ready.push_front(message);
                queue.notify.notify_one();
            }
            Some(false) => queue.discarded.push(message.body),
        }
        Ok(())
    }
}

#[async_trait]
impl Acknowledge for InMemoryAcker {
    async fn ack(&self) -> Result<(), BrokerError> {
        self.settle(None)
    }

    async fn reject(&self, requeue: bool) -> Result<(), BrokerError> {
        self.settle(Some(requeue))
    }
}
