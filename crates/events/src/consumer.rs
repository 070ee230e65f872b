//! Receive loop: decode, handle, acknowledge.
//!
//! Messages are processed one at a time in delivery order. Each one ends in a
//! single [`MessageState`]:
//!
//! - `Received → Decoded → Processed → Acknowledged`
//! - `Received → DecodeFailed → Discarded`
//! - `Received → ProcessingFailed → Requeued` (or `Discarded` once a retry cap is hit)
//!
//! Delivery is at-least-once; handlers must be safe to run twice for the same event.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::ack::{AckDecision, AckPolicy, Outcome};
use crate::broker::{Delivery, DeliveryStream};
use crate::{BrokerError, Event};

/// Side effect triggered by one decoded event.
#[async_trait]
pub trait EventHandler<E: Event>: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn handle(&self, event: &E) -> Result<(), Self::Error>;
}

#[async_trait]
impl<E, H> EventHandler<E> for Arc<H>
where
    E: Event,
    H: EventHandler<E> + ?Sized,
{
    type Error = H::Error;

    async fn handle(&self, event: &E) -> Result<(), Self::Error> {
        (**self).handle(event).await
    }
}

/// Final state of a message after the consumer settled it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageState {
    Acknowledged,
    Discarded,
    Requeued,
}

impl MessageState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageState::Acknowledged => "acknowledged",
            MessageState::Discarded => "discarded",
            MessageState::Requeued => "requeued",
        }
    }
}

/// Counters returned when the loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub acknowledged: u64,
    pub discarded: u64,
    pub requeued: u64,
    /// Ack/reject calls the broker refused.
    pub settle_failures: u64,
}

/// Why the receive loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The shutdown token was cancelled.
    Cancelled,
    /// The broker closed the subscription.
    StreamClosed,
    /// The subscription failed (e.g. the channel or connection dropped).
    StreamFailed(BrokerError),
    /// The consumer task panicked or was aborted.
    TaskFailed(String),
}

impl StopReason {
    /// Only a requested shutdown counts as a clean stop.
    pub fn is_requested(&self) -> bool {
        matches!(self, StopReason::Cancelled)
    }
}

impl core::fmt::Display for StopReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            StopReason::Cancelled => f.write_str("shutdown requested"),
            StopReason::StreamClosed => f.write_str("delivery stream closed"),
            StopReason::StreamFailed(err) => write!(f, "delivery stream failed: {err}"),
            StopReason::TaskFailed(reason) => write!(f, "consumer task failed: {reason}"),
        }
    }
}

/// Result of a finished receive loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerExit {
    pub reason: StopReason,
    pub stats: ConsumerStats,
}

impl ConsumerStats {
    fn record(&mut self, state: MessageState) {
        match state {
            MessageState::Acknowledged => self.acknowledged += 1,
            MessageState::Discarded => self.discarded += 1,
            MessageState::Requeued => self.requeued += 1,
        }
    }
}

pub struct EventConsumer<E, H> {
    handler: H,
    policy: AckPolicy,
    _event: PhantomData<fn() -> E>,
}

impl<E, H> EventConsumer<E, H>
where
    E: Event,
    H: EventHandler<E>,
{
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            policy: AckPolicy::default(),
            _event: PhantomData,
        }
    }

    pub fn with_policy(mut self, policy: AckPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> AckPolicy {
        self.policy
    }

    /// Decode, run the handler, then settle the delivery with the broker.
    ///
    /// Errors only when the ack/reject itself fails; the message is then left
    /// for the broker to redeliver.
    #[instrument(
        skip(self, delivery),
        fields(
            event_type = E::EVENT_TYPE,
            delivery_tag = delivery.meta.delivery_tag,
            redelivered = delivery.meta.redelivered,
            routing_key = %delivery.meta.routing_key,
        )
    )]
    pub async fn handle_delivery(&self, delivery: &Delivery) -> Result<MessageState, BrokerError> {
        let outcome = match E::decode(&delivery.body) {
            Err(err) => {
                warn!(error = %err, "discarding undecodable message");
                Outcome::DecodeFailed
            }
            Ok(event) => match self.handler.handle(&event).await {
                Ok(()) => Outcome::Processed,
                Err(err) => {
                    error!(error = %err, "event handler failed");
                    Outcome::ProcessingFailed
                }
            },
        };

        let state = match self.policy.decide(outcome, &delivery.meta) {
            AckDecision::Ack => {
                delivery.ack().await?;
                MessageState::Acknowledged
            }
            AckDecision::Reject { requeue: true } => {
                delivery.reject(true).await?;
                MessageState::Requeued
            }
            AckDecision::Reject { requeue: false } => {
                if outcome == Outcome::ProcessingFailed {
                    warn!(attempt = ?delivery.meta.attempt, "retry cap reached; not requeueing");
                }
                delivery.reject(false).await?;
                MessageState::Discarded
            }
        };

        debug!(state = state.as_str(), "message settled");
        Ok(state)
    }

    /// Drain `stream` until it ends or `shutdown` is cancelled.
    ///
    /// A message already being handled is settled before the loop exits.
    pub async fn run<S>(&self, mut stream: S, shutdown: CancellationToken) -> ConsumerExit
    where
        S: DeliveryStream,
    {
        let mut stats = ConsumerStats::default();

        let reason = loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!(event_type = E::EVENT_TYPE, "consumer shutdown requested");
                    break StopReason::Cancelled;
                }
                next = stream.next_delivery() => next,
            };

            let delivery = match next {
                None => {
                    warn!(event_type = E::EVENT_TYPE, "delivery stream closed");
                    break StopReason::StreamClosed;
                }
                Some(Err(err)) => {
                    error!(error = %err, "consumer stream failed");
                    break StopReason::StreamFailed(err);
                }
                Some(Ok(delivery)) => delivery,
            };

            match self.handle_delivery(&delivery).await {
                Ok(state) => stats.record(state),
                Err(err) => {
                    error!(
                        error = %err,
                        delivery_tag = delivery.meta.delivery_tag,
                        "failed to settle delivery"
                    );
                    stats.settle_failures += 1;
                }
            }
        };

        ConsumerExit { reason, stats }
    }
}

impl<E, H> EventConsumer<E, H>
where
    E: Event,
    H: EventHandler<E> + 'static,
{
    /// Run the loop on its own task.
    pub fn spawn<S>(self, stream: S) -> ConsumerHandle
    where
        S: DeliveryStream + 'static,
    {
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let join = tokio::spawn(async move { self.run(stream, token).await });

        ConsumerHandle { shutdown, join }
    }
}

/// Handle to stop and join a spawned consumer.
#[derive(Debug)]
pub struct ConsumerHandle {
    shutdown: CancellationToken,
    join: JoinHandle<ConsumerExit>,
}

impl ConsumerHandle {
    /// Token that stops the loop when cancelled (e.g. from a signal handler).
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Request graceful shutdown and wait for the loop to stop.
    pub async fn shutdown(self) -> ConsumerExit {
        self.shutdown.cancel();
        self.join().await
    }

    /// Wait for the loop to stop on its own (stream closed or token cancelled).
    pub async fn join(self) -> ConsumerExit {
        match self.join.await {
            Ok(exit) => exit,
            Err(err) => {
                error!(error = %err, "consumer task failed");
                ConsumerExit {
                    reason: StopReason::TaskFailed(err.to_string()),
                    stats: ConsumerStats::default(),
                }
            }
        }
    }
}
