//! Broker topology shared by the publishing and consuming services.
//!
//! Declared once at startup, before any message traffic, by each service that
//! touches the broker. Declarations are idempotent on the broker side.

/// Durable topic exchange carrying user lifecycle events.
pub const USER_EVENTS_EXCHANGE: &str = "user_events";

/// Durable queue drained by the welcome-email consumer.
pub const WELCOME_EMAIL_QUEUE: &str = "welcome_email_queue";

/// Routing key of `UserCreated`, also the binding key of the welcome queue.
pub const USER_CREATED_ROUTING_KEY: &str = "user.created";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKind {
    Topic,
    Direct,
    Fanout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeSpec {
    pub name: String,
    pub kind: ExchangeKind,
    pub durable: bool,
}

/// Queue implementation requested at declaration (`x-queue-type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueType {
    Classic,
    /// Replicated queue; redeliveries carry an `x-delivery-count` header.
    Quorum,
}

impl QueueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueType::Classic => "classic",
            QueueType::Quorum => "quorum",
        }
    }

    /// Whether the broker reports how often a message was delivered, which
    /// a retry cap needs.
    pub fn counts_deliveries(&self) -> bool {
        matches!(self, QueueType::Quorum)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSpec {
    pub name: String,
    pub durable: bool,
    pub queue_type: QueueType,
    /// Binding key used to bind the queue to the exchange.
    pub binding_key: String,
}

/// An exchange plus the queues bound to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub exchange: ExchangeSpec,
    pub queues: Vec<QueueSpec>,
}

impl Topology {
    pub fn queue(&self, name: &str) -> Option<&QueueSpec> {
        self.queues.iter().find(|q| q.name == name)
    }

    /// Exchange only; what the publishing side needs.
    pub fn user_events_exchange() -> Self {
        Self {
            exchange: ExchangeSpec {
                name: USER_EVENTS_EXCHANGE.to_string(),
                kind: ExchangeKind::Topic,
                durable: true,
            },
            queues: Vec::new(),
        }
    }

    /// Exchange plus the welcome-email queue bound on `user.created`.
    ///
    /// The queue is a quorum queue so that redeliveries are counted.
    pub fn welcome_email() -> Self {
        let mut topology = Self::user_events_exchange();
        topology.queues.push(QueueSpec {
            name: WELCOME_EMAIL_QUEUE.to_string(),
            durable: true,
            queue_type: QueueType::Quorum,
            binding_key: USER_CREATED_ROUTING_KEY.to_string(),
        });
        topology
    }
}

/// Match a routing key against a topic binding pattern.
///
/// Words are separated by `.`; `*` matches exactly one word and `#` matches
/// zero or more words.
pub fn topic_matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = routing_key.split('.').collect();
    match_words(&pattern, &key)
}

fn match_words(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => (0..=key.len()).any(|skip| match_words(rest, &key[skip..])),
        Some((&word, rest)) => match key.split_first() {
            Some((&head, tail)) => (word == "*" || word == head) && match_words(rest, tail),
            None => false,
        },
    }
}
