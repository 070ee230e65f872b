use anyhow::Context;
use tracing::{info, warn};

use userhub_events::topology::WELCOME_EMAIL_QUEUE;
use userhub_events::{EventConsumer, Topology, TopologyDeclarer, UserCreated};
use userhub_infra::NotifierConfig;
use userhub_infra::broker::AmqpBroker;
use userhub_infra::email::SmtpEmailSender;
use userhub_notifier::{SendWelcomeEmail, delivery_policy};

const CONSUMER_TAG: &str = "userhub-notifier";
const PREFETCH: u16 = 1;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            return Err(err).context("failed to load .env");
        }
    }
    userhub_observability::init();

    let config = NotifierConfig::from_env().context("invalid configuration")?;
    info!(?config, "starting notification service");

    let topology = Topology::welcome_email();
    let queue = topology
        .queue(WELCOME_EMAIL_QUEUE)
        .context("welcome queue missing from topology")?;
    let policy = delivery_policy(config.max_delivery_attempts, queue)
        .context("invalid NOTIFIER_MAX_DELIVERY_ATTEMPTS")?;

    let broker = AmqpBroker::connect(&config.rabbitmq_url)
        .await
        .context("failed to connect to broker")?;
    broker
        .declare(&topology)
        .await
        .context("failed to declare broker topology")?;

    let sender = SmtpEmailSender::new(&config.smtp).context("invalid SMTP settings")?;

    let stream = broker
        .consume(WELCOME_EMAIL_QUEUE, CONSUMER_TAG, PREFETCH)
        .await
        .context("failed to start consuming")?;
    let consumer: EventConsumer<UserCreated, _> =
        EventConsumer::new(SendWelcomeEmail::new(sender)).with_policy(policy);
    let handle = consumer.spawn(stream);
    info!(queue = WELCOME_EMAIL_QUEUE, "waiting for messages");

    let shutdown = handle.shutdown_token();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            return;
        }
        info!("shutdown requested");
        shutdown.cancel();
    });

    // Ends on ctrl-c or when the broker closes the consumer.
    let exit = handle.join().await;
    let stats = exit.stats;
    info!(
        reason = %exit.reason,
        acknowledged = stats.acknowledged,
        discarded = stats.discarded,
        requeued = stats.requeued,
        settle_failures = stats.settle_failures,
        "consumer stopped"
    );

    if let Err(err) = broker.close().await {
        warn!(error = %err, "broker close failed");
    }
    if !exit.reason.is_requested() {
        anyhow::bail!("consumer stopped unexpectedly: {}", exit.reason);
    }
    Ok(())
}
