use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use userhub_api::app::{AppServices, build_app};
use userhub_auth::Role;
use userhub_auth::roles::ADMIN;
use userhub_events::{MessagePublisher, Topology, TopologyDeclarer};
use userhub_infra::broker::AmqpBroker;
use userhub_infra::{AppConfig, InMemoryUserStore, NewUser, UserStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            return Err(err).context("failed to load .env");
        }
    }
    userhub_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    info!(?config, "starting user service");

    let broker = Arc::new(
        AmqpBroker::connect(&config.rabbitmq_url)
            .await
            .context("failed to connect to broker")?,
    );
    broker
        .declare(&Topology::user_events_exchange())
        .await
        .context("failed to declare broker topology")?;

    let store: Arc<dyn UserStore> = Arc::new(InMemoryUserStore::new());
    let publisher: Arc<dyn MessagePublisher> = broker.clone();
    let services = AppServices::from_config(&config, publisher, store)
        .context("failed to configure token maker")?;

    if let Some(admin) = &config.bootstrap_admin {
        let user = services
            .users
            .ensure_user(NewUser {
                name: "Administrator".to_string(),
                email: admin.email.clone(),
                password: admin.password.clone(),
                roles: vec![Role::from(ADMIN)],
            })
            .await
            .context("failed to seed admin account")?;
        info!(user_id = %user.id, "admin account ready");
    } else {
        warn!("ADMIN_EMAIL not set; /user routes are unreachable until an admin exists");
    }

    let app = build_app(services);
    let listener = tokio::net::TcpListener::bind(config.http_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.http_addr))?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Err(err) = broker.close().await {
        warn!(error = %err, "broker close failed");
    }
    info!("user service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
