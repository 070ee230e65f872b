use std::sync::Arc;

use userhub_auth::{AuthError, JwtTokenMaker, TokenMaker};
use userhub_events::{EventPublisher, MessagePublisher};
use userhub_infra::{AppConfig, UserStore};

use crate::usecases::UserService;

/// Everything the handlers need, shared behind `Arc`s.
#[derive(Clone)]
pub struct AppServices {
    pub tokens: Arc<dyn TokenMaker>,
    pub users: UserService,
}

impl AppServices {
    /// Wire the services from configuration.
    ///
    /// Fails when the signing secret is too short or the token lifetime does
    /// not fit a timestamp.
    pub fn from_config(
        config: &AppConfig,
        publisher: Arc<dyn MessagePublisher>,
        store: Arc<dyn UserStore>,
    ) -> Result<Self, AuthError> {
        let tokens: Arc<dyn TokenMaker> = Arc::new(JwtTokenMaker::new(&config.jwt_secret)?);
        let token_ttl =
            chrono::Duration::from_std(config.token_ttl).map_err(|_| AuthError::InvalidDuration)?;
        let events = EventPublisher::new(publisher).with_timeout(config.publish_timeout);

        Ok(Self {
            users: UserService::new(store, events, tokens.clone(), token_ttl),
            tokens,
        })
    }
}
