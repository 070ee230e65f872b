//! User service use cases: registration, login, role administration.
//!
//! User creation persists first and publishes `UserCreated` second. The two
//! steps are not atomic: if the publish fails the row stays, the caller gets
//! `UserServiceError::Publish`, and no welcome email is sent for that user.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use userhub_auth::{AuthError, Role, TokenMaker};
use userhub_core::{DomainError, UserId};
use userhub_events::{EventPublisher, MessagePublisher, PublishError, UserCreated};
use userhub_infra::{NewUser, User, UserStore, UserStoreError};

#[derive(Debug, Error)]
pub enum UserServiceError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("email {0} is already registered")]
    AlreadyRegistered(String),

    #[error("user {0} not found")]
    NotFound(UserId),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error(transparent)]
    Store(UserStoreError),

    #[error("user was stored but the user.created event was not published: {0}")]
    Publish(#[from] PublishError),

    #[error(transparent)]
    Token(#[from] AuthError),
}

impl From<UserStoreError> for UserServiceError {
    fn from(err: UserStoreError) -> Self {
        match err {
            UserStoreError::Domain(DomainError::Validation(msg)) => Self::Validation(msg),
            other => Self::Store(other),
        }
    }
}

/// Result of a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginResult {
    pub token: String,
    pub user_id: UserId,
    pub roles: Vec<Role>,
}

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn UserStore>,
    events: EventPublisher<Arc<dyn MessagePublisher>>,
    tokens: Arc<dyn TokenMaker>,
    token_ttl: chrono::Duration,
}

impl UserService {
    pub fn new(
        store: Arc<dyn UserStore>,
        events: EventPublisher<Arc<dyn MessagePublisher>>,
        tokens: Arc<dyn TokenMaker>,
        token_ttl: chrono::Duration,
    ) -> Self {
        Self {
            store,
            events,
            tokens,
            token_ttl,
        }
    }

    /// Register a user, then announce it on the broker.
    #[instrument(skip(self, new_user), fields(email = %new_user.email), err)]
    pub async fn create(&self, new_user: NewUser) -> Result<User, UserServiceError> {
        validate(&new_user)?;

        if self.store.find_by_email(&new_user.email).await?.is_some() {
            return Err(UserServiceError::AlreadyRegistered(new_user.email));
        }

        let email = new_user.email.clone();
        let user = match self.store.create(new_user).await {
            Ok(user) => user,
            Err(UserStoreError::Domain(DomainError::Conflict(_))) => {
                return Err(UserServiceError::AlreadyRegistered(email));
            }
            Err(err) => return Err(err.into()),
        };

        let event = UserCreated {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        };
        if let Err(err) = self.events.publish(&event).await {
            warn!(user_id = %user.id, error = %err, "user stored without user.created event");
            return Err(err.into());
        }

        info!(user_id = %user.id, "user created");
        Ok(user)
    }

    /// Check credentials and issue a token carrying the user's roles.
    #[instrument(skip(self, password), err)]
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResult, UserServiceError> {
        let user = self
            .store
            .authenticate(email, password)
            .await?
            .ok_or(UserServiceError::InvalidCredentials)?;

        let token = self
            .tokens
            .create_token(&user.email, &user.roles, self.token_ttl)?;

        Ok(LoginResult {
            token,
            user_id: user.id,
            roles: user.roles,
        })
    }

    pub async fn get(&self, id: UserId) -> Result<User, UserServiceError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(UserServiceError::NotFound(id))
    }

    pub async fn list(&self) -> Result<Vec<User>, UserServiceError> {
        Ok(self.store.list().await?)
    }

    pub async fn assign_role(&self, id: UserId, role: Role) -> Result<User, UserServiceError> {
        self.store
            .add_role(id, role)
            .await
            .map_err(|err| not_found_as(id, err))
    }

    pub async fn remove_role(&self, id: UserId, role: &Role) -> Result<User, UserServiceError> {
        self.store
            .remove_role(id, role)
            .await
            .map_err(|err| not_found_as(id, err))
    }

    /// Create `new_user` unless the email is already registered.
    ///
    /// Used at startup to seed an administrator; publishes like [`Self::create`].
    pub async fn ensure_user(&self, new_user: NewUser) -> Result<User, UserServiceError> {
        match self.store.find_by_email(&new_user.email).await? {
            Some(existing) => Ok(existing),
            None => self.create(new_user).await,
        }
    }
}

fn not_found_as(id: UserId, err: UserStoreError) -> UserServiceError {
    match err {
        UserStoreError::Domain(DomainError::NotFound) => UserServiceError::NotFound(id),
        other => other.into(),
    }
}

fn validate(new_user: &NewUser) -> Result<(), UserServiceError> {
    if new_user.name.trim().is_empty() {
        return Err(UserServiceError::Validation("name must not be empty".to_string()));
    }
    if !new_user.email.contains('@') {
        return Err(UserServiceError::Validation("email must contain '@'".to_string()));
    }
    if new_user.password.is_empty() {
        return Err(UserServiceError::Validation("password must not be empty".to_string()));
    }
    Ok(())
}
