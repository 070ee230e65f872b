//! User records boundary.
//!
//! The store owns user rows and their role assignments. Creating a user here
//! does **not** emit any event; the create use case publishes `UserCreated`
//! after the store call succeeds.

pub mod in_memory;
pub mod password;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use userhub_auth::Role;
use userhub_core::{DomainError, UserId};

pub use in_memory::InMemoryUserStore;

/// A persisted user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
}

/// Input to [`UserStore::create`]. The password is hashed by the store.
#[derive(Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub roles: Vec<Role>,
}

impl core::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NewUser")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("roles", &self.roles)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum UserStoreError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("user store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Persist a new user. Fails with `DomainError::Conflict` when the email is taken.
    async fn create(&self, new_user: NewUser) -> Result<User, UserStoreError>;

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, UserStoreError>;

    /// Emails compare case-insensitively.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserStoreError>;

    /// `Ok(None)` for an unknown email or a wrong password; callers must not
    /// tell the two apart.
    async fn authenticate(&self, email: &str, password: &str) -> Result<Option<User>, UserStoreError>;

    /// All users, ordered by id.
    async fn list(&self) -> Result<Vec<User>, UserStoreError>;

    /// Idempotent: adding a role the user already has is a no-op.
    async fn add_role(&self, id: UserId, role: Role) -> Result<User, UserStoreError>;

    /// Idempotent: removing a role the user lacks is a no-op.
    async fn remove_role(&self, id: UserId, role: &Role) -> Result<User, UserStoreError>;
}

#[async_trait]
impl<S> UserStore for std::sync::Arc<S>
where
    S: UserStore + ?Sized,
{
    async fn create(&self, new_user: NewUser) -> Result<User, UserStoreError> {
        (**self).create(new_user).await
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, UserStoreError> {
        (**self).find_by_id(id).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserStoreError> {
        (**self).find_by_email(email).await
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<Option<User>, UserStoreError> {
        (**self).authenticate(email, password).await
    }

    async fn list(&self) -> Result<Vec<User>, UserStoreError> {
        (**self).list().await
    }

    async fn add_role(&self, id: UserId, role: Role) -> Result<User, UserStoreError> {
        (**self).add_role(id, role).await
    }

    async fn remove_role(&self, id: UserId, role: &Role) -> Result<User, UserStoreError> {
        (**self).remove_role(id, role).await
    }
}
