use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use userhub_auth::Role;
use userhub_core::{DomainError, UserId};

use super::password::{hash_password, verify_password};
use super::{NewUser, User, UserStore, UserStoreError};

#[derive(Debug, Default)]
struct Rows {
    by_id: BTreeMap<UserId, User>,
    last_id: u64,
}

/// In-memory user store.
///
/// Intended for tests/dev. Ids are assigned sequentially from 1.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    rows: RwLock<Rows>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Rows>, UserStoreError> {
        self.rows
            .read()
            .map_err(|_| UserStoreError::Unavailable("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Rows>, UserStoreError> {
        self.rows
            .write()
            .map_err(|_| UserStoreError::Unavailable("lock poisoned".to_string()))
    }

    fn by_email<'a>(rows: &'a Rows, email: &str) -> Option<&'a User> {
        rows.by_id
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email.trim()))
    }

    fn update<F>(&self, id: UserId, change: F) -> Result<User, UserStoreError>
    where
        F: FnOnce(&mut User),
    {
        let mut rows = self.write()?;
        let user = rows.by_id.get_mut(&id).ok_or(DomainError::NotFound)?;
        change(user);
        Ok(user.clone())
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn create(&self, new_user: NewUser) -> Result<User, UserStoreError> {
        let password_hash = hash_password(&new_user.password)?;
        let email = new_user.email.trim().to_string();

        let mut rows = self.write()?;
        if Self::by_email(&rows, &email).is_some() {
            return Err(DomainError::conflict(format!("email {email} is already registered")).into());
        }

        rows.last_id += 1;
        let mut roles: Vec<Role> = Vec::with_capacity(new_user.roles.len());
        for role in new_user.roles {
            if !roles.contains(&role) {
                roles.push(role);
            }
        }

        let user = User {
            id: UserId::new(rows.last_id),
            name: new_user.name,
            email,
            password_hash,
            roles,
            created_at: Utc::now(),
        };
        rows.by_id.insert(user.id, user.clone());
        debug!(user_id = %user.id, "user stored");
        Ok(user)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, UserStoreError> {
        Ok(self.read()?.by_id.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserStoreError> {
        Ok(Self::by_email(&*self.read()?, email).cloned())
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<Option<User>, UserStoreError> {
        let Some(user) = Self::by_email(&*self.read()?, email).cloned() else {
            return Ok(None);
        };
        Ok(verify_password(password, &user.password_hash).then_some(user))
    }

    async fn list(&self) -> Result<Vec<User>, UserStoreError> {
        Ok(self.read()?.by_id.values().cloned().collect())
    }

    async fn add_role(&self, id: UserId, role: Role) -> Result<User, UserStoreError> {
        self.update(id, |user| {
            if !user.roles.contains(&role) {
                user.roles.push(role);
            }
        })
    }

    async fn remove_role(&self, id: UserId, role: &Role) -> Result<User, UserStoreError> {
        self.update(id, |user| user.roles.retain(|r| r != role))
    }
}
