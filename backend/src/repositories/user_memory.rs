//! Process-local [`UserRepository`], paired with the in-memory session store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::models::user::{NewUser, User};
use crate::repositories::user::UserRepository;
use crate::types::UserId;

#[derive(Default)]
struct Inner {
    next_id: i64,
    users: BTreeMap<UserId, User>,
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    inner: RwLock<Inner>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn create(&self, user: NewUser, now: DateTime<Utc>) -> Result<User, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict("username"));
        }
        if inner.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict("email"));
        }

        inner.next_id += 1;
        let id = UserId::new(inner.next_id).map_err(|_| StoreError::UserNotFound)?;
        let created = User {
            id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        inner.users.insert(id, created.clone());
        Ok(created)
    }

    async fn update_username(
        &self,
        id: UserId,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<User, StoreError> {
        let mut inner = self.inner.write().await;
        if inner
            .users
            .values()
            .any(|u| u.id != id && u.username == username)
        {
            return Err(StoreError::Conflict("username"));
        }
        let user = inner.users.get_mut(&id).ok_or(StoreError::UserNotFound)?;
        user.username = username.to_string();
        user.updated_at = now;
        Ok(user.clone())
    }

    async fn delete(&self, id: UserId) -> Result<bool, StoreError> {
        Ok(self.inner.write().await.users.remove(&id).is_some())
    }
}
