//! Process-local [`SessionStore`] for tests and single-process embedding.
//!
//! One write lock covers eviction and insertion, which gives the same per-user
//! atomicity the PostgreSQL store gets from its transaction. Fingerprints are
//! indexed so lookups do not scan.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::models::session::{AccessToken, RefreshToken, Session};
use crate::repositories::session::SessionStore;
use crate::services::auth_policy::AuthPolicy;
use crate::types::{SessionId, UserId};
use crate::utils::token::TokenValidationInfo;

#[derive(Default)]
struct Inner {
    sessions: HashMap<SessionId, Session>,
    by_access: HashMap<TokenValidationInfo, SessionId>,
    by_refresh: HashMap<TokenValidationInfo, SessionId>,
}

impl Inner {
    fn insert(&mut self, session: Session) {
        self.by_access
            .insert(session.access.fingerprint.clone(), session.id);
        self.by_refresh
            .insert(session.refresh.fingerprint.clone(), session.id);
        self.sessions.insert(session.id, session);
    }

    fn remove(&mut self, session_id: SessionId) -> Option<Session> {
        let session = self.sessions.remove(&session_id)?;
        self.by_access.remove(&session.access.fingerprint);
        self.by_refresh.remove(&session.refresh.fingerprint);
        Some(session)
    }

    fn sessions_of(&self, user_id: UserId) -> Vec<Session> {
        let mut sessions: Vec<Session> = self
            .sessions
            .values()
            .filter(|session| session.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by_key(|session| (session.access.last_used_at, session.access.created_at));
        sessions
    }
}

pub struct InMemorySessionStore {
    inner: RwLock<Inner>,
    policy: AuthPolicy,
}

impl InMemorySessionStore {
    pub fn new(policy: AuthPolicy) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            policy,
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create_session(
        &self,
        user_id: UserId,
        access: TokenValidationInfo,
        refresh: TokenValidationInfo,
        now: DateTime<Utc>,
    ) -> Result<Session, StoreError> {
        let mut inner = self.inner.write().await;

        let existing = inner.sessions_of(user_id);
        let evict = self.policy.evictions_for(existing.len());
        for victim in existing.iter().take(evict) {
            inner.remove(victim.id);
        }
        if evict > 0 {
            tracing::info!(%user_id, evicted = evict, "Evicted least recently used sessions");
        }

        let session = Session {
            id: SessionId::new(),
            user_id,
            access: AccessToken {
                fingerprint: access,
                created_at: now,
                last_used_at: now,
                expires_at: self.policy.access_expiry(now),
            },
            refresh: RefreshToken {
                fingerprint: refresh,
                created_at: now,
                expires_at: self.policy.refresh_expiry(now),
            },
        };
        inner.insert(session.clone());
        Ok(session)
    }

    async fn find_by_access_fingerprint(
        &self,
        fingerprint: &TokenValidationInfo,
    ) -> Result<Option<Session>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_access
            .get(fingerprint)
            .and_then(|id| inner.sessions.get(id))
            .cloned())
    }

    async fn find_by_refresh_fingerprint(
        &self,
        fingerprint: &TokenValidationInfo,
    ) -> Result<Option<Session>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_refresh
            .get(fingerprint)
            .and_then(|id| inner.sessions.get(id))
            .cloned())
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Session>, StoreError> {
        Ok(self.inner.read().await.sessions_of(user_id))
    }

    async fn renew(
        &self,
        session_id: SessionId,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(session) = inner.sessions.get_mut(&session_id) else {
            return Ok(None);
        };
        session.access.last_used_at = session.access.last_used_at.max(now);
        session.access.expires_at = session
            .access
            .expires_at
            .max(self.policy.access_expiry(now));
        Ok(Some(session.clone()))
    }

    async fn rotate(
        &self,
        previous_refresh: &TokenValidationInfo,
        access: TokenValidationInfo,
        refresh: TokenValidationInfo,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(session_id) = inner.by_refresh.get(previous_refresh).copied() else {
            return Ok(None);
        };
        let Some(previous) = inner.remove(session_id) else {
            return Ok(None);
        };
        let session = Session {
            id: previous.id,
            user_id: previous.user_id,
            access: AccessToken {
                fingerprint: access,
                created_at: now,
                last_used_at: now,
                expires_at: self.policy.access_expiry(now),
            },
            refresh: RefreshToken {
                fingerprint: refresh,
                created_at: now,
                expires_at: self.policy.refresh_expiry(now),
            },
        };
        inner.insert(session.clone());
        Ok(Some(session))
    }

    async fn delete(&self, session_id: SessionId) -> Result<bool, StoreError> {
        Ok(self.inner.write().await.remove(session_id).is_some())
    }

    async fn delete_for_user(&self, user_id: UserId) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let ids: Vec<SessionId> = inner
            .sessions_of(user_id)
            .into_iter()
            .map(|session| session.id)
            .collect();
        for id in &ids {
            inner.remove(*id);
        }
        Ok(ids.len() as u64)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        *self.inner.write().await = Inner::default();
        Ok(())
    }

    async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let expired: Vec<SessionId> = inner
            .sessions
            .values()
            .filter(|session| {
                AuthPolicy::is_expired(session.access.expires_at, now)
                    && AuthPolicy::is_expired(session.refresh.expires_at, now)
            })
            .map(|session| session.id)
            .collect();
        for id in &expired {
            inner.remove(*id);
        }
        Ok(expired.len() as u64)
    }
}
