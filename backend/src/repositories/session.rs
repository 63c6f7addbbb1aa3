//! Session persistence.
//!
//! [`SessionStore`] is the seam the authentication pipeline talks to.
//! [`PgSessionStore`] keeps sessions in PostgreSQL across three tables:
//! `sessions`, `access_tokens` and `refresh_tokens`, joined 1:1:1.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::session::{AccessToken, RefreshToken, Session, SessionRow};
use crate::services::auth_policy::AuthPolicy;
use crate::types::{SessionId, UserId};
use crate::utils::token::TokenValidationInfo;

const SESSION_SELECT: &str = r#"
    SELECT s.id, s.user_id,
           a.token_fingerprint AS access_fingerprint,
           a.created_at AS access_created_at,
           a.last_used_at AS access_last_used_at,
           a.expire_at AS access_expire_at,
           r.token_fingerprint AS refresh_fingerprint,
           r.created_at AS refresh_created_at,
           r.expire_at AS refresh_expire_at
    FROM sessions s
    JOIN access_tokens a ON a.session_id = s.id
    JOIN refresh_tokens r ON r.session_id = s.id
"#;

/// Storage for login sessions.
///
/// Lookups never filter on expiry; callers decide what an expired session
/// means. `create_session` must evict and insert atomically per user.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Evicts the user's least recently used sessions past the cap, then
    /// inserts a new one with `created_at = last_used_at = now`.
    async fn create_session(
        &self,
        user_id: UserId,
        access: TokenValidationInfo,
        refresh: TokenValidationInfo,
        now: DateTime<Utc>,
    ) -> Result<Session, StoreError>;

    async fn find_by_access_fingerprint(
        &self,
        fingerprint: &TokenValidationInfo,
    ) -> Result<Option<Session>, StoreError>;

    async fn find_by_refresh_fingerprint(
        &self,
        fingerprint: &TokenValidationInfo,
    ) -> Result<Option<Session>, StoreError>;

    /// Sessions of one user, least recently used first.
    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Session>, StoreError>;

    /// Slides the access expiry forward from `now`. Timestamps never move
    /// backwards, so racing renewals are harmless. `None` if the session is gone.
    async fn renew(
        &self,
        session_id: SessionId,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>, StoreError>;

    /// Replaces both tokens of the session that `previous_refresh` belongs to.
    /// The old refresh token is consumed atomically, so of two callers racing
    /// with the same token only one gets `Some`.
    async fn rotate(
        &self,
        previous_refresh: &TokenValidationInfo,
        access: TokenValidationInfo,
        refresh: TokenValidationInfo,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>, StoreError>;

    /// Returns `false` when there was nothing to delete.
    async fn delete(&self, session_id: SessionId) -> Result<bool, StoreError>;

    async fn delete_for_user(&self, user_id: UserId) -> Result<u64, StoreError>;

    async fn clear(&self) -> Result<(), StoreError>;

    /// Removes sessions whose access and refresh tokens have both expired.
    async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}

#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
    policy: AuthPolicy,
}

impl PgSessionStore {
    pub fn new(pool: PgPool, policy: AuthPolicy) -> Self {
        Self { pool, policy }
    }

    async fn fetch_one_where(
        &self,
        clause: &str,
        fingerprint: &TokenValidationInfo,
    ) -> Result<Option<Session>, StoreError> {
        let query = format!("{} WHERE {}", SESSION_SELECT, clause);
        let row = sqlx::query_as::<_, SessionRow>(&query)
            .bind(fingerprint)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Session::from))
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create_session(
        &self,
        user_id: UserId,
        access: TokenValidationInfo,
        refresh: TokenValidationInfo,
        now: DateTime<Utc>,
    ) -> Result<Session, StoreError> {
        let mut tx = self.pool.begin().await?;

        // 1. Lock the owner so concurrent logins for the same user serialize here.
        let owner: Option<UserId> =
            sqlx::query_scalar("SELECT id FROM users WHERE id = $1 FOR UPDATE")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;
        if owner.is_none() {
            return Err(StoreError::UserNotFound);
        }

        // 2. Evict least recently used sessions past the cap.
        let existing: Vec<SessionId> = sqlx::query_scalar(
            r#"
            SELECT s.id
            FROM sessions s
            JOIN access_tokens a ON a.session_id = s.id
            WHERE s.user_id = $1
            ORDER BY a.last_used_at ASC, s.created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;

        let evict = self.policy.evictions_for(existing.len());
        if evict > 0 {
            let victims: Vec<Uuid> = existing
                .iter()
                .take(evict)
                .map(|id| *id.as_uuid())
                .collect();
            sqlx::query("DELETE FROM sessions WHERE id = ANY($1)")
                .bind(&victims)
                .execute(&mut *tx)
                .await?;
            tracing::info!(%user_id, evicted = evict, "Evicted least recently used sessions");
        }

        // 3. Insert the session and its token pair.
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

        sqlx::query("INSERT INTO sessions (id, user_id, created_at) VALUES ($1, $2, $3)")
            .bind(session.id)
            .bind(session.user_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        insert_token_pair(&mut tx, &session).await?;

        tx.commit().await?;
        Ok(session)
    }

    async fn find_by_access_fingerprint(
        &self,
        fingerprint: &TokenValidationInfo,
    ) -> Result<Option<Session>, StoreError> {
        self.fetch_one_where("a.token_fingerprint = $1", fingerprint)
            .await
    }

    async fn find_by_refresh_fingerprint(
        &self,
        fingerprint: &TokenValidationInfo,
    ) -> Result<Option<Session>, StoreError> {
        self.fetch_one_where("r.token_fingerprint = $1", fingerprint)
            .await
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Session>, StoreError> {
        let query = format!(
            "{} WHERE s.user_id = $1 ORDER BY a.last_used_at ASC, s.created_at ASC",
            SESSION_SELECT
        );
        let rows = sqlx::query_as::<_, SessionRow>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Session::from).collect())
    }

    async fn renew(
        &self,
        session_id: SessionId,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>, StoreError> {
        // The outer SELECT must read the UPDATE's RETURNING rows; the table
        // itself still shows the pre-update snapshot inside this statement.
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            WITH a AS (
                UPDATE access_tokens
                SET last_used_at = GREATEST(last_used_at, $2),
                    expire_at = GREATEST(expire_at, $3)
                WHERE session_id = $1
                RETURNING token_fingerprint, session_id, created_at, last_used_at, expire_at
            )
            SELECT s.id, s.user_id,
                   a.token_fingerprint AS access_fingerprint,
                   a.created_at AS access_created_at,
                   a.last_used_at AS access_last_used_at,
                   a.expire_at AS access_expire_at,
                   r.token_fingerprint AS refresh_fingerprint,
                   r.created_at AS refresh_created_at,
                   r.expire_at AS refresh_expire_at
            FROM a
            JOIN sessions s ON s.id = a.session_id
            JOIN refresh_tokens r ON r.session_id = s.id
            "#,
        )
        .bind(session_id)
        .bind(now)
        .bind(self.policy.access_expiry(now))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Session::from))
    }

    async fn rotate(
        &self,
        previous_refresh: &TokenValidationInfo,
        access: TokenValidationInfo,
        refresh: TokenValidationInfo,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>, StoreError> {
        let mut tx = self.pool.begin().await?;

        // A concurrent rotation with the same token blocks on this row and
        // then finds it gone.
        let consumed: Option<SessionId> = sqlx::query_scalar(
            "DELETE FROM refresh_tokens WHERE token_fingerprint = $1 RETURNING session_id",
        )
        .bind(previous_refresh)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(session_id) = consumed else {
            return Ok(None);
        };

        let owner: Option<UserId> = sqlx::query_scalar("SELECT user_id FROM sessions WHERE id = $1")
            .bind(session_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(user_id) = owner else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM access_tokens WHERE session_id = $1")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;

        let session = Session {
            id: session_id,
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
        insert_token_pair(&mut tx, &session).await?;

        tx.commit().await?;
        Ok(Some(session))
    }

    async fn delete(&self, session_id: SessionId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_for_user(&self, user_id: UserId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM sessions")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM sessions s
            USING access_tokens a, refresh_tokens r
            WHERE a.session_id = s.id
              AND r.session_id = s.id
              AND a.expire_at < $1
              AND r.expire_at < $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

async fn insert_token_pair(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    session: &Session,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO access_tokens (token_fingerprint, session_id, created_at, last_used_at, expire_at) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(&session.access.fingerprint)
    .bind(session.id)
    .bind(session.access.created_at)
    .bind(session.access.last_used_at)
    .bind(session.access.expires_at)
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        "INSERT INTO refresh_tokens (token_fingerprint, session_id, created_at, expire_at) \
         VALUES ($1, $2, $3, $4)",
    )
    .bind(&session.refresh.fingerprint)
    .bind(session.id)
    .bind(session.refresh.created_at)
    .bind(session.refresh.expires_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
