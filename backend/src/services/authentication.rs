//! Request-time bearer authentication.
//!
//! `authenticate` walks a presented token through extraction, fingerprinting,
//! lookup, expiry check and sliding renewal, and yields the identity that
//! downstream handlers read from request extensions.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::error::AuthError;
use crate::models::session::Session;
use crate::repositories::{SessionStore, UserRepository};
use crate::services::auth_policy::AuthPolicy;
use crate::types::{SessionId, UserId};
use crate::utils::token::TokenCodec;

/// Identity attached to an authenticated request.
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedIdentity {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub session_id: SessionId,
    /// The raw token as presented, for re-presentation by the client.
    #[serde(skip_serializing)]
    pub token: String,
}

/// Extracts the credential from an `Authorization` header value.
pub fn parse_bearer_token(header: &str) -> Option<&str> {
    let (scheme, rest) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    if token.is_empty() || token.contains(char::is_whitespace) {
        return None;
    }
    Some(token)
}

#[derive(Clone)]
pub struct AuthenticationPipeline {
    sessions: Arc<dyn SessionStore>,
    users: Arc<dyn UserRepository>,
    codec: TokenCodec,
    policy: AuthPolicy,
}

impl AuthenticationPipeline {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        users: Arc<dyn UserRepository>,
        codec: TokenCodec,
        policy: AuthPolicy,
    ) -> Self {
        Self {
            sessions,
            users,
            codec,
            policy,
        }
    }

    pub async fn authenticate(
        &self,
        authorization: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<AuthenticatedIdentity, AuthError> {
        let (token, session) = self.resolve(authorization).await?;

        if AuthPolicy::is_expired(session.access.expires_at, now) {
            self.discard(&session, "expired").await;
            return Err(AuthError::SessionExpired);
        }

        let user = self
            .users
            .find_by_id(session.user_id)
            .await
            .map_err(AuthError::Unavailable)?;
        let Some(user) = user else {
            self.discard(&session, "orphaned").await;
            return Err(AuthError::SessionExpired);
        };

        if self.policy.is_idle(session.access.last_used_at, now) {
            tracing::debug!(
                session_id = %session.id,
                last_used_at = %session.access.last_used_at,
                "Session resumed after idle period"
            );
        }
        let session = self.renew(session, now).await?;

        Ok(AuthenticatedIdentity {
            user_id: user.id,
            username: user.username,
            email: user.email,
            session_id: session.id,
            token: token.to_string(),
        })
    }

    /// Ends the session the token belongs to. A session that is already gone
    /// or expired is reported as [`AuthError::SessionExpired`].
    pub async fn logout(
        &self,
        authorization: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<SessionId, AuthError> {
        let (_, session) = self.resolve(authorization).await?;

        if AuthPolicy::is_expired(session.access.expires_at, now) {
            self.discard(&session, "expired").await;
            return Err(AuthError::SessionExpired);
        }

        let deleted = self
            .sessions
            .delete(session.id)
            .await
            .map_err(AuthError::Unavailable)?;
        if !deleted {
            return Err(AuthError::SessionExpired);
        }
        tracing::info!(session_id = %session.id, user_id = %session.user_id, "Session logged out");
        Ok(session.id)
    }

    async fn resolve<'a>(
        &self,
        authorization: Option<&'a str>,
    ) -> Result<(&'a str, Session), AuthError> {
        let token = authorization
            .and_then(parse_bearer_token)
            .ok_or(AuthError::InvalidTokenFormat)?;
        let fingerprint = self.codec.fingerprint_encoded(token)?;

        let session = self
            .sessions
            .find_by_access_fingerprint(&fingerprint)
            .await
            .map_err(AuthError::Unavailable)?
            .ok_or(AuthError::SessionExpired)?;
        Ok((token, session))
    }

    /// Renewal is retried once. If it still fails the request proceeds with
    /// the un-renewed session; the next request renews normally.
    async fn renew(&self, session: Session, now: DateTime<Utc>) -> Result<Session, AuthError> {
        let first = match self.sessions.renew(session.id, now).await {
            Ok(renewed) => return renewed.ok_or(AuthError::SessionExpired),
            Err(err) => err,
        };
        tracing::warn!(session_id = %session.id, error = %first, "Session renewal failed, retrying");

        match self.sessions.renew(session.id, now).await {
            Ok(renewed) => renewed.ok_or(AuthError::SessionExpired),
            Err(err) => {
                tracing::warn!(
                    session_id = %session.id,
                    error = %err,
                    "Session renewal failed twice, continuing without renewal"
                );
                Ok(session)
            }
        }
    }

    async fn discard(&self, session: &Session, reason: &'static str) {
        match self.sessions.delete(session.id).await {
            Ok(_) => tracing::debug!(session_id = %session.id, reason, "Discarded session"),
            Err(err) => tracing::warn!(
                session_id = %session.id,
                reason,
                error = %err,
                "Failed to discard session"
            ),
        }
    }
}
