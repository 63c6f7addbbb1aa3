//! Models for login sessions and their token pair.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::types::{SessionId, UserId};
use crate::utils::token::TokenValidationInfo;

/// Access half of a session. Renewed on every authenticated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub fingerprint: TokenValidationInfo,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Refresh half of a session. Fixed expiry, replaced on rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshToken {
    pub fingerprint: TokenValidationInfo,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub access: AccessToken,
    pub refresh: RefreshToken,
}

/// Flat row produced by joining `sessions` with both token tables.
#[derive(Debug, FromRow)]
pub struct SessionRow {
    pub id: SessionId,
    pub user_id: UserId,
    pub access_fingerprint: TokenValidationInfo,
    pub access_created_at: DateTime<Utc>,
    pub access_last_used_at: DateTime<Utc>,
    pub access_expire_at: DateTime<Utc>,
    pub refresh_fingerprint: TokenValidationInfo,
    pub refresh_created_at: DateTime<Utc>,
    pub refresh_expire_at: DateTime<Utc>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Session {
            id: row.id,
            user_id: row.user_id,
            access: AccessToken {
                fingerprint: row.access_fingerprint,
                created_at: row.access_created_at,
                last_used_at: row.access_last_used_at,
                expires_at: row.access_expire_at,
            },
            refresh: RefreshToken {
                fingerprint: row.refresh_fingerprint,
                created_at: row.refresh_created_at,
                expires_at: row.refresh_expire_at,
            },
        }
    }
}

#[derive(Debug, Serialize)]
/// Session metadata listed to its owner. Fingerprints are not exposed.
pub struct SessionResponse {
    pub id: SessionId,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
    pub is_current: bool,
}

impl SessionResponse {
    pub fn from_session(session: Session, current: SessionId) -> Self {
        Self {
            is_current: session.id == current,
            id: session.id,
            created_at: session.access.created_at,
            last_used_at: session.access.last_used_at,
            expires_at: session.access.expires_at,
            refresh_expires_at: session.refresh.expires_at,
        }
    }
}
