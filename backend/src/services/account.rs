//! Account lifecycle: registration, login, token refresh and profile changes.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use validator::Validate;

use crate::error::{AccountError, AuthError};
use crate::models::session::Session;
use crate::models::user::{
    LoginRequest, LoginResponse, NewUser, RegisterRequest, UpdateUsernameRequest, User,
    UserResponse,
};
use crate::repositories::{SessionStore, UserRepository};
use crate::services::auth_policy::AuthPolicy;
use crate::types::UserId;
use crate::utils::password::CredentialHasher;
use crate::utils::token::{TokenCodec, TokenValidationInfo};

/// A freshly minted token pair: encoded values for the client, fingerprints for the store.
struct IssuedPair {
    access: String,
    access_fingerprint: TokenValidationInfo,
    refresh: String,
    refresh_fingerprint: TokenValidationInfo,
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn SessionStore>,
    hasher: CredentialHasher,
    codec: TokenCodec,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionStore>,
        hasher: CredentialHasher,
        codec: TokenCodec,
    ) -> Self {
        Self {
            users,
            sessions,
            hasher,
            codec,
        }
    }

    pub async fn register(
        &self,
        payload: RegisterRequest,
        now: DateTime<Utc>,
    ) -> Result<User, AccountError> {
        payload.validate()?;
        let password_hash = self.hash_password(payload.password).await?;

        let user = self
            .users
            .create(
                NewUser {
                    username: payload.username,
                    email: payload.email,
                    password_hash,
                },
                now,
            )
            .await?;
        tracing::info!(user_id = %user.id, username = %user.username, "User registered");
        Ok(user)
    }

    /// Verifies credentials and opens a new session, evicting the user's least
    /// recently used session when the pool is full.
    pub async fn login(
        &self,
        payload: LoginRequest,
        now: DateTime<Utc>,
    ) -> Result<LoginResponse, AccountError> {
        let user = self.users.find_by_username(&payload.username).await?;
        let Some(user) = user else {
            self.burn_dummy_verification(payload.password).await?;
            tracing::info!(username = %payload.username, "Login failed: unknown user");
            return Err(AccountError::InvalidCredentials);
        };

        if !self
            .verify_password(payload.password, user.password_hash.clone())
            .await?
        {
            tracing::info!(user_id = %user.id, "Login failed: wrong password");
            return Err(AccountError::InvalidCredentials);
        }

        let pair = self.issue_pair()?;
        let session = self
            .sessions
            .create_session(
                user.id,
                pair.access_fingerprint.clone(),
                pair.refresh_fingerprint.clone(),
                now,
            )
            .await?;
        tracing::info!(user_id = %user.id, session_id = %session.id, "User logged in");
        Ok(login_response(pair, &session, user))
    }

    /// Exchanges a refresh token for a new pair on the same session. The old
    /// pair stops working immediately.
    pub async fn refresh(
        &self,
        refresh_token: &str,
        now: DateTime<Utc>,
    ) -> Result<LoginResponse, AccountError> {
        let fingerprint = self.codec.fingerprint_encoded(refresh_token)?;
        let session = self
            .sessions
            .find_by_refresh_fingerprint(&fingerprint)
            .await
            .map_err(AuthError::Unavailable)?
            .ok_or(AuthError::SessionExpired)?;

        if AuthPolicy::is_expired(session.refresh.expires_at, now) {
            self.sessions
                .delete(session.id)
                .await
                .map_err(AuthError::Unavailable)?;
            return Err(AuthError::SessionExpired.into());
        }

        let Some(user) = self.users.find_by_id(session.user_id).await? else {
            self.sessions
                .delete(session.id)
                .await
                .map_err(AuthError::Unavailable)?;
            tracing::debug!(session_id = %session.id, "Discarded orphaned session on refresh");
            return Err(AuthError::SessionExpired.into());
        };

        // Rotation consumes the presented refresh token; a concurrent refresh
        // with the same token gets `None` here.
        let pair = self.issue_pair()?;
        let rotated = self
            .sessions
            .rotate(
                &fingerprint,
                pair.access_fingerprint.clone(),
                pair.refresh_fingerprint.clone(),
                now,
            )
            .await
            .map_err(AuthError::Unavailable)?
            .ok_or(AuthError::SessionExpired)?;
        tracing::info!(user_id = %user.id, session_id = %rotated.id, "Session tokens rotated");
        Ok(login_response(pair, &rotated, user))
    }

    /// Public profile lookup by a raw identifier taken from the request path.
    pub async fn find_user(&self, raw_id: i64) -> Result<UserResponse, AccountError> {
        let id = UserId::new(raw_id)?;
        let user = self
            .users
            .find_by_id(id)
            .await?
            .ok_or(AccountError::UserNotFound)?;
        Ok(user.into())
    }

    pub async fn change_username(
        &self,
        user_id: UserId,
        payload: UpdateUsernameRequest,
        now: DateTime<Utc>,
    ) -> Result<User, AccountError> {
        payload.validate()?;
        let user = self
            .users
            .update_username(user_id, &payload.username, now)
            .await?;
        tracing::info!(user_id = %user.id, username = %user.username, "Username changed");
        Ok(user)
    }

    /// Removes the account and every session it owns after re-checking the password.
    pub async fn delete_account(&self, user_id: UserId, password: String) -> Result<(), AccountError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AccountError::UserNotFound)?;
        if !self.verify_password(password, user.password_hash).await? {
            return Err(AccountError::InvalidCredentials);
        }

        let revoked = self.sessions.delete_for_user(user_id).await?;
        if !self.users.delete(user_id).await? {
            return Err(AccountError::UserNotFound);
        }
        tracing::info!(%user_id, revoked_sessions = revoked, "Account deleted");
        Ok(())
    }

    fn issue_pair(&self) -> Result<IssuedPair, AuthError> {
        let access = self.codec.generate()?;
        let refresh = self.codec.generate()?;
        Ok(IssuedPair {
            access_fingerprint: self.codec.fingerprint(&access)?,
            refresh_fingerprint: self.codec.fingerprint(&refresh)?,
            access: self.codec.encode(&access),
            refresh: self.codec.encode(&refresh),
        })
    }

    // Argon2 is CPU bound; keep it off the async workers.
    async fn hash_password(&self, password: String) -> Result<String, AccountError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|_| AccountError::Hashing)?
            .map_err(|err| {
                tracing::error!(error = %err, "Password hashing failed");
                AccountError::Hashing
            })
    }

    async fn verify_password(&self, password: String, hash: String) -> Result<bool, AccountError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|_| AccountError::Hashing)
    }

    async fn burn_dummy_verification(&self, password: String) -> Result<(), AccountError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.verify_dummy(&password))
            .await
            .map_err(|_| AccountError::Hashing)
    }
}

fn login_response(pair: IssuedPair, session: &Session, user: User) -> LoginResponse {
    LoginResponse {
        access_token: pair.access,
        access_token_expires_at: session.access.expires_at,
        refresh_token: pair.refresh,
        refresh_token_expires_at: session.refresh.expires_at,
        user: user.into(),
    }
}
