//! User persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::StoreError;
use crate::models::user::{NewUser, User};
use crate::types::UserId;

const SELECT_COLUMNS: &str = "id, username, email, password_hash, created_at, updated_at";

/// Repository trait for User operations.
///
/// Mockable with mockall; use `MockUserRepository` in unit tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Fails with [`StoreError::Conflict`] naming the duplicated field.
    async fn create(&self, user: NewUser, now: DateTime<Utc>) -> Result<User, StoreError>;

    async fn update_username(
        &self,
        id: UserId,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<User, StoreError>;

    /// Deletes the user row; sessions cascade in PostgreSQL.
    async fn delete(&self, id: UserId) -> Result<bool, StoreError>;
}

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let query = format!("SELECT {} FROM users WHERE id = $1", SELECT_COLUMNS);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let query = format!("SELECT {} FROM users WHERE username = $1", SELECT_COLUMNS);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn create(&self, user: NewUser, now: DateTime<Utc>) -> Result<User, StoreError> {
        let query = format!(
            "INSERT INTO users (username, email, password_hash, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $4) \
             RETURNING {}",
            SELECT_COLUMNS
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(map_unique_violation)
    }

    async fn update_username(
        &self,
        id: UserId,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<User, StoreError> {
        let query = format!(
            "UPDATE users SET username = $1, updated_at = $2 WHERE id = $3 RETURNING {}",
            SELECT_COLUMNS
        );
        sqlx::query_as::<_, User>(&query)
            .bind(username)
            .bind(now)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_unique_violation)?
            .ok_or(StoreError::UserNotFound)
    }

    async fn delete(&self, id: UserId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn map_unique_violation(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let field = match db_err.constraint() {
                Some(constraint) if constraint.contains("email") => "email",
                _ => "username",
            };
            return StoreError::Conflict(field);
        }
    }
    StoreError::Database(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_database_errors_pass_through() {
        assert!(matches!(
            map_unique_violation(sqlx::Error::RowNotFound),
            StoreError::Database(sqlx::Error::RowNotFound)
        ));
    }

    #[test]
    fn mock_user_repository_is_send_sync() {
        fn check_send_sync<T: Send + Sync>() {}
        check_send_sync::<MockUserRepository>();
    }
}
