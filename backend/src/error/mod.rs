use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::types::NegativeIdentifier;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Failures at the persistence boundary.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("user not found")]
    UserNotFound,
    #[error("{0} already taken")]
    Conflict(&'static str),
}

/// Outcomes of token handling that reject a request.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid token format")]
    InvalidTokenFormat,
    #[error("session expired")]
    SessionExpired,
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("secure random source unavailable")]
    EntropyUnavailable,
    #[error("session storage unavailable: {0}")]
    Unavailable(#[source] StoreError),
}

/// Failures of the account operations (registration, login, profile changes).
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("username already taken")]
    UsernameTaken,
    #[error("email already taken")]
    EmailTaken,
    #[error("user not found")]
    UserNotFound,
    #[error(transparent)]
    NegativeIdentifier(#[from] NegativeIdentifier),
    #[error("validation failed")]
    Validation(Vec<String>),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("password hashing failed")]
    Hashing,
    #[error("account storage unavailable: {0}")]
    Unavailable(#[source] StoreError),
}

impl From<StoreError> for AccountError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UserNotFound => AccountError::UserNotFound,
            StoreError::Conflict("email") => AccountError::EmailTaken,
            StoreError::Conflict(_) => AccountError::UsernameTaken,
            other => AccountError::Unavailable(other),
        }
    }
}

impl From<validator::ValidationErrors> for AccountError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    let code = e.code.as_ref();
                    format!("{}: {}", field, code)
                })
            })
            .collect();
        messages.sort();
        AccountError::Validation(messages)
    }
}

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    Unauthorized { message: String, code: &'static str },
    Conflict(String),
    BadRequest(String),
    Unavailable(String),
    InternalServerError(anyhow::Error),
    Validation(Vec<String>),
}

impl AppError {
    fn unauthorized(message: &str, code: &'static str) -> Self {
        AppError::Unauthorized {
            message: message.to_string(),
            code,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, code, details) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, "NOT_FOUND".to_string(), None),
            AppError::Unauthorized { message, code } => {
                (StatusCode::UNAUTHORIZED, message, code.to_string(), None)
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg, "CONFLICT".to_string(), None),
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                msg,
                "BAD_REQUEST".to_string(),
                None,
            ),
            AppError::Unavailable(msg) => {
                tracing::warn!("Service unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Service temporarily unavailable".to_string(),
                    "SERVICE_UNAVAILABLE".to_string(),
                    None,
                )
            }
            AppError::InternalServerError(err) => {
                tracing::error!("Internal server error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    "INTERNAL_SERVER_ERROR".to_string(),
                    None,
                )
            }
            AppError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                "Validation failed".to_string(),
                "VALIDATION_ERROR".to_string(),
                Some(serde_json::json!({ "errors": errors })),
            ),
        };

        let body = Json(ErrorResponse {
            error: error_message,
            code,
            details,
        });

        (status, body).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidTokenFormat => {
                AppError::unauthorized("Invalid token format", "INVALID_TOKEN_FORMAT")
            }
            AuthError::SessionExpired => {
                AppError::unauthorized("Session expired", "SESSION_EXPIRED")
            }
            AuthError::InvalidCredentials => {
                AppError::unauthorized("Invalid username or password", "INVALID_CREDENTIALS")
            }
            AuthError::EntropyUnavailable => {
                AppError::InternalServerError(anyhow::anyhow!("secure random source unavailable"))
            }
            AuthError::Unavailable(source) => AppError::Unavailable(source.to_string()),
        }
    }
}

impl From<AccountError> for AppError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::InvalidCredentials => AuthError::InvalidCredentials.into(),
            AccountError::UsernameTaken => AppError::Conflict("Username already taken".into()),
            AccountError::EmailTaken => AppError::Conflict("Email already taken".into()),
            AccountError::UserNotFound => AppError::NotFound("User not found".into()),
            AccountError::NegativeIdentifier(err) => AppError::BadRequest(err.to_string()),
            AccountError::Validation(messages) => AppError::Validation(messages),
            AccountError::Auth(err) => err.into(),
            AccountError::Hashing => {
                AppError::InternalServerError(anyhow::anyhow!("password hashing failed"))
            }
            AccountError::Unavailable(source) => AppError::Unavailable(source.to_string()),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalServerError(err)
    }
}
