use axum::{
    extract::{Extension, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use crate::{
    error::AppError,
    middleware::auth::authorization_header,
    models::user::{LoginRequest, LoginResponse, RefreshRequest, RegisterRequest, UserResponse},
    services::AuthenticatedIdentity,
    state::AppState,
};

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let user = state.accounts.register(payload, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let response = state.accounts.login(payload, Utc::now()).await?;
    Ok(Json(response))
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let response = state
        .accounts
        .refresh(&payload.refresh_token, Utc::now())
        .await?;
    Ok(Json(response))
}

/// Ends the session named by the bearer token. Runs outside the auth
/// middleware so an already-ended session reports `SESSION_EXPIRED` here too.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let authorization = authorization_header(&headers);
    let session_id = state
        .pipeline
        .logout(authorization.as_deref(), Utc::now())
        .await?;

    Ok(Json(json!({
        "message": "Logged out",
        "session_id": session_id
    })))
}

pub async fn me(Extension(identity): Extension<AuthenticatedIdentity>) -> Json<AuthenticatedIdentity> {
    Json(identity)
}
