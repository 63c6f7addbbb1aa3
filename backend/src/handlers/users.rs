use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;

use crate::{
    error::AppError,
    models::user::{DeleteAccountRequest, UpdateUsernameRequest, UserResponse},
    services::AuthenticatedIdentity,
    state::AppState,
};

pub async fn get_user(
    State(state): State<AppState>,
    Path(raw_id): Path<i64>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.accounts.find_user(raw_id).await?;
    Ok(Json(user))
}

pub async fn update_username(
    State(state): State<AppState>,
    Extension(identity): Extension<AuthenticatedIdentity>,
    Json(payload): Json<UpdateUsernameRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state
        .accounts
        .change_username(identity.user_id, payload, Utc::now())
        .await?;
    Ok(Json(UserResponse::from(user)))
}

pub async fn delete_me(
    State(state): State<AppState>,
    Extension(identity): Extension<AuthenticatedIdentity>,
    Json(payload): Json<DeleteAccountRequest>,
) -> Result<StatusCode, AppError> {
    state
        .accounts
        .delete_account(identity.user_id, payload.password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
