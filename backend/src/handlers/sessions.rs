use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::{
    error::{AppError, AuthError},
    models::session::SessionResponse,
    services::AuthenticatedIdentity,
    state::AppState,
    types::SessionId,
};

pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(identity): Extension<AuthenticatedIdentity>,
) -> Result<Json<Vec<SessionResponse>>, AppError> {
    let sessions = state
        .sessions
        .find_by_user(identity.user_id)
        .await
        .map_err(AuthError::Unavailable)?;
    let responses = sessions
        .into_iter()
        .rev()
        .map(|session| SessionResponse::from_session(session, identity.session_id))
        .collect();
    Ok(Json(responses))
}

pub async fn revoke_session(
    State(state): State<AppState>,
    Extension(identity): Extension<AuthenticatedIdentity>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<Value>, AppError> {
    if session_id == identity.session_id {
        return Err(AppError::BadRequest(
            "Cannot revoke current session; use logout instead".into(),
        ));
    }

    // Only sessions of the caller are visible; anything else is "not found".
    let owned = state
        .sessions
        .find_by_user(identity.user_id)
        .await
        .map_err(AuthError::Unavailable)?
        .into_iter()
        .any(|session| session.id == session_id);
    if !owned {
        return Err(AppError::NotFound("Session not found".into()));
    }

    let deleted = state
        .sessions
        .delete(session_id)
        .await
        .map_err(AuthError::Unavailable)?;
    if !deleted {
        return Err(AppError::NotFound("Session not found".into()));
    }
    tracing::info!(user_id = %identity.user_id, %session_id, "Session revoked");

    Ok(Json(json!({
        "message": "Session revoked",
        "session_id": session_id
    })))
}
