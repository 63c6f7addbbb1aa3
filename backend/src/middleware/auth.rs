use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use crate::{error::AppError, state::AppState};

/// Runs the authentication pipeline and attaches the resulting
/// [`AuthenticatedIdentity`](crate::services::AuthenticatedIdentity) to the request.
pub async fn auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let authorization = authorization_header(request.headers());
    let identity = state
        .pipeline
        .authenticate(authorization.as_deref(), Utc::now())
        .await?;

    tracing::debug!(
        user_id = %identity.user_id,
        session_id = %identity.session_id,
        "Request authenticated"
    );
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// A header that is present but not valid UTF-8 is treated like a missing one.
pub fn authorization_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}
