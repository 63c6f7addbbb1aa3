use axum::{
    body::{to_bytes, Body, Bytes},
    http::{header::CONTENT_LENGTH, Request},
    middleware::Next,
    response::Response,
    Error as AxumError,
};
use serde_json::Value;
use std::time::Instant;

const MAX_BUFFERED_BODY_BYTES: usize = 64 * 1024;
const MAX_LOGGED_BODY_BYTES: usize = 2048;
const REDACTED: &str = "[REDACTED]";

/// Middleware that records diagnostics whenever a handler returns a 4xx or 5xx
/// status. The response body is buffered so the same payload can still be
/// forwarded to the caller after logging. Token and password fields in JSON
/// bodies never reach the log.
pub async fn log_error_responses(req: Request<Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(req).await;
    let status = response.status();

    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let latency_ms = start.elapsed().as_millis() as u64;
    let (mut parts, body) = response.into_parts();
    match buffer_body(body).await {
        Ok((bytes, preview)) => {
            log_error_event(status.as_u16(), &method, &path, latency_ms, &preview, None);
            Response::from_parts(parts, Body::from(bytes))
        }
        Err(err) => {
            parts.headers.remove(CONTENT_LENGTH);
            log_error_event(status.as_u16(), &method, &path, latency_ms, "", Some(err));
            Response::from_parts(parts, Body::empty())
        }
    }
}

async fn buffer_body(body: Body) -> Result<(Bytes, String), AxumError> {
    let bytes = to_bytes(body, MAX_BUFFERED_BODY_BYTES).await?;
    Ok((bytes.clone(), redacted_preview(&bytes)))
}

fn redacted_preview(bytes: &[u8]) -> String {
    let text = match serde_json::from_slice::<Value>(bytes) {
        Ok(mut json) => {
            redact(&mut json);
            json.to_string()
        }
        Err(_) => String::from_utf8_lossy(bytes).to_string(),
    };

    if text.len() > MAX_LOGGED_BODY_BYTES {
        let mut cut = MAX_LOGGED_BODY_BYTES;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}... (truncated, {} bytes total)", &text[..cut], text.len())
    } else {
        text
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.contains("token") || key.contains("password") || key == "authorization"
}

fn redact(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, field) in map.iter_mut() {
                if is_sensitive_key(key) {
                    *field = Value::String(REDACTED.to_string());
                } else {
                    redact(field);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact),
        _ => {}
    }
}

fn log_error_event(
    status: u16,
    method: &str,
    path: &str,
    latency_ms: u64,
    body_preview: &str,
    body_error: Option<AxumError>,
) {
    if let Some(err) = body_error {
        if status >= 500 {
            tracing::error!(status, method, path, latency_ms, error = ?err, "Failed to read error response body");
        } else {
            tracing::warn!(status, method, path, latency_ms, error = ?err, "Failed to read error response body");
        }
        return;
    }

    if status >= 500 {
        tracing::error!(
            status,
            method,
            path,
            latency_ms,
            body = body_preview,
            "Request completed with error status"
        );
    } else {
        tracing::warn!(
            status,
            method,
            path,
            latency_ms,
            body = body_preview,
            "Request completed with error status"
        );
    }
}
