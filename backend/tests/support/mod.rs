#![allow(dead_code)]
use agenda_backend::{app::build_router, config::Config, state::AppState};
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::env;
use tower::ServiceExt;

pub const PASSWORD: &str = "correct horse battery";

/// Config with cheap Argon2 parameters; nothing here touches the environment.
pub fn test_config() -> Config {
    Config {
        database_url: test_database_url().unwrap_or_else(|| "postgres://localhost/agenda_test".into()),
        database_max_connections: 4,
        server_addr: "127.0.0.1:0".into(),
        token_size_in_bytes: 32,
        token_ttl_seconds: 30 * 60,
        token_rolling_ttl_seconds: 10 * 60,
        refresh_token_ttl_days: 7,
        max_tokens_per_user: 3,
        password_hash_memory_kib: 1024,
        password_hash_iterations: 1,
        password_hash_parallelism: 1,
        cors_allow_origins: vec!["http://localhost:8000".into()],
    }
}

pub fn test_database_url() -> Option<String> {
    env::var("TEST_DATABASE_URL").ok()
}

pub fn memory_app() -> (Router, AppState) {
    let state = AppState::in_memory(test_config()).expect("build state");
    (build_router(state.clone()), state)
}

/// Connects and migrates the test database, or returns `None` when
/// `TEST_DATABASE_URL` is unset so PostgreSQL tests skip.
pub async fn test_pool() -> Option<PgPool> {
    let url = test_database_url()?;
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&url)
        .await
        .expect("connect test database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("run migrations");
    Some(pool)
}

pub async fn integration_guard() -> tokio::sync::MutexGuard<'static, ()> {
    static GUARD: std::sync::OnceLock<tokio::sync::Mutex<()>> = std::sync::OnceLock::new();
    GUARD
        .get_or_init(|| tokio::sync::Mutex::new(()))
        .lock()
        .await
}

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

pub async fn register(app: &Router, username: &str) -> Value {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": PASSWORD,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
    body
}

/// Logs in and returns the full login response.
pub async fn login(app: &Router, username: &str) -> Value {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "username": username, "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    body
}

pub fn access_token(login: &Value) -> String {
    login["access_token"].as_str().expect("access token").to_string()
}
