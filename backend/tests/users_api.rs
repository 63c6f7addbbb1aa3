use axum::http::{Method, StatusCode};
use serde_json::json;

mod support;

use support::{access_token, login, memory_app, register, send, PASSWORD};

#[tokio::test]
async fn change_username_keeps_the_session() {
    let (app, _) = memory_app();
    register(&app, "alice").await;
    register(&app, "bob").await;
    let token = access_token(&login(&app, "alice").await);

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/users/me/username",
        Some(&token),
        Some(json!({ "username": "bob" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Username already taken");

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/users/me/username",
        Some(&token),
        Some(json!({ "username": "no spaces allowed" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/users/me/username",
        Some(&token),
        Some(json!({ "username": "alice_2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice_2");

    let (status, me) = send(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "alice_2");
}

#[tokio::test]
async fn delete_account_requires_password_and_ends_sessions() {
    let (app, _) = memory_app();
    register(&app, "alice").await;
    let first = access_token(&login(&app, "alice").await);
    let second = access_token(&login(&app, "alice").await);

    let (status, body) = send(
        &app,
        Method::DELETE,
        "/api/users/me",
        Some(&first),
        Some(json!({ "password": "not the password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_CREDENTIALS");

    let (status, _) = send(
        &app,
        Method::DELETE,
        "/api/users/me",
        Some(&first),
        Some(json!({ "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    for token in [&first, &second] {
        let (status, body) = send(&app, Method::GET, "/api/auth/me", Some(token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "SESSION_EXPIRED");
    }

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "username": "alice", "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn user_lookup_checks_identifier() {
    let (app, _) = memory_app();
    let alice = register(&app, "alice").await;
    let token = access_token(&login(&app, "alice").await);
    let id = alice["id"].as_i64().expect("id");

    let (status, body) = send(&app, Method::GET, &format!("/api/users/{}", id), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");

    let (status, body) = send(&app, Method::GET, "/api/users/-5", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");

    let (status, body) = send(&app, Method::GET, "/api/users/9999", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, _) = send(&app, Method::GET, &format!("/api/users/{}", id), None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
