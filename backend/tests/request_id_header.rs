use agenda_backend::middleware::request_id::{request_id, RequestId};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Extension, Router,
};
use tower::ServiceExt;
use uuid::Uuid;

fn echo_app() -> Router {
    Router::new()
        .route(
            "/test",
            axum::routing::get(|Extension(id): Extension<RequestId>| async move { id.0 }),
        )
        .layer(axum::middleware::from_fn(request_id))
}

async fn call(app: Router, header: Option<(&str, &str)>) -> (String, String) {
    let mut builder = Request::builder().uri("/test");
    if let Some((name, value)) = header {
        builder = builder.header(name, value);
    }
    let response = app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let header = response
        .headers()
        .get("x-request-id")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (header, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn generates_request_id_when_absent() {
    let (header, seen_by_handler) = call(echo_app(), None).await;
    assert!(Uuid::parse_str(&header).is_ok());
    assert_eq!(header, seen_by_handler);
}

#[tokio::test]
async fn keeps_client_request_id() {
    let (header, _) = call(echo_app(), Some(("x-request-id", "client-req-123"))).await;
    assert_eq!(header, "client-req-123");
}

#[tokio::test]
async fn falls_back_to_correlation_id() {
    let (header, _) = call(echo_app(), Some(("x-correlation-id", "corr-req-456"))).await;
    assert_eq!(header, "corr-req-456");
}

#[tokio::test]
async fn replaces_oversized_request_id() {
    let oversized = "x".repeat(300);
    let (header, _) = call(echo_app(), Some(("x-request-id", oversized.as_str()))).await;
    assert!(Uuid::parse_str(&header).is_ok());
}
