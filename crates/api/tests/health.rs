mod common;

use axum::http::StatusCode;
use common::{body_json, build_test_app, get};

#[tokio::test]
async fn health_reports_memory_store() {
    let app = build_test_app().await;

    let response = get(&app.router, "/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["store"], "memory");
    assert_eq!(json["store_healthy"], true);
    assert_eq!(json["realtime_sessions"], 0);
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let app = build_test_app().await;

    let response = get(&app.router, "/health", None).await;
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn unknown_route_is_404() {
    let app = build_test_app().await;

    let response = get(&app.router, "/api/v1/nope", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
