#![allow(dead_code)]

use std::sync::Arc;

use aether_booking::{FixedClock, MemoryStore, Stores};
use aether_core::appointment::{Requester, Role};
use aether_core::intent::KeywordInterpreter;
use aether_core::types::DbId;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use chrono::NaiveDate;
use http_body_util::BodyExt;
use tower::ServiceExt;

use aether_api::config::{BookingConfig, ServerConfig};
use aether_api::router::build_app_router;
use aether_api::state::AppState;

/// The date every test app treats as "today" (a Monday).
pub const TODAY: &str = "2024-07-15";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        room_buffer: 64,
        log_json: false,
        booking: BookingConfig::default(),
    }
}

/// A router over in-memory stores plus handles for assertions.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    /// A product that books straight to `booked`.
    pub product_id: DbId,
    /// A product that books to `pending_confirmation`.
    pub gated_product_id: DbId,
}

/// Build the full application router with all middleware layers on
/// in-memory stores, with "today" pinned to [`TODAY`].
pub async fn build_test_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let product = store.add_product("Consultation", false).await;
    let gated = store.add_product("Treatment", true).await;

    let config = test_config();
    let today: NaiveDate = TODAY.parse().unwrap();
    let state = AppState::new(
        config.clone(),
        Stores::from_memory(Arc::clone(&store)),
        Arc::new(KeywordInterpreter::default()),
        Arc::new(FixedClock(today)),
    );

    TestApp {
        router: build_app_router(state.clone(), &config),
        state,
        store,
        product_id: product.id,
        gated_product_id: gated.id,
    }
}

pub fn customer(id: DbId) -> Option<Requester> {
    Some(Requester::customer(id))
}

pub fn staff(id: DbId) -> Option<Requester> {
    Some(Requester::staff(id))
}

pub fn admin(id: DbId) -> Option<Requester> {
    Some(Requester {
        id,
        role: Role::Admin,
    })
}

fn request(
    method: Method,
    uri: &str,
    user: Option<Requester>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        let role = match user.role {
            Role::Customer => "customer",
            Role::Staff => "staff",
            Role::Admin => "admin",
        };
        builder = builder
            .header("x-user-id", user.id.to_string())
            .header("x-user-role", role);
    }
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn get(app: &Router, uri: &str, user: Option<Requester>) -> Response<Body> {
    app.clone()
        .oneshot(request(Method::GET, uri, user, None))
        .await
        .unwrap()
}

pub async fn post_json(
    app: &Router,
    uri: &str,
    user: Option<Requester>,
    body: serde_json::Value,
) -> Response<Body> {
    app.clone()
        .oneshot(request(Method::POST, uri, user, Some(body)))
        .await
        .unwrap()
}

pub async fn put_json(
    app: &Router,
    uri: &str,
    user: Option<Requester>,
    body: serde_json::Value,
) -> Response<Body> {
    app.clone()
        .oneshot(request(Method::PUT, uri, user, Some(body)))
        .await
        .unwrap()
}

pub async fn put(app: &Router, uri: &str, user: Option<Requester>) -> Response<Body> {
    app.clone()
        .oneshot(request(Method::PUT, uri, user, None))
        .await
        .unwrap()
}

pub async fn delete(app: &Router, uri: &str, user: Option<Requester>) -> Response<Body> {
    app.clone()
        .oneshot(request(Method::DELETE, uri, user, None))
        .await
        .unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
