//! Booking and lifecycle endpoints over in-memory stores.

mod common;

use aether_core::types::DbId;
use axum::http::StatusCode;
use common::{
    admin, body_json, build_test_app, customer, get, post_json, put_json, staff, TestApp, TODAY,
};
use serde_json::json;

async fn book(app: &TestApp, customer_id: DbId, date: &str, time: &str) -> axum::response::Response {
    post_json(
        &app.router,
        "/api/v1/appointments",
        customer(customer_id),
        json!({
            "customer_id": customer_id,
            "product_id": app.product_id,
            "date": date,
            "time": time,
        }),
    )
    .await
}

async fn book_id(app: &TestApp, customer_id: DbId, date: &str, time: &str) -> DbId {
    let response = book(app, customer_id, date, time).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"]["id"].as_i64().unwrap()
}

// ---------------------------------------------------------------------------
// Availability
// ---------------------------------------------------------------------------

#[tokio::test]
async fn availability_uses_default_hours() {
    let app = build_test_app().await;

    let response = get(&app.router, &format!("/api/v1/availability?date={TODAY}"), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let slots = json["data"]["slots"].as_array().unwrap();
    assert_eq!(slots.len(), 8);
    assert_eq!(slots[0], "09:00");
    assert_eq!(json["data"]["closed"], false);
}

#[tokio::test]
async fn booked_slot_leaves_availability() {
    let app = build_test_app().await;
    book_id(&app, 1, TODAY, "09:00").await;

    let json = body_json(get(&app.router, &format!("/api/v1/availability?date={TODAY}"), None).await).await;
    let slots = json["data"]["slots"].as_array().unwrap();
    assert!(!slots.contains(&json!("09:00")));
    assert_eq!(slots.len(), 7);

    let json = body_json(
        get(
            &app.router,
            &format!("/api/v1/availability/booked-slots?date={TODAY}"),
            None,
        )
        .await,
    )
    .await;
    assert_eq!(json["data"], json!(["09:00"]));
}

#[tokio::test]
async fn availability_requires_a_date() {
    let app = build_test_app().await;

    let response = get(&app.router, "/api/v1/availability", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Booking
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_slot_returns_conflict_with_alternatives() {
    let app = build_test_app().await;
    book_id(&app, 1, TODAY, "09:00").await;

    let response = book(&app, 2, TODAY, "09:00").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let json = body_json(response).await;
    assert_eq!(json["code"], "SLOT_CONFLICT");
    let suggested = json["suggested_slots"].as_array().unwrap();
    assert_eq!(suggested.len(), 3);
    assert_eq!(suggested[0], json!({ "date": TODAY, "time": "10:00" }));
}

#[tokio::test]
async fn booking_without_identity_is_401() {
    let app = build_test_app().await;

    let response = post_json(
        &app.router,
        "/api/v1/appointments",
        None,
        json!({ "customer_id": 1, "product_id": app.product_id, "date": TODAY, "time": "09:00" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn customer_cannot_book_for_someone_else() {
    let app = build_test_app().await;

    let response = post_json(
        &app.router,
        "/api/v1/appointments",
        customer(1),
        json!({ "customer_id": 2, "product_id": app.product_id, "date": TODAY, "time": "09:00" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn staff_can_book_for_a_customer() {
    let app = build_test_app().await;

    let response = post_json(
        &app.router,
        "/api/v1/appointments",
        staff(50),
        json!({ "customer_id": 2, "product_id": app.product_id, "date": TODAY, "time": "11:00" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["customer_id"], 2);
    assert_eq!(json["data"]["staff_id"], 50);
}

#[tokio::test]
async fn staff_booking_keeps_an_explicit_staff_member() {
    let app = build_test_app().await;

    let response = post_json(
        &app.router,
        "/api/v1/appointments",
        staff(50),
        json!({ "customer_id": 2, "staff_id": 7, "product_id": app.product_id, "date": TODAY, "time": "11:00" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["data"]["staff_id"], 7);
}

#[tokio::test]
async fn customer_booking_has_no_staff_member() {
    let app = build_test_app().await;

    let response = book(&app, 1, TODAY, "09:00").await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(body_json(response).await["data"]["staff_id"].is_null());
}

#[tokio::test]
async fn past_date_is_rejected() {
    let app = build_test_app().await;

    let response = book(&app, 1, "2024-07-14", "09:00").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn gated_product_books_pending_then_staff_confirms() {
    let app = build_test_app().await;

    let response = post_json(
        &app.router,
        "/api/v1/appointments",
        customer(1),
        json!({ "customer_id": 1, "product_id": app.gated_product_id, "date": TODAY, "time": "13:00" }),
    )
    .await;
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "pending_confirmation");
    let id = json["data"]["id"].as_i64().unwrap();

    let uri = format!("/api/v1/appointments/{id}/confirm");
    let response = post_json(&app.router, &uri, customer(1), json!({})).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = post_json(&app.router, &uri, staff(50), json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["status"], "booked");
}

#[tokio::test]
async fn store_outage_is_a_sanitized_500() {
    let app = build_test_app().await;
    app.store.set_unavailable(true);

    let response = book(&app, 1, TODAY, "09:00").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], "An internal error occurred");
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_twice_reports_not_found() {
    let app = build_test_app().await;
    let id = book_id(&app, 1, TODAY, "09:00").await;
    let uri = format!("/api/v1/appointments/{id}/cancel");

    let response = post_json(&app.router, &uri, customer(1), json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["status"], "cancelled");

    let response = post_json(&app.router, &uri, customer(1), json!({})).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // The slot is free again.
    book_id(&app, 2, TODAY, "09:00").await;
}

#[tokio::test]
async fn other_customers_appointment_is_hidden() {
    let app = build_test_app().await;
    let id = book_id(&app, 1, TODAY, "09:00").await;

    let response = get(&app.router, &format!("/api/v1/appointments/{id}"), customer(2)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = post_json(
        &app.router,
        &format!("/api/v1/appointments/{id}/cancel"),
        customer(2),
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(&app.router, &format!("/api/v1/appointments/{id}"), staff(50)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn reschedule_moves_the_booking() {
    let app = build_test_app().await;
    let id = book_id(&app, 1, TODAY, "09:00").await;

    let response = post_json(
        &app.router,
        &format!("/api/v1/appointments/{id}/reschedule"),
        customer(1),
        json!({ "date": "2024-07-16", "time": "14:00" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["prior"]["status"], "rescheduled");
    assert_eq!(json["data"]["replacement"]["status"], "booked");
    assert_eq!(json["data"]["replacement"]["rescheduled_from"], id);
    assert_eq!(
        json["data"]["prior"]["rescheduled_to"],
        json["data"]["replacement"]["id"]
    );

    let json = body_json(
        get(&app.router, "/api/v1/customers/1/appointments/upcoming", customer(1)).await,
    )
    .await;
    let upcoming = json["data"].as_array().unwrap();
    assert_eq!(upcoming.len(), 1);
    assert_eq!(upcoming[0]["date"], "2024-07-16");
}

#[tokio::test]
async fn upcoming_is_ordered_and_private() {
    let app = build_test_app().await;
    book_id(&app, 1, "2024-07-17", "09:00").await;
    book_id(&app, 1, TODAY, "15:00").await;
    book_id(&app, 1, TODAY, "10:00").await;

    let json = body_json(
        get(&app.router, "/api/v1/customers/1/appointments/upcoming", customer(1)).await,
    )
    .await;
    let order: Vec<(String, String)> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| {
            (
                a["date"].as_str().unwrap().to_string(),
                a["time"].as_str().unwrap().to_string(),
            )
        })
        .collect();
    assert_eq!(
        order,
        vec![
            (TODAY.to_string(), "10:00".to_string()),
            (TODAY.to_string(), "15:00".to_string()),
            ("2024-07-17".to_string(), "09:00".to_string()),
        ]
    );

    let response = get(&app.router, "/api/v1/customers/1/appointments/upcoming", customer(2)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// ---------------------------------------------------------------------------
// Scheduling configuration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn admin_config_update_is_versioned() {
    let app = build_test_app().await;

    let json = body_json(get(&app.router, "/api/v1/admin/scheduling", admin(99)).await).await;
    assert_eq!(json["data"]["version"], 0);

    let config = json!({
        "version": 0,
        "working_hours": ["10:00", "09:00"],
        "number_of_staff": 2,
        "service_duration_minutes": 30,
        "weekly_off_days": [0],
    });
    let response = put_json(&app.router, "/api/v1/admin/scheduling", admin(99), config.clone()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["version"], 1);
    assert_eq!(json["data"]["working_hours"], json!(["09:00", "10:00"]));

    // Same base version again is stale.
    let response = put_json(&app.router, "/api/v1/admin/scheduling", admin(99), config).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Sunday is now a weekly day off.
    let json = body_json(get(&app.router, "/api/v1/availability?date=2024-07-21", None).await).await;
    assert_eq!(json["data"]["closed"], true);
    assert_eq!(json["data"]["closure"], "weekly_off");
}

#[tokio::test]
async fn non_admin_cannot_touch_config() {
    let app = build_test_app().await;

    let response = get(&app.router, "/api/v1/admin/scheduling", staff(50)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = put_json(
        &app.router,
        "/api/v1/admin/scheduling",
        customer(1),
        json!({ "version": 0, "working_hours": [], "number_of_staff": 1, "service_duration_minutes": 60 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let app = build_test_app().await;

    let response = put_json(
        &app.router,
        "/api/v1/admin/scheduling",
        admin(99),
        json!({ "version": 0, "working_hours": ["09:00"], "number_of_staff": 1, "service_duration_minutes": 60, "weekly_off_days": [7] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
