//! Room join/leave frames and their access checks, driven through the same
//! `AppState` the socket handler uses.

mod common;

use aether_api::ws::handle_frame;
use aether_core::appointment::Requester;
use aether_core::realtime::RoomEvent;
use aether_core::types::DbId;
use axum::extract::ws::Message;
use common::{build_test_app, customer, staff, TestApp};
use tokio::sync::mpsc;

/// Register `conn_id` the way an upgraded socket is registered.
async fn open(
    app: &TestApp,
    conn_id: &str,
    requester: Option<Requester>,
) -> (mpsc::UnboundedReceiver<Message>, mpsc::Receiver<RoomEvent>) {
    let control = app.state.ws_manager.add(conn_id.to_string(), requester).await;
    let rooms = app.state.rooms.connect(conn_id).await;
    (control, rooms)
}

async fn join(app: &TestApp, conn_id: &str, conversation_id: DbId) {
    let frame = format!(r#"{{"type":"room.join","conversation_id":{conversation_id}}}"#);
    handle_frame(&app.state, conn_id, &frame).await;
}

fn next_reply(control: &mut mpsc::UnboundedReceiver<Message>) -> serde_json::Value {
    match control.try_recv().expect("a reply frame") {
        Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("unexpected frame {other:?}"),
    }
}

async fn conversation_of(app: &TestApp, customer_id: DbId) -> DbId {
    app.state
        .chat
        .conversation_for_customer(customer_id)
        .await
        .unwrap()
        .id
}

// ---------------------------------------------------------------------------
// Join authorization
// ---------------------------------------------------------------------------

#[tokio::test]
async fn customer_joins_own_conversation() {
    let app = build_test_app().await;
    let conv = conversation_of(&app, 1).await;
    let (mut control, _rooms) = open(&app, "c1", customer(1)).await;

    join(&app, "c1", conv).await;

    let reply = next_reply(&mut control);
    assert_eq!(reply["type"], "room.joined");
    assert_eq!(reply["conversation_id"], conv);
    assert_eq!(app.state.rooms.room_size(conv).await, 1);
}

#[tokio::test]
async fn customer_is_refused_a_foreign_conversation() {
    let app = build_test_app().await;
    let theirs = conversation_of(&app, 2).await;
    let (mut control, _rooms) = open(&app, "c1", customer(1)).await;

    join(&app, "c1", theirs).await;

    let reply = next_reply(&mut control);
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["conversation_id"], theirs);
    assert_eq!(app.state.rooms.room_size(theirs).await, 0);
}

#[tokio::test]
async fn anonymous_socket_cannot_join() {
    let app = build_test_app().await;
    let conv = conversation_of(&app, 1).await;
    let (mut control, _rooms) = open(&app, "anon", None).await;

    join(&app, "anon", conv).await;

    assert_eq!(next_reply(&mut control)["type"], "error");
    assert_eq!(app.state.rooms.room_size(conv).await, 0);
}

#[tokio::test]
async fn staff_may_join_any_conversation() {
    let app = build_test_app().await;
    let first = conversation_of(&app, 1).await;
    let second = conversation_of(&app, 2).await;
    let (mut control, _rooms) = open(&app, "desk", staff(50)).await;

    join(&app, "desk", first).await;
    join(&app, "desk", second).await;

    assert_eq!(next_reply(&mut control)["type"], "room.joined");
    assert_eq!(next_reply(&mut control)["type"], "room.joined");
    assert_eq!(app.state.rooms.room_size(first).await, 1);
    assert_eq!(app.state.rooms.room_size(second).await, 1);
}

#[tokio::test]
async fn unknown_conversation_is_refused_even_for_staff() {
    let app = build_test_app().await;
    let (mut control, _rooms) = open(&app, "desk", staff(50)).await;

    join(&app, "desk", 9999).await;

    assert_eq!(next_reply(&mut control)["type"], "error");
}

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

#[tokio::test]
async fn leave_acknowledges_and_stops_delivery() {
    let app = build_test_app().await;
    let conv = conversation_of(&app, 1).await;
    let (mut control, mut rooms) = open(&app, "c1", customer(1)).await;
    join(&app, "c1", conv).await;
    next_reply(&mut control);

    let frame = format!(r#"{{"type":"room.leave","conversation_id":{conv}}}"#);
    handle_frame(&app.state, "c1", &frame).await;

    assert_eq!(next_reply(&mut control)["type"], "room.left");
    let delivered = app
        .state
        .rooms
        .publish(RoomEvent::PinnedChanged {
            conversation_id: conv,
            pinned_message_ids: vec![],
        })
        .await;
    assert_eq!(delivered, 0);
    assert!(rooms.try_recv().is_err());
    assert_eq!(app.state.rooms.room_size(conv).await, 0);
}

#[tokio::test]
async fn malformed_frame_gets_an_error_reply() {
    let app = build_test_app().await;
    let (mut control, _rooms) = open(&app, "c1", customer(1)).await;

    handle_frame(&app.state, "c1", r#"{"type":"room.nuke"}"#).await;

    assert_eq!(next_reply(&mut control)["type"], "error");
}
