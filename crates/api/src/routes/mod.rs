pub mod admin;
pub mod appointments;
pub mod availability;
pub mod conversations;
pub mod customers;
pub mod health;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws                                              WebSocket (room.join / room.leave)
///
/// /availability                                    open slots for a day (GET)
/// /availability/booked-slots                       slots with active bookings (GET)
///
/// /appointments                                    book (POST)
/// /appointments/{id}                               get
/// /appointments/{id}/cancel                        cancel (POST)
/// /appointments/{id}/reschedule                    reschedule (POST)
/// /appointments/{id}/confirm                       confirm, staff only (POST)
/// /appointments/{id}/complete                      complete, staff only (POST)
///
/// /customers/{id}/appointments/upcoming            active appointments from today
/// /customers/{id}/conversation                     get or create the conversation
///
/// /conversations/{id}/messages                     transcript (GET), post (POST)
/// /conversations/{id}/messages/{message_id}        edit (PUT), delete (DELETE)
/// /conversations/{id}/pins                         pinned set (GET)
/// /conversations/{id}/pins/{message_id}            pin (PUT), unpin (DELETE)
///
/// /admin/scheduling                                scheduling config (GET, PUT; admin only)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // WebSocket endpoint.
        .route("/ws", get(ws::ws_handler))
        // Availability reads.
        .nest("/availability", availability::router())
        // Booking and lifecycle.
        .nest("/appointments", appointments::router())
        // Per-customer views.
        .nest("/customers", customers::router())
        // Transcript and pins.
        .nest("/conversations", conversations::router())
        // Global scheduling configuration.
        .nest("/admin", admin::router())
}
