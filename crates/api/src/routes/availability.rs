use axum::routing::get;
use axum::Router;

use crate::handlers::availability;
use crate::state::AppState;

/// Availability routes mounted at `/availability`.
///
/// ```text
/// GET /              -> get_availability
/// GET /booked-slots  -> list_booked_slots
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(availability::get_availability))
        .route("/booked-slots", get(availability::list_booked_slots))
}
