use axum::routing::{get, post};
use axum::Router;

use crate::handlers::appointments;
use crate::state::AppState;

/// Appointment routes mounted at `/appointments`.
///
/// ```text
/// POST /                  -> book
/// GET  /{id}              -> get_appointment
/// POST /{id}/cancel       -> cancel
/// POST /{id}/reschedule   -> reschedule
/// POST /{id}/confirm      -> confirm
/// POST /{id}/complete     -> complete
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(appointments::book))
        .route("/{id}", get(appointments::get_appointment))
        .route("/{id}/cancel", post(appointments::cancel))
        .route("/{id}/reschedule", post(appointments::reschedule))
        .route("/{id}/confirm", post(appointments::confirm))
        .route("/{id}/complete", post(appointments::complete))
}
