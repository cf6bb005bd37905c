use axum::routing::get;
use axum::Router;

use crate::handlers::customers;
use crate::state::AppState;

/// Customer routes mounted at `/customers`.
///
/// ```text
/// GET /{id}/appointments/upcoming  -> list_upcoming
/// GET /{id}/conversation           -> get_conversation
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}/appointments/upcoming", get(customers::list_upcoming))
        .route("/{id}/conversation", get(customers::get_conversation))
}
