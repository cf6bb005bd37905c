use axum::routing::get;
use axum::Router;

use crate::handlers::admin;
use crate::state::AppState;

/// Admin routes mounted at `/admin`.
///
/// ```text
/// GET /scheduling  -> get_scheduling
/// PUT /scheduling  -> put_scheduling
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/scheduling",
        get(admin::get_scheduling).put(admin::put_scheduling),
    )
}
