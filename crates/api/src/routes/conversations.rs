use axum::routing::{get, put};
use axum::Router;

use crate::handlers::conversations;
use crate::state::AppState;

/// Conversation routes mounted at `/conversations`.
///
/// ```text
/// GET    /{id}/messages               -> list_messages
/// POST   /{id}/messages               -> post_message
/// PUT    /{id}/messages/{message_id}  -> edit_message
/// DELETE /{id}/messages/{message_id}  -> delete_message
/// GET    /{id}/pins                   -> list_pins
/// PUT    /{id}/pins/{message_id}      -> pin_message
/// DELETE /{id}/pins/{message_id}      -> unpin_message
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/{id}/messages",
            get(conversations::list_messages).post(conversations::post_message),
        )
        .route(
            "/{id}/messages/{message_id}",
            put(conversations::edit_message).delete(conversations::delete_message),
        )
        .route("/{id}/pins", get(conversations::list_pins))
        .route(
            "/{id}/pins/{message_id}",
            put(conversations::pin_message).delete(conversations::unpin_message),
        )
}
