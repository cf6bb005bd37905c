//! Handlers for conversation transcripts and pinned messages.

use aether_core::appointment::Requester;
use aether_core::chat::Conversation;
use aether_core::types::DbId;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::middleware::requester::ActingUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /conversations/{id}/messages` and
/// `PUT /conversations/{id}/messages/{message_id}`.
#[derive(Debug, Deserialize)]
pub struct PostMessage {
    pub content: String,
}

/// Load a conversation the requester may see. Other customers'
/// conversations answer 404 rather than revealing they exist.
async fn visible_conversation(
    state: &AppState,
    id: DbId,
    requester: Requester,
) -> AppResult<Conversation> {
    let conversation = state.chat.conversation(id).await?;
    if requester.is_staff() || conversation.customer_id == requester.id {
        Ok(conversation)
    } else {
        Err(aether_booking::BookingError::NotFound(format!("Conversation {id} not found")).into())
    }
}

/// GET /api/v1/conversations/{id}/messages
///
/// Full transcript, oldest first.
pub async fn list_messages(
    State(state): State<AppState>,
    ActingUser(requester): ActingUser,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    visible_conversation(&state, id, requester).await?;
    let messages = state.chat.messages(id).await?;
    Ok(Json(DataResponse { data: messages }))
}

/// POST /api/v1/conversations/{id}/messages
///
/// Append the customer's message, the interpreter's reply and, when the
/// reply carried a complete booking intent, the booking outcome.
pub async fn post_message(
    State(state): State<AppState>,
    ActingUser(requester): ActingUser,
    Path(id): Path<DbId>,
    Json(body): Json<PostMessage>,
) -> AppResult<impl IntoResponse> {
    let conversation = visible_conversation(&state, id, requester).await?;
    if conversation.customer_id != requester.id {
        return Err(AppError::Forbidden(
            "Only the conversation's customer can post messages".into(),
        ));
    }
    let exchange = state.chat.post_message(id, &body.content).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: exchange })))
}

/// PUT /api/v1/conversations/{id}/messages/{message_id}
///
/// Replace a message's content. Customers may edit only their own messages.
pub async fn edit_message(
    State(state): State<AppState>,
    ActingUser(requester): ActingUser,
    Path((id, message_id)): Path<(DbId, DbId)>,
    Json(body): Json<PostMessage>,
) -> AppResult<impl IntoResponse> {
    visible_conversation(&state, id, requester).await?;
    let message = state
        .chat
        .edit_message(id, message_id, requester, &body.content)
        .await?;
    Ok(Json(DataResponse { data: message }))
}

/// DELETE /api/v1/conversations/{id}/messages/{message_id}
///
/// Returns the deleted id and the pinned set that remains.
pub async fn delete_message(
    State(state): State<AppState>,
    ActingUser(requester): ActingUser,
    Path((id, message_id)): Path<(DbId, DbId)>,
) -> AppResult<impl IntoResponse> {
    visible_conversation(&state, id, requester).await?;
    let deletion = state.chat.delete_message(id, message_id, requester).await?;
    Ok(Json(DataResponse { data: deletion }))
}

/// GET /api/v1/conversations/{id}/pins
pub async fn list_pins(
    State(state): State<AppState>,
    ActingUser(requester): ActingUser,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    visible_conversation(&state, id, requester).await?;
    let pinned = state.chat.pinned(id).await?;
    Ok(Json(DataResponse { data: pinned }))
}

/// PUT /api/v1/conversations/{id}/pins/{message_id}
///
/// Idempotent. Returns the full pinned set.
pub async fn pin_message(
    State(state): State<AppState>,
    ActingUser(requester): ActingUser,
    Path((id, message_id)): Path<(DbId, DbId)>,
) -> AppResult<impl IntoResponse> {
    visible_conversation(&state, id, requester).await?;
    let pinned = state.chat.pin(id, message_id).await?;
    Ok(Json(DataResponse { data: pinned }))
}

/// DELETE /api/v1/conversations/{id}/pins/{message_id}
pub async fn unpin_message(
    State(state): State<AppState>,
    ActingUser(requester): ActingUser,
    Path((id, message_id)): Path<(DbId, DbId)>,
) -> AppResult<impl IntoResponse> {
    visible_conversation(&state, id, requester).await?;
    let pinned = state.chat.unpin(id, message_id).await?;
    Ok(Json(DataResponse { data: pinned }))
}
