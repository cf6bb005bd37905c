use aether_core::appointment::Requester;
use aether_core::types::DbId;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;

use crate::error::{AppError, AppResult};
use crate::middleware::requester::ActingUser;
use crate::response::DataResponse;
use crate::state::AppState;

fn ensure_self_or_staff(requester: Requester, customer_id: DbId) -> AppResult<()> {
    if requester.is_staff() || requester.id == customer_id {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Customers may only access their own records".into(),
        ))
    }
}

/// GET /api/v1/customers/{id}/appointments/upcoming
///
/// Active appointments from today on, ordered by (date, time).
pub async fn list_upcoming(
    State(state): State<AppState>,
    ActingUser(requester): ActingUser,
    Path(customer_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    ensure_self_or_staff(requester, customer_id)?;
    let appointments = state.coordinator.list_upcoming(customer_id).await?;
    Ok(Json(DataResponse { data: appointments }))
}

/// GET /api/v1/customers/{id}/conversation
///
/// The customer's conversation, created on first access. Its id is the
/// realtime room to join.
pub async fn get_conversation(
    State(state): State<AppState>,
    ActingUser(requester): ActingUser,
    Path(customer_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    ensure_self_or_staff(requester, customer_id)?;
    let conversation = state.chat.conversation_for_customer(customer_id).await?;
    Ok(Json(DataResponse { data: conversation }))
}
