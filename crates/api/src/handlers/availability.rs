//! Handlers for slot availability reads.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;

use crate::error::AppResult;
use crate::query::DayParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/availability?date=&branch_id=
///
/// Open slots for the day with remaining capacity, plus the closure reason
/// when the day is closed.
pub async fn get_availability(
    State(state): State<AppState>,
    Query(params): Query<DayParams>,
) -> AppResult<impl IntoResponse> {
    let availability = state
        .coordinator
        .availability(params.date, params.branch_id)
        .await?;
    Ok(Json(DataResponse { data: availability }))
}

/// GET /api/v1/availability/booked-slots?date=&branch_id=
///
/// Slot starts with at least one active appointment, ascending.
pub async fn list_booked_slots(
    State(state): State<AppState>,
    Query(params): Query<DayParams>,
) -> AppResult<impl IntoResponse> {
    let slots = state
        .coordinator
        .booked_slots(params.date, params.branch_id)
        .await?;
    Ok(Json(DataResponse { data: slots }))
}
