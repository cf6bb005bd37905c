//! Handlers for booking and appointment lifecycle changes.

use aether_core::appointment::BookingRequest;
use aether_core::types::{DbId, SlotTime};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::middleware::requester::ActingUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /appointments/{id}/reschedule`.
#[derive(Debug, Deserialize)]
pub struct RescheduleBody {
    pub date: NaiveDate,
    pub time: SlotTime,
    #[serde(default)]
    pub branch_id: Option<DbId>,
}

/// POST /api/v1/appointments
///
/// Customers book for themselves; staff may book for any customer and are
/// recorded as the appointment's staff member unless the body names one.
/// A full slot answers 409 with `suggested_slots`.
pub async fn book(
    State(state): State<AppState>,
    ActingUser(requester): ActingUser,
    Json(mut request): Json<BookingRequest>,
) -> AppResult<impl IntoResponse> {
    if requester.is_staff() {
        if request.staff_id.is_none() {
            request.staff_id = Some(requester.id);
        }
    } else if request.customer_id != requester.id {
        return Err(AppError::Forbidden(
            "Customers may only book for themselves".into(),
        ));
    }
    let appointment = state.coordinator.book(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(DataResponse { data: appointment }),
    ))
}

/// GET /api/v1/appointments/{id}
pub async fn get_appointment(
    State(state): State<AppState>,
    ActingUser(requester): ActingUser,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let appointment = state.coordinator.get(id, requester).await?;
    Ok(Json(DataResponse { data: appointment }))
}

/// POST /api/v1/appointments/{id}/cancel
pub async fn cancel(
    State(state): State<AppState>,
    ActingUser(requester): ActingUser,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let appointment = state.coordinator.cancel(id, requester).await?;
    Ok(Json(DataResponse { data: appointment }))
}

/// POST /api/v1/appointments/{id}/reschedule
///
/// Returns both the prior (now `rescheduled`) record and its replacement.
pub async fn reschedule(
    State(state): State<AppState>,
    ActingUser(requester): ActingUser,
    Path(id): Path<DbId>,
    Json(body): Json<RescheduleBody>,
) -> AppResult<impl IntoResponse> {
    let moved = state
        .coordinator
        .reschedule(id, requester, body.date, body.time, body.branch_id)
        .await?;
    Ok(Json(DataResponse { data: moved }))
}

/// POST /api/v1/appointments/{id}/confirm
///
/// Staff only. Moves `pending_confirmation` to `booked`.
pub async fn confirm(
    State(state): State<AppState>,
    ActingUser(requester): ActingUser,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let appointment = state.coordinator.confirm(id, requester).await?;
    Ok(Json(DataResponse { data: appointment }))
}

/// POST /api/v1/appointments/{id}/complete
pub async fn complete(
    State(state): State<AppState>,
    ActingUser(requester): ActingUser,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let appointment = state.coordinator.complete(id, requester).await?;
    Ok(Json(DataResponse { data: appointment }))
}
