//! Handlers for the global scheduling configuration (admin only).

use aether_core::scheduling_config::SchedulingConfig;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::error::AppResult;
use crate::middleware::requester::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/admin/scheduling
///
/// The stored configuration, or the built-in defaults (version 0) when
/// nothing has been saved yet.
pub async fn get_scheduling(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> AppResult<impl IntoResponse> {
    let config = state.coordinator.scheduling_config().await?;
    Ok(Json(DataResponse { data: config }))
}

/// PUT /api/v1/admin/scheduling
///
/// Replace the configuration. `version` must match the stored version;
/// a stale write answers 409.
pub async fn put_scheduling(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(config): Json<SchedulingConfig>,
) -> AppResult<impl IntoResponse> {
    let saved = state.coordinator.update_scheduling_config(config).await?;
    tracing::info!(admin_id = admin.id, version = saved.version, "Scheduling configuration replaced");
    Ok(Json(DataResponse { data: saved }))
}
