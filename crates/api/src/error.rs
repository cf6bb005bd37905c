use aether_booking::{BookingError, StoreError};
use aether_core::error::CoreError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] and [`BookingError`] for domain outcomes and adds
/// HTTP-specific variants. Implements [`IntoResponse`] to produce consistent
/// JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `aether_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An outcome of the booking coordinator or chat bridge.
    #[error(transparent)]
    Booking(#[from] BookingError),

    /// The request carried no usable identity.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The identity is known but lacks the required role.
    #[error("Forbidden: {0}")]
    Forbidden(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Slot conflicts carry alternates alongside the usual error body.
        if let AppError::Booking(BookingError::SlotConflict {
            message,
            suggested_slots,
        }) = &self
        {
            let body = json!({
                "error": message,
                "code": "SLOT_CONFLICT",
                "suggested_slots": suggested_slots,
            });
            return (StatusCode::CONFLICT, axum::Json(body)).into_response();
        }

        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => classify_core_error(core),

            // --- Booking outcomes ---
            AppError::Booking(booking) => match booking {
                BookingError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                BookingError::SlotConflict { message, .. } => {
                    (StatusCode::CONFLICT, "SLOT_CONFLICT", message.clone())
                }
                BookingError::Busy => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "BUSY",
                    booking.to_string(),
                ),
                BookingError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
                BookingError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                BookingError::Store(StoreError::Database(err)) => classify_sqlx_error(err),
                BookingError::Store(err) => {
                    tracing::error!(error = %err, "Store error");
                    internal()
                }
            },

            // --- HTTP-specific errors ---
            AppError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
            }
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn classify_core_error(core: &CoreError) -> (StatusCode, &'static str, String) {
    match core {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            internal()
        }
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Unique constraint violations (constraint name starting with `uq_`) map to 409.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) => {
            // PostgreSQL unique constraint violation: error code 23505
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or("unknown");
                if constraint.starts_with("uq_") {
                    return (
                        StatusCode::CONFLICT,
                        "CONFLICT",
                        format!("Duplicate value violates unique constraint: {constraint}"),
                    );
                }
            }
            tracing::error!(error = %db_err, "Database error");
            internal()
        }
        other => {
            tracing::error!(error = %other, "Database error");
            internal()
        }
    }
}
