//! Identity extractors for Axum handlers.
//!
//! Authentication happens upstream; the gateway forwards the caller as
//! `x-user-id` and `x-user-role` headers. The role defaults to `customer`
//! when only the id is present.

use aether_core::appointment::{Requester, Role};
use aether_core::types::DbId;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::error::AppError;
use crate::state::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// The caller of a request.
///
/// ```ignore
/// async fn my_handler(ActingUser(requester): ActingUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = requester.id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ActingUser(pub Requester);

impl FromRequestParts<AppState> for ActingUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        requester_from_headers(&parts.headers)
            .map(ActingUser)
            .ok_or_else(|| AppError::Unauthorized("Missing or invalid x-user-id header".into()))
    }
}

/// Requires the `admin` role. Rejects with 403 Forbidden otherwise.
pub struct RequireAdmin(pub Requester);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let ActingUser(requester) = ActingUser::from_request_parts(parts, state).await?;
        if requester.role != Role::Admin {
            return Err(AppError::Forbidden("Admin role required".into()));
        }
        Ok(RequireAdmin(requester))
    }
}

/// Read the identity headers. `None` when the id is missing or malformed or
/// the role is unknown.
pub fn requester_from_headers(headers: &HeaderMap) -> Option<Requester> {
    let id: DbId = headers
        .get(USER_ID_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()?;

    let role = match headers.get(USER_ROLE_HEADER) {
        None => Role::Customer,
        Some(value) => parse_role(value.to_str().ok()?)?,
    };

    Some(Requester { id, role })
}

fn parse_role(raw: &str) -> Option<Role> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "customer" => Some(Role::Customer),
        "staff" => Some(Role::Staff),
        "admin" => Some(Role::Admin),
        _ => None,
    }
}
