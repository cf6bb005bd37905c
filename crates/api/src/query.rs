//! Shared query parameter types for API handlers.

use aether_core::types::DbId;
use chrono::NaiveDate;
use serde::Deserialize;

/// Date and optional branch selector (`?date=&branch_id=`).
///
/// Used by the availability and booked-slot endpoints.
#[derive(Debug, Deserialize)]
pub struct DayParams {
    pub date: NaiveDate,
    pub branch_id: Option<DbId>,
}
