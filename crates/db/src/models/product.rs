//! Bookable products (services).

use aether_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `products` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProductRow {
    pub id: DbId,
    pub name: String,
    /// Bookings start as `pending_confirmation` when set.
    pub requires_confirmation: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
