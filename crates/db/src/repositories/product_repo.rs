//! Repository for the `products` table.

use aether_core::types::DbId;
use sqlx::PgPool;

use crate::models::product::ProductRow;

/// Column list for products queries.
const COLUMNS: &str = "id, name, requires_confirmation, created_at, updated_at";

/// Provides read operations for bookable products.
pub struct ProductRepo;

impl ProductRepo {
    /// Find a product by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<ProductRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM products WHERE id = $1");
        sqlx::query_as::<_, ProductRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
