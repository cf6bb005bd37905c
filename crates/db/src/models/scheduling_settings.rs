//! Singleton scheduling settings document.

use aether_core::types::Timestamp;
use serde::Serialize;
use sqlx::FromRow;

/// The single row of the `scheduling_settings` table. `config` holds the
/// serialized `SchedulingConfig`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SchedulingSettingsRow {
    pub version: i64,
    pub config: serde_json::Value,
    pub updated_at: Timestamp,
}
