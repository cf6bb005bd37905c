//! Repository for the singleton `scheduling_settings` row.

use sqlx::PgPool;

use crate::models::scheduling_settings::SchedulingSettingsRow;

/// Provides versioned reads and writes of the scheduling settings document.
pub struct SchedulingSettingsRepo;

impl SchedulingSettingsRepo {
    /// Load the settings row, if one has ever been saved.
    pub async fn load(pool: &PgPool) -> Result<Option<SchedulingSettingsRow>, sqlx::Error> {
        sqlx::query_as::<_, SchedulingSettingsRow>(
            "SELECT version, config, updated_at FROM scheduling_settings WHERE id = 1",
        )
        .fetch_optional(pool)
        .await
    }

    /// Save `config` if the stored version still equals `expected_version`
    /// (0 meaning "never saved"). Returns the new row, or `None` on a stale
    /// write.
    pub async fn save(
        pool: &PgPool,
        config: &serde_json::Value,
        expected_version: i64,
    ) -> Result<Option<SchedulingSettingsRow>, sqlx::Error> {
        if expected_version == 0 {
            return sqlx::query_as::<_, SchedulingSettingsRow>(
                "INSERT INTO scheduling_settings (id, version, config) VALUES (1, 1, $1)
                 ON CONFLICT (id) DO NOTHING
                 RETURNING version, config, updated_at",
            )
            .bind(config)
            .fetch_optional(pool)
            .await;
        }

        sqlx::query_as::<_, SchedulingSettingsRow>(
            "UPDATE scheduling_settings
             SET config = $1, version = version + 1, updated_at = NOW()
             WHERE id = 1 AND version = $2
             RETURNING version, config, updated_at",
        )
        .bind(config)
        .bind(expected_version)
        .fetch_optional(pool)
        .await
    }
}
