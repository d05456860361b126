//! Store settings, one JSONB row per top-level key.

use serde_json::Value as JsonValue;
use sqlx::PgPool;

use super::RepositoryError;

/// Repository for the `kaaya.setting` key/value table.
pub struct SettingsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SettingsRepository<'a> {
    /// Create a new settings repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Every stored key/value pair.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn entries(&self) -> Result<Vec<(String, JsonValue)>, RepositoryError> {
        let rows = sqlx::query_as::<_, (String, JsonValue)>(
            "SELECT key, value FROM kaaya.setting ORDER BY key",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Insert or replace the given keys in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any write fails.
    pub async fn upsert(&self, entries: &[(String, JsonValue)]) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        for (key, value) in entries {
            sqlx::query(
                r"
                INSERT INTO kaaya.setting (key, value)
                VALUES ($1, $2)
                ON CONFLICT (key) DO UPDATE SET value = $2, updated_at = NOW()
                ",
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
