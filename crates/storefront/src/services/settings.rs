//! Store settings: typed reads over stored key/value rows, partial updates.

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::db::RepositoryError;
use crate::error::{AppError, Result};
use crate::models::StoreSettings;
use crate::state::AppState;
use crate::store::{FallbackCatalog, Store};

pub struct SettingsService<'a> {
    store: &'a Store,
    fallback: Option<&'a FallbackCatalog>,
}

impl<'a> SettingsService<'a> {
    #[must_use]
    pub fn new(state: &'a AppState) -> Self {
        Self {
            store: state.store(),
            fallback: state.fallback(),
        }
    }

    /// Current settings, with defaults for keys that were never stored.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the store fails with no fallback
    /// enabled, or a stored value has the wrong shape.
    pub async fn current(&self) -> Result<StoreSettings> {
        let entries = match self.store.settings_entries().await {
            Ok(entries) => entries,
            Err(e) if e.is_unavailable() && self.fallback.is_some() => {
                warn!(error = %e, "Settings read failed, serving fallback settings");
                return Ok(self.fallback.map(|f| f.settings.clone()).unwrap_or_default());
            }
            Err(e) => return Err(e.into()),
        };

        let (settings, unknown) = StoreSettings::from_entries(entries)
            .map_err(|e| RepositoryError::DataCorruption(format!("store settings: {e}")))?;
        if !unknown.is_empty() {
            warn!(keys = ?unknown, "Ignoring unknown settings keys");
        }
        Ok(settings)
    }

    /// Apply a partial update. Object values (e.g. `social`) are merged one
    /// level deep; everything else replaces the stored value. Only the keys
    /// present in `patch` are written.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for unknown keys or values that do not
    /// fit the settings schema.
    pub async fn update(&self, patch: Map<String, Value>) -> Result<StoreSettings> {
        if patch.is_empty() {
            return Err(AppError::BadRequest("No settings provided".to_string()));
        }

        let current = self.current().await?;
        let (merged, changed) = merge_patch(&current, patch)?;
        let settings: StoreSettings = serde_json::from_value(Value::Object(merged))
            .map_err(|e| AppError::BadRequest(format!("Invalid settings: {e}")))?;
        if settings.free_shipping_threshold.is_sign_negative()
            || settings.shipping_fee.is_sign_negative()
        {
            return Err(AppError::BadRequest(
                "Shipping amounts cannot be negative".to_string(),
            ));
        }

        self.store.upsert_settings(&changed).await?;

        let keys: Vec<&str> = changed.iter().map(|(k, _)| k.as_str()).collect();
        info!(?keys, "Store settings updated");
        Ok(settings)
    }
}

/// Overlay `patch` on `current`, returning the full merged object and the
/// merged value of each patched key.
fn merge_patch(
    current: &StoreSettings,
    patch: Map<String, Value>,
) -> Result<(Map<String, Value>, Vec<(String, Value)>)> {
    let mut merged = current
        .to_map()
        .map_err(|e| AppError::Internal(format!("serialize settings: {e}")))?;

    let mut changed = Vec::with_capacity(patch.len());
    for (key, value) in patch {
        let Some(existing) = merged.get_mut(&key) else {
            return Err(AppError::BadRequest(format!("Unknown setting: {key}")));
        };
        match (existing, value) {
            (Value::Object(existing), Value::Object(update)) => existing.extend(update),
            (existing, value) => *existing = value,
        }
        if let Some(value) = merged.get(&key) {
            changed.push((key, value.clone()));
        }
    }
    Ok((merged, changed))
}
