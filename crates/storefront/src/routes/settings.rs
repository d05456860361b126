//! Store settings handlers.

use axum::{Json, Router, extract::State, routing::get};
use serde_json::{Map, Value};

use kaaya_core::ApiResponse;

use super::ApiJson;
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::StoreSettings;
use crate::services::settings::SettingsService;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/settings", get(show).put(update))
}

async fn show(State(state): State<AppState>) -> Result<Json<ApiResponse<StoreSettings>>> {
    let settings = SettingsService::new(&state).current().await?;
    Ok(Json(ApiResponse::ok(settings)))
}

/// Partial update: only the keys present in the body are changed.
async fn update(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiJson(patch): ApiJson<Map<String, Value>>,
) -> Result<Json<ApiResponse<StoreSettings>>> {
    tracing::info!(admin_id = %admin.id, "Settings update");
    let settings = SettingsService::new(&state).update(patch).await?;
    Ok(Json(ApiResponse::ok_with_message(settings, "Settings updated")))
}
