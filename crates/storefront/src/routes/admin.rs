//! Admin-only bulk operations.

use axum::{Json, Router, extract::State, routing::post};

use kaaya_core::ApiResponse;

use super::ApiJson;
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::services::products::{BulkReport, BulkRequest, ProductService};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/admin/products/bulk", post(bulk_products))
}

async fn bulk_products(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<BulkRequest>,
) -> Result<Json<ApiResponse<BulkReport>>> {
    tracing::info!(admin_id = %admin.id, action = ?request.action, "Bulk product request");
    let report = ProductService::new(&state).bulk(request).await?;
    Ok(Json(ApiResponse::ok(report)))
}
