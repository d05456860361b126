//! Navigation menu and menu management handlers.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, patch, post, put},
};
use serde::Deserialize;

use kaaya_core::{ApiResponse, CategoryId};

use super::{ApiJson, ApiPath};
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::{Category, CategoryNode};
use crate::services::catalog::{CatalogService, CategorySyncItem, MenuPosition, MenuUpdateReport};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/menu", get(menu))
        .route("/menu-management", get(management_tree))
        .route("/menu-management/reorder", put(reorder))
        .route("/menu-management/{id}/visibility", patch(visibility))
        .route("/menu-management/sync", post(sync))
}

#[derive(Debug, Deserialize)]
pub struct VisibilityInput {
    pub show_in_menu: bool,
}

/// Public navigation: active categories shown in the menu.
async fn menu(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<CategoryNode>>>> {
    let tree = CatalogService::new(&state).menu().await?;
    Ok(Json(ApiResponse::ok(tree)))
}

/// Every category, hidden and inactive included, for the menu editor.
async fn management_tree(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<CategoryNode>>>> {
    let tree = CatalogService::new(&state).tree(true).await?;
    Ok(Json(ApiResponse::ok(tree)))
}

async fn reorder(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    ApiJson(items): ApiJson<Vec<MenuPosition>>,
) -> Result<Json<ApiResponse<MenuUpdateReport>>> {
    let report = CatalogService::new(&state).reorder(items).await?;
    Ok(Json(ApiResponse::ok_with_message(report, "Menu order updated")))
}

async fn visibility(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<CategoryId>,
    ApiJson(input): ApiJson<VisibilityInput>,
) -> Result<Json<ApiResponse<Category>>> {
    let category = CatalogService::new(&state)
        .set_visibility(id, input.show_in_menu)
        .await?;
    Ok(Json(ApiResponse::ok(category)))
}

async fn sync(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    ApiJson(items): ApiJson<Vec<CategorySyncItem>>,
) -> Result<Json<ApiResponse<MenuUpdateReport>>> {
    let report = CatalogService::new(&state).sync(items).await?;
    Ok(Json(ApiResponse::ok_with_message(report, "Categories synced")))
}
