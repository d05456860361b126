//! Category API handlers.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::get,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use kaaya_core::{ApiResponse, CategoryId};

use super::{ApiJson, ApiPath, ApiQuery};
use crate::error::Result;
use crate::middleware::{OptionalAuth, RequireAdmin};
use crate::models::{Category, CategoryChanges, CategoryNode};
use crate::services::catalog::{CatalogService, CategoryInput, CategoryRef};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list).post(create))
        .route("/categories/{id}", get(show).put(update).delete(remove))
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryListQuery {
    #[serde(default)]
    pub tree: bool,
    #[serde(default)]
    pub include_inactive: bool,
}

/// Either a flat list or a forest, depending on `?tree=`.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum CategoryListing {
    Flat(Vec<Category>),
    Tree(Vec<CategoryNode>),
}

/// List categories. `include_inactive` is honored for admins only.
#[instrument(skip(state, auth))]
async fn list(
    State(state): State<AppState>,
    auth: OptionalAuth,
    ApiQuery(query): ApiQuery<CategoryListQuery>,
) -> Result<Json<ApiResponse<CategoryListing>>> {
    let include_inactive = query.include_inactive && auth.is_admin();
    let service = CatalogService::new(&state);

    let listing = if query.tree {
        CategoryListing::Tree(service.tree(include_inactive).await?)
    } else {
        CategoryListing::Flat(service.categories(include_inactive).await?.as_ref().clone())
    };
    Ok(Json(ApiResponse::ok(listing)))
}

/// Category detail by id or slug. Inactive categories are visible to admins only.
async fn show(
    State(state): State<AppState>,
    auth: OptionalAuth,
    ApiPath(id_or_slug): ApiPath<String>,
) -> Result<Json<ApiResponse<Category>>> {
    let reference = CategoryRef::parse(&id_or_slug);
    let category = CatalogService::new(&state)
        .get(&reference, auth.is_admin())
        .await?;
    Ok(Json(ApiResponse::ok(category)))
}

async fn create(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<CategoryInput>,
) -> Result<(StatusCode, Json<ApiResponse<Category>>)> {
    let category = CatalogService::new(&state).create(input).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(category, "Category created")),
    ))
}

async fn update(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<CategoryId>,
    ApiJson(changes): ApiJson<CategoryChanges>,
) -> Result<Json<ApiResponse<Category>>> {
    let category = CatalogService::new(&state).update(id, changes).await?;
    Ok(Json(ApiResponse::ok_with_message(category, "Category updated")))
}

async fn remove(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<CategoryId>,
) -> Result<Json<ApiResponse<()>>> {
    CatalogService::new(&state).delete(id).await?;
    Ok(Json(ApiResponse::message("Category deleted")))
}
