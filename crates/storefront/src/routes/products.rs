//! Product API handlers.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::get,
};
use tracing::instrument;

use kaaya_core::{ApiResponse, ProductId};

use super::{ApiJson, ApiPath, ApiQuery};
use crate::error::Result;
use crate::middleware::{OptionalAuth, RequireAdmin};
use crate::models::{Product, ProductChanges};
use crate::services::products::{ProductInput, ProductQuery, ProductRef, ProductService};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(list).post(create))
        .route("/products/{id}", get(show).put(update).delete(remove))
}

/// Paginated product listing. Admins also see inactive products.
#[instrument(skip(state, auth))]
async fn list(
    State(state): State<AppState>,
    auth: OptionalAuth,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> Result<Json<ApiResponse<Vec<Product>>>> {
    let page = ProductService::new(&state)
        .list(&query, auth.is_admin())
        .await?;
    Ok(Json(ApiResponse::paginated(page)))
}

async fn show(
    State(state): State<AppState>,
    auth: OptionalAuth,
    ApiPath(id_or_slug): ApiPath<String>,
) -> Result<Json<ApiResponse<Product>>> {
    let product = ProductService::new(&state)
        .get(&ProductRef::parse(&id_or_slug), auth.is_admin())
        .await?;
    Ok(Json(ApiResponse::ok(product)))
}

async fn create(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<ProductInput>,
) -> Result<(StatusCode, Json<ApiResponse<Product>>)> {
    let product = ProductService::new(&state).create(input).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(product, "Product created")),
    ))
}

async fn update(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
    ApiJson(changes): ApiJson<ProductChanges>,
) -> Result<Json<ApiResponse<Product>>> {
    let product = ProductService::new(&state).update(id, changes).await?;
    Ok(Json(ApiResponse::ok_with_message(product, "Product updated")))
}

/// Soft delete.
async fn remove(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<Json<ApiResponse<()>>> {
    ProductService::new(&state).delete(id).await?;
    Ok(Json(ApiResponse::message("Product deactivated")))
}
