//! Order API handlers.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, patch},
};

use kaaya_core::{ApiResponse, OrderId};

use super::{ApiJson, ApiPath, ApiQuery};
use crate::error::Result;
use crate::middleware::{OptionalAuth, RequireAdmin, RequireAuth};
use crate::models::Order;
use crate::services::orders::{OrderInput, OrderQuery, OrderService, StatusUpdate};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list).post(create))
        .route("/orders/{id}", get(show))
        .route("/orders/{id}/status", patch(update_status))
}

async fn list(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<OrderQuery>,
) -> Result<Json<ApiResponse<Vec<Order>>>> {
    let page = OrderService::new(&state).list(&user, &query).await?;
    Ok(Json(ApiResponse::paginated(page)))
}

/// Place an order as a guest or a signed-in customer.
async fn create(
    OptionalAuth(user): OptionalAuth,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<OrderInput>,
) -> Result<(StatusCode, Json<ApiResponse<Order>>)> {
    let order = OrderService::new(&state).create(input, user.as_ref()).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(order, "Order placed")),
    ))
}

async fn show(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<Json<ApiResponse<Order>>> {
    let order = OrderService::new(&state).get(&user, id).await?;
    Ok(Json(ApiResponse::ok(order)))
}

async fn update_status(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<OrderId>,
    ApiJson(update): ApiJson<StatusUpdate>,
) -> Result<Json<ApiResponse<Order>>> {
    let order = OrderService::new(&state).update_status(id, update).await?;
    Ok(Json(ApiResponse::ok_with_message(order, "Order status updated")))
}
