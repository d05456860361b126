//! Cart and wishlist handlers. Every route requires a signed-in caller.

use axum::{
    Json, Router,
    extract::State,
    routing::{delete, get, post, put},
};

use kaaya_core::{ApiResponse, ProductId};

use super::{ApiJson, ApiPath};
use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::services::cart::{
    AddToCart, AddToWishlist, CartService, CartView, SetQuantity, WishlistItemView,
};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cart", get(show).delete(clear))
        .route("/cart/items", post(add_item))
        .route("/cart/items/{product_id}", put(set_quantity).delete(remove_item))
        .route("/wishlist", get(wishlist).post(add_to_wishlist))
        .route("/wishlist/{product_id}", delete(remove_from_wishlist))
}

async fn show(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<CartView>>> {
    let cart = CartService::new(&state).view(user.id).await?;
    Ok(Json(ApiResponse::ok(cart)))
}

async fn add_item(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiJson(item): ApiJson<AddToCart>,
) -> Result<Json<ApiResponse<CartView>>> {
    let cart = CartService::new(&state).add(user.id, item).await?;
    Ok(Json(ApiResponse::ok_with_message(cart, "Added to cart")))
}

async fn set_quantity(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiPath(product_id): ApiPath<ProductId>,
    ApiJson(input): ApiJson<SetQuantity>,
) -> Result<Json<ApiResponse<CartView>>> {
    let cart = CartService::new(&state)
        .set_quantity(user.id, product_id, input.quantity)
        .await?;
    Ok(Json(ApiResponse::ok(cart)))
}

async fn remove_item(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiPath(product_id): ApiPath<ProductId>,
) -> Result<Json<ApiResponse<CartView>>> {
    let cart = CartService::new(&state).remove(user.id, product_id).await?;
    Ok(Json(ApiResponse::ok_with_message(cart, "Removed from cart")))
}

async fn clear(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<CartView>>> {
    let cart = CartService::new(&state).clear(user.id).await?;
    Ok(Json(ApiResponse::ok_with_message(cart, "Cart cleared")))
}

async fn wishlist(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<WishlistItemView>>>> {
    let items = CartService::new(&state).wishlist(user.id).await?;
    Ok(Json(ApiResponse::ok(items)))
}

async fn add_to_wishlist(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<AddToWishlist>,
) -> Result<Json<ApiResponse<Vec<WishlistItemView>>>> {
    let items = CartService::new(&state)
        .add_to_wishlist(user.id, input.product_id)
        .await?;
    Ok(Json(ApiResponse::ok_with_message(items, "Added to wishlist")))
}

async fn remove_from_wishlist(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiPath(product_id): ApiPath<ProductId>,
) -> Result<Json<ApiResponse<()>>> {
    CartService::new(&state)
        .remove_from_wishlist(user.id, product_id)
        .await?;
    Ok(Json(ApiResponse::message("Removed from wishlist")))
}
