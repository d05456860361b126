//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                               - Liveness
//! GET    /health/ready                         - Readiness (store ping)
//!
//! # Categories and menu
//! GET    /api/categories                       - List (?tree=&include_inactive=)
//! POST   /api/categories                       - Create (admin)
//! GET    /api/categories/{id_or_slug}          - Detail
//! PUT    /api/categories/{id}                  - Update (admin)
//! DELETE /api/categories/{id}                  - Delete (admin)
//! GET    /api/menu                             - Public navigation tree
//! GET    /api/menu-management                  - Full tree incl. hidden (admin)
//! PUT    /api/menu-management/reorder          - Reorder (admin)
//! PATCH  /api/menu-management/{id}/visibility  - Show/hide (admin)
//! POST   /api/menu-management/sync             - Bulk edit (admin)
//!
//! # Products
//! GET    /api/products                         - Filtered, paginated listing
//! POST   /api/products                         - Create (admin)
//! GET    /api/products/{id_or_slug}            - Detail
//! PUT    /api/products/{id}                    - Update (admin)
//! DELETE /api/products/{id}                    - Soft delete (admin)
//! POST   /api/admin/products/bulk              - Bulk action (admin)
//!
//! # Orders
//! GET    /api/orders                           - Own orders, or all for admins
//! POST   /api/orders                           - Place an order (guest or signed in)
//! GET    /api/orders/{id}                      - Detail (owner or admin)
//! PATCH  /api/orders/{id}/status               - Status update (admin)
//!
//! # Cart and wishlist (signed in)
//! GET    /api/cart                             - Cart with totals
//! POST   /api/cart/items                       - Add item
//! PUT    /api/cart/items/{product_id}          - Set quantity
//! DELETE /api/cart/items/{product_id}          - Remove item
//! DELETE /api/cart                             - Clear
//! GET    /api/wishlist                         - List
//! POST   /api/wishlist                         - Add
//! DELETE /api/wishlist/{product_id}            - Remove
//!
//! # Settings
//! GET    /api/settings                         - Store settings
//! PUT    /api/settings                         - Partial update (admin)
//!
//! # Auth
//! GET    /api/auth/me                          - Decode bearer token
//! POST   /api/auth/login                       - Proxy to the backend
//! ```

pub mod admin;
pub mod auth;
pub mod cart;
pub mod categories;
pub mod extract;
pub mod health;
pub mod menu;
pub mod orders;
pub mod products;
pub mod settings;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::Request,
    http::{HeaderName, HeaderValue, Method, header},
    middleware::{from_fn, from_fn_with_state},
};
use tower_http::LatencyUnit;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::{Level, field::Empty};

use crate::middleware::{
    WriteLimiter, request_id_middleware, security_headers_middleware, write_rate_limit,
};
use crate::state::AppState;

pub use extract::{ApiJson, ApiPath, ApiQuery};

/// All `/api` routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(categories::router())
        .merge(menu::router())
        .merge(products::router())
        .merge(admin::router())
        .merge(orders::router())
        .merge(cart::router())
        .merge(settings::router())
        .merge(auth::router())
}

/// CORS for the React client. With no configured origins, cross-origin
/// requests are not allowed.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([HeaderName::from_static("x-request-id")])
        .max_age(Duration::from_secs(600))
}

/// Build the complete application router with its middleware stack.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config().cors_allowed_origins);

    Router::new()
        .merge(health::router())
        .nest("/api", api_routes())
        .layer(from_fn_with_state(Arc::new(WriteLimiter::new()), write_rate_limit))
        .layer(cors)
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = Empty,
                user_id = Empty,
            )
        })
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        ))
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
