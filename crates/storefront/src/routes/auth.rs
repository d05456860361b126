//! Auth handlers.
//!
//! This server does not issue tokens. `login` relays credentials to the
//! upstream backend and returns its answer unchanged; `me` reports who the
//! presented bearer token belongs to.

use axum::{
    Json, Router,
    extract::State,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::Value;

use kaaya_core::ApiResponse;

use super::ApiJson;
use crate::error::Result;
use crate::middleware::{RequireAuth, auth_rate_limiter};
use crate::models::User;
use crate::services::auth::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/me", get(me))
        .route("/auth/login", post(login).route_layer(auth_rate_limiter()))
}

#[derive(Debug, Serialize)]
pub struct Me {
    #[serde(flatten)]
    pub token: AuthUser,
    /// The stored account, when the token's subject exists locally.
    pub account: Option<User>,
}

async fn me(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Me>>> {
    let account = state.store().get_user(user.id).await?;
    Ok(Json(ApiResponse::ok(Me {
        token: user,
        account,
    })))
}

/// Relay `POST /api/auth/login` to `{BACKEND_URL}/api/auth/login`.
///
/// Returns 503 when no backend is configured and 502 when it cannot be
/// reached or answers with something other than JSON.
async fn login(State(state): State<AppState>, ApiJson(body): ApiJson<Value>) -> Result<Response> {
    let relayed = state.backend().login(&body).await?;
    tracing::info!(status = %relayed.status, "Login relayed to backend");
    Ok((relayed.status, Json(relayed.body)).into_response())
}
