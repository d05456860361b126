//! Liveness and readiness probes.

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;

use kaaya_core::ApiResponse;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
}

#[derive(Debug, Serialize)]
pub struct Readiness {
    pub store: &'static str,
    pub demo_mode: bool,
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Pings the store; always ready in demo mode. Returns 503 when the
/// database is unreachable.
async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<ApiResponse<Readiness>>) {
    let demo_mode = state.store().is_memory();
    match state.store().ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::ok(Readiness {
                store: "ok",
                demo_mode,
            })),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    success: false,
                    data: Some(Readiness {
                        store: "unavailable",
                        demo_mode,
                    }),
                    message: Some("Database unavailable".to_string()),
                    pagination: None,
                }),
            )
        }
    }
}
