//! Authentication extractors.
//!
//! Callers authenticate with `Authorization: Bearer <token>`. The token is
//! decoded by the [`TokenDecoder`](crate::services::auth::TokenDecoder) held
//! in [`AppState`].

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::Utc;

use crate::error::{AppError, set_sentry_user};
use crate::services::auth::{AuthError, AuthUser, bearer_token};
use crate::state::AppState;

/// Extractor that requires a valid bearer token.
///
/// # Example
///
/// ```rust,ignore
/// async fn my_cart(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("cart for user {}", user.id)
/// }
/// ```
pub struct RequireAuth(pub AuthUser);

/// Extractor that requires a valid bearer token with the `admin` role.
pub struct RequireAdmin(pub AuthUser);

/// Extractor that accepts anonymous callers.
///
/// A request without an `Authorization` header yields `None`. A header that
/// is present but invalid is still rejected, so a broken client is not
/// silently treated as a guest.
pub struct OptionalAuth(pub Option<AuthUser>);

/// Decode the bearer token on `parts`, if any.
fn authenticate(parts: &Parts, state: &AppState) -> Result<Option<AuthUser>, AppError> {
    let Some(header) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let token = header
        .to_str()
        .ok()
        .and_then(bearer_token)
        .ok_or(AuthError::Malformed)?;

    let user = state.tokens().decode(token, Utc::now())?;
    set_sentry_user(&user.id, user.email.as_ref().map(kaaya_core::Email::as_str));
    tracing::Span::current().record("user_id", user.id.as_i32());
    Ok(Some(user))
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        authenticate(parts, state)?
            .map(Self)
            .ok_or(AppError::Auth(AuthError::MissingToken))
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }
        Ok(Self(user))
    }
}

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        authenticate(parts, state).map(Self)
    }
}

impl OptionalAuth {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.0.as_ref().is_some_and(AuthUser::is_admin)
    }
}
