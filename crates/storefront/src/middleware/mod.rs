//! HTTP middleware stack for the storefront API.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, transaction per route)
//! 2. `TraceLayer` (request span with method, uri, request id, user id)
//! 3. Request ID (`x-request-id`)
//! 4. Security headers
//! 5. CORS
//! 6. Write rate limiting (governor)
//!
//! Authentication is not a layer: handlers opt in through the extractors in
//! [`auth`].

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;

pub use auth::{OptionalAuth, RequireAdmin, RequireAuth};
pub use rate_limit::{WriteLimiter, auth_rate_limiter, write_rate_limit};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
