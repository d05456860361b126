//! Bearer-token error types.

use thiserror::Error;

/// Reasons a bearer token is not accepted.
///
/// Every variant maps to `401 Unauthorized`; the display text is what the
/// client sees.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// No `Authorization: Bearer ...` header.
    #[error("Authentication required")]
    MissingToken,

    /// Not three dot-separated base64url segments.
    #[error("Malformed token")]
    Malformed,

    /// The payload is not a JSON object with the expected claims.
    #[error("Invalid token payload: {0}")]
    InvalidClaims(String),

    /// The `exp` claim is in the past.
    #[error("Token expired")]
    Expired,

    /// A signing secret is configured and the signature does not match.
    #[error("Invalid token signature")]
    InvalidSignature,

    /// The header names an algorithm other than HS256 while signing is enforced.
    #[error("Unsupported token algorithm: {0}")]
    UnsupportedAlgorithm(String),
}
